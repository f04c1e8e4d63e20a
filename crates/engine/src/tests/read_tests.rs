use super::helpers::*;
use anyhow::Result;
use tempfile::tempdir;

#[test]
fn memtable_hit_beats_disk() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_tiny(dir.path());

    // key 0 flushed to disk, then overwritten in the memtable
    for key in 0..4u64 {
        engine.put(key, &value(100, b'a'))?;
    }
    assert_eq!(engine.level_len(0), 1);
    engine.put(0, &b"fresh".to_vec())?;
    assert_eq!(engine.get(0)?, Some(b"fresh".to_vec()));
    Ok(())
}

#[test]
fn newest_level_0_file_wins() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_tiny(dir.path());

    // first flush carries key 0 = 'a'
    engine.put(0, &value(100, b'a'))?;
    for key in 1..4u64 {
        engine.put(key, &value(100, b'a'))?;
    }
    assert_eq!(engine.level_len(0), 1);

    // second flush carries key 0 = 'b'; both files overlap in level 0
    engine.put(0, &value(100, b'b'))?;
    for key in 10..13u64 {
        engine.put(key, &value(100, b'b'))?;
    }
    assert_eq!(engine.level_len(0), 2);
    // key 0 is not in the memtable, so the answer comes from the newer of
    // the two overlapping level-0 files
    assert_eq!(engine.memtable_len(), 2);
    assert_eq!(engine.get(0)?, Some(value(100, b'b')));
    Ok(())
}

#[test]
fn tombstone_in_memtable_shadows_disk() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_tiny(dir.path());

    for key in 0..4u64 {
        engine.put(key, &value(100, b'a'))?;
    }
    assert!(engine.delete(1)?);
    assert_eq!(engine.get(1)?, None);
    Ok(())
}

#[test]
fn tombstone_in_newer_file_shadows_older_file() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_tiny(dir.path());

    // flush #1: keys 0..3 live
    for key in 0..4u64 {
        engine.put(key, &value(100, b'a'))?;
    }
    // tombstone key 0, then force it out to a second level-0 file
    assert!(engine.delete(0)?);
    for key in 20..23u64 {
        engine.put(key, &value(100, b'a'))?;
    }
    assert_eq!(engine.level_len(0), 2);

    assert_eq!(engine.get(0)?, None);
    assert_eq!(engine.get(1)?, Some(value(100, b'a')));
    Ok(())
}

#[test]
fn reads_across_all_levels() -> Result<()> {
    let dir = tempdir()?;
    let mut engine = open_tiny(dir.path());

    // push enough data that levels 1+ hold files, then keep some fresh
    // entries in level 0 and the memtable
    for key in 0..30u64 {
        engine.put(key, &value(100, b'x'))?;
    }
    assert!(engine.level_len(1) + engine.level_len(2) > 0);

    for key in 0..30u64 {
        assert_eq!(engine.get(key)?, Some(value(100, b'x')), "key {}", key);
    }
    assert_eq!(engine.get(999)?, None);
    Ok(())
}

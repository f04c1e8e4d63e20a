use super::*;
use crate::table::TableIterator;
use crate::Error;
use tempfile::tempdir;

// --------------------- Buffer tables ---------------------

#[test]
fn buffer_iteration_and_value_sizes() {
    let table = buffer_from(&[
        (1, Some(b"apple")),
        (2, None),
        (3, Some(b"cherry")),
        (4, Some(b"")),
    ]);
    assert_eq!(table.count(), 4);
    assert_eq!(table.min_key(), 1);
    assert_eq!(table.max_key(), 4);

    let mut it = table.begin();
    assert!(it.valid());
    assert_eq!(it.key(), 1);
    assert!(!it.is_tombstone());
    assert_eq!(it.value_size(), 5);
    assert_eq!(it.read_value_bytes().unwrap(), b"apple");

    it.proceed();
    assert_eq!(it.key(), 2);
    assert!(it.is_tombstone());
    assert_eq!(it.value_size(), 0);

    it.proceed();
    assert_eq!(it.read_value_bytes().unwrap(), b"cherry");

    it.proceed();
    assert_eq!(it.key(), 4);
    assert!(!it.is_tombstone());
    assert_eq!(it.value_size(), 0);

    it.proceed();
    assert!(!it.valid());
}

#[test]
fn buffer_overlap_gate() {
    let table = buffer_from(&[(10, Some(b"a")), (20, Some(b"b"))]);
    assert!(table.overlaps(5, 10));
    assert!(table.overlaps(15, 17));
    assert!(table.overlaps(20, 99));
    assert!(!table.overlaps(0, 9));
    assert!(!table.overlaps(21, 99));
}

// --------------------- File tables ---------------------

#[test]
fn file_create_then_open_roundtrip() {
    let dir = tempdir().unwrap();
    let opts = small_opts();
    let fs = open_fs(dir.path(), 2, 4);

    let entries: &[(u64, Option<&[u8]>)] =
        &[(5, Some(b"five")), (7, None), (9, Some(b"nine"))];
    let created = write_file(&fs, &opts, 1, entries);
    assert_eq!(created.timestamp(), 0);
    assert_eq!(created.level(), 1);
    assert_eq!(fs.timestamp(), 1);

    let opened = FileTable::open(&fs, &opts, created.path().to_path_buf(), 1).unwrap();
    assert_eq!(opened.count(), 3);
    assert_eq!(opened.min_key(), 5);
    assert_eq!(opened.max_key(), 9);
    assert_eq!(opened.timestamp(), 0);

    let hit = opened.find(5).unwrap();
    assert_eq!(hit.read_value_bytes().unwrap(), b"five");

    let tomb = opened.find(7).unwrap();
    assert!(tomb.is_tombstone());
    assert_eq!(tomb.value_size(), 0);

    assert!(opened.find(6).is_none());
    assert!(opened.find(4).is_none());
    assert!(opened.find(10).is_none());

    let mut it = opened.lower_bound(6);
    assert_eq!(it.key(), 7);
    it.proceed();
    assert_eq!(it.read_value_bytes().unwrap(), b"nine");
}

#[test]
fn file_iteration_matches_input() {
    let dir = tempdir().unwrap();
    let opts = small_opts();
    let fs = open_fs(dir.path(), 1, 4);

    let values: Vec<Vec<u8>> = (0..5u8).map(|i| vec![b'a' + i; i as usize + 1]).collect();
    let entries: Vec<(u64, Option<&[u8]>)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as u64 * 2, Some(v.as_slice())))
        .collect();
    let table = write_file(&fs, &opts, 0, &entries);

    let mut it = table.begin();
    for (key, value) in &entries {
        assert!(it.valid());
        assert_eq!(it.key(), *key);
        assert_eq!(it.read_value_bytes().unwrap(), value.unwrap());
        it.proceed();
    }
    assert!(!it.valid());
}

#[test]
fn open_advances_timestamp_counter() {
    let dir = tempdir().unwrap();
    let opts = small_opts();
    let path = {
        let fs = open_fs(dir.path(), 1, 4);
        write_file(&fs, &opts, 0, &[(1, Some(b"x"))]);
        let t = write_file(&fs, &opts, 0, &[(2, Some(b"y"))]);
        t.path().to_path_buf()
    };

    // A fresh manager starts at zero until it observes the file.
    let fs = open_fs(dir.path(), 1, 4);
    assert_eq!(fs.timestamp(), 0);
    let table = FileTable::open(&fs, &opts, path, 0).unwrap();
    assert_eq!(table.timestamp(), 1);
    assert_eq!(fs.timestamp(), 2);
}

#[test]
fn freshness_order_between_file_tables() {
    let dir = tempdir().unwrap();
    let opts = small_opts();
    let fs = open_fs(dir.path(), 2, 4);

    let old = write_file(&fs, &opts, 0, &[(1, Some(b"a"))]);
    let new = write_file(&fs, &opts, 0, &[(1, Some(b"b"))]);
    let deep = write_file(&fs, &opts, 2, &[(1, Some(b"c"))]);

    // same level: higher timestamp wins
    assert!(new.is_prior_to(&old));
    assert!(!old.is_prior_to(&new));
    // lower level wins regardless of timestamp
    assert!(new.is_prior_to(&deep));
    assert!(old.is_prior_to(&deep));
    assert!(!deep.is_prior_to(&old));
}

#[test]
fn reads_survive_stream_eviction() {
    let dir = tempdir().unwrap();
    let opts = small_opts();
    // capacity 1: every alternating read evicts the other handle
    let fs = open_fs(dir.path(), 1, 1);

    let a = write_file(&fs, &opts, 0, &[(1, Some(b"aaa")), (2, Some(b"bbb"))]);
    let b = write_file(&fs, &opts, 0, &[(1, Some(b"xxx")), (2, Some(b"yyy"))]);

    for _ in 0..3 {
        assert_eq!(a.find(1).unwrap().read_value_bytes().unwrap(), b"aaa");
        assert_eq!(b.find(2).unwrap().read_value_bytes().unwrap(), b"yyy");
        assert_eq!(a.find(2).unwrap().read_value_bytes().unwrap(), b"bbb");
        assert_eq!(b.find(1).unwrap().read_value_bytes().unwrap(), b"xxx");
    }
}

// --------------------- Corruption ---------------------

#[test]
fn open_rejects_truncated_file() {
    let dir = tempdir().unwrap();
    let opts = small_opts();
    let fs = open_fs(dir.path(), 1, 4);

    let table = write_file(&fs, &opts, 0, &[(1, Some(b"hello"))]);
    let path = table.path().to_path_buf();
    drop(table);

    // chop the file below the smallest possible key section
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..opts.initial_file_size() as usize - 10]).unwrap();

    let fs2 = open_fs(dir.path(), 1, 4);
    match FileTable::open(&fs2, &opts, path, 0) {
        Err(Error::Corrupt { .. }) => {}
        other => panic!("expected corrupt error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn open_rejects_zero_count() {
    let dir = tempdir().unwrap();
    let opts = small_opts();
    let fs = open_fs(dir.path(), 1, 4);

    let table = write_file(&fs, &opts, 0, &[(1, Some(b"hello"))]);
    let path = table.path().to_path_buf();
    drop(table);

    // zero the count field (bytes 8..12)
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[8..12].copy_from_slice(&0u32.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let fs2 = open_fs(dir.path(), 1, 4);
    assert!(matches!(
        FileTable::open(&fs2, &opts, path, 0),
        Err(Error::Corrupt { .. })
    ));
}

#[test]
fn open_rejects_unsorted_records() {
    let dir = tempdir().unwrap();
    let opts = small_opts();
    let fs = open_fs(dir.path(), 1, 4);

    let table = write_file(&fs, &opts, 0, &[(1, Some(b"a")), (2, Some(b"b"))]);
    let path = table.path().to_path_buf();
    drop(table);

    // swap the two record keys in place
    let record_base = opts.initial_file_size() as usize;
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[record_base..record_base + 8].copy_from_slice(&9u64.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let fs2 = open_fs(dir.path(), 1, 4);
    assert!(matches!(
        FileTable::open(&fs2, &opts, path, 0),
        Err(Error::Corrupt { .. })
    ));
}

use super::*;
use crate::appender::Appender;
use crate::table::TableIterator;
use tempfile::tempdir;

// With small_opts (156-byte prefix, 256-byte cap) a record with a 5-byte
// value costs 17 bytes, so exactly five fit per table.

fn five_byte_entries(n: u64) -> Vec<(u64, Option<Vec<u8>>)> {
    (0..n).map(|k| (k, Some(vec![b'v'; 5]))).collect()
}

fn drive_to_buffers(
    entries: &[(u64, Option<Vec<u8>>)],
    drop_tombstones: bool,
) -> (Vec<crate::BufferTable>, Appender) {
    let borrowed: Vec<(u64, Option<&[u8]>)> = entries
        .iter()
        .map(|(k, v)| (*k, v.as_deref()))
        .collect();
    let src = buffer_from(&borrowed);
    let mut appender = Appender::new(small_opts());
    let mut outputs = Vec::new();
    let mut it = src.begin();
    while it.valid() {
        if let Some(table) = appender.append_to_buffer(&it, drop_tombstones).unwrap() {
            outputs.push(table);
        }
        it.proceed();
    }
    (outputs, appender)
}

#[test]
fn no_spill_under_cap() {
    let (outputs, mut appender) = drive_to_buffers(&five_byte_entries(5), false);
    assert!(outputs.is_empty());
    assert!(!appender.is_empty());

    let tail = appender.pop_buffer();
    assert_eq!(tail.count(), 5);
    assert_eq!(tail.min_key(), 0);
    assert_eq!(tail.max_key(), 4);
    assert!(appender.is_empty());
}

#[test]
fn spill_at_cap_seeds_next_table() {
    let (outputs, mut appender) = drive_to_buffers(&five_byte_entries(7), false);
    // the sixth record spilled the first five; the tail holds two
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].count(), 5);
    assert_eq!(outputs[0].max_key(), 4);

    let tail = appender.pop_buffer();
    assert_eq!(tail.count(), 2);
    assert_eq!(tail.min_key(), 5);
    assert_eq!(tail.max_key(), 6);
}

#[test]
fn oversized_record_accepted_when_empty() {
    let big = vec![b'z'; 1024];
    let entries = vec![(1u64, Some(big.clone())), (2u64, Some(vec![b'a'; 5]))];
    let (outputs, mut appender) = drive_to_buffers(&entries, false);

    // the oversized record spilled out alone when key 2 arrived
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].count(), 1);
    assert_eq!(outputs[0].begin().read_value_bytes().unwrap(), big);

    let tail = appender.pop_buffer();
    assert_eq!(tail.count(), 1);
    assert_eq!(tail.min_key(), 2);
}

#[test]
fn tombstones_cost_a_record_but_no_value_bytes() {
    let entries: Vec<(u64, Option<Vec<u8>>)> = (0..5u64).map(|k| (k, None)).collect();
    let (outputs, mut appender) = drive_to_buffers(&entries, false);
    assert!(outputs.is_empty());

    let tail = appender.pop_buffer();
    assert_eq!(tail.count(), 5);
    assert!(tail.value_bytes().is_empty());
    let mut it = tail.begin();
    while it.valid() {
        assert!(it.is_tombstone());
        assert_eq!(it.value_size(), 0);
        it.proceed();
    }
}

#[test]
fn drop_tombstones_discards_them() {
    let entries = vec![
        (1u64, Some(vec![b'a'; 5])),
        (2u64, None),
        (3u64, Some(vec![b'c'; 5])),
        (4u64, None),
    ];
    let (outputs, mut appender) = drive_to_buffers(&entries, true);
    assert!(outputs.is_empty());

    let tail = appender.pop_buffer();
    assert_eq!(tail.count(), 2);
    let mut keys = Vec::new();
    let mut it = tail.begin();
    while it.valid() {
        keys.push(it.key());
        it.proceed();
    }
    assert_eq!(keys, vec![1, 3]);
}

#[test]
fn pop_file_writes_an_sst_within_cap() {
    let dir = tempdir().unwrap();
    let opts = small_opts();
    let fs = open_fs(dir.path(), 1, 4);

    let entries = five_byte_entries(7);
    let borrowed: Vec<(u64, Option<&[u8]>)> = entries
        .iter()
        .map(|(k, v)| (*k, v.as_deref()))
        .collect();
    let src = buffer_from(&borrowed);

    let mut appender = Appender::new(opts);
    let mut files = Vec::new();
    let mut it = src.begin();
    while it.valid() {
        if let Some(file) = appender.append_to_file(&it, false, &fs, 1).unwrap() {
            files.push(file);
        }
        it.proceed();
    }
    files.push(appender.pop_file(&fs, 1).unwrap());

    assert_eq!(files.len(), 2);
    for file in &files {
        let len = std::fs::metadata(file.path()).unwrap().len();
        assert!(len <= opts.max_file_size as u64, "file over cap: {}", len);
        assert!(file.count() >= 1);
        assert!(file.path().to_string_lossy().contains("level-1"));
    }
    // the two files cover the input without overlap
    assert_eq!(files[0].max_key() + 1, files[1].min_key());
}

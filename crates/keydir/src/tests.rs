use super::*;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn pos(file_id: u32, offset: u64) -> RecordPos {
    RecordPos { file_id, offset }
}

/// Runs the contract checks shared by all variants.
fn check_basic_contract(index: &dyn Indexer) {
    assert_eq!(index.size().unwrap(), 0);
    assert!(index.get(b"missing").unwrap().is_none());

    // fresh insert does not overwrite
    assert!(!index.put(b"a".to_vec(), pos(1, 0)).unwrap());
    assert_eq!(index.get(b"a").unwrap(), Some(pos(1, 0)));
    assert_eq!(index.size().unwrap(), 1);

    // replacement reports the overwrite and wins
    assert!(index.put(b"a".to_vec(), pos(2, 64)).unwrap());
    assert_eq!(index.get(b"a").unwrap(), Some(pos(2, 64)));
    assert_eq!(index.size().unwrap(), 1);

    // delete reports existence
    assert!(index.delete(b"a").unwrap());
    assert!(!index.delete(b"a").unwrap());
    assert!(index.get(b"a").unwrap().is_none());
    assert_eq!(index.size().unwrap(), 0);

    index.close().unwrap();
}

fn check_iteration(index: &dyn Indexer) {
    let keys: [&[u8]; 4] = [b"banana", b"apple", b"cherry", b"apricot"];
    for (i, key) in keys.iter().enumerate() {
        index.put(key.to_vec(), pos(0, i as u64)).unwrap();
    }

    let mut iter = index.iterator(false).unwrap();
    let mut keys = Vec::new();
    iter.rewind();
    while iter.valid() {
        keys.push(iter.key().to_vec());
        iter.next();
    }
    assert_eq!(
        keys,
        vec![
            b"apple".to_vec(),
            b"apricot".to_vec(),
            b"banana".to_vec(),
            b"cherry".to_vec(),
        ]
    );

    let mut rev = index.iterator(true).unwrap();
    let mut rev_keys = Vec::new();
    rev.rewind();
    while rev.valid() {
        rev_keys.push(rev.key().to_vec());
        rev.next();
    }
    keys.reverse();
    assert_eq!(rev_keys, keys);
}

// -------------------- BTree variant --------------------

#[test]
fn btree_basic_contract() {
    check_basic_contract(&BTreeIndex::new());
}

#[test]
fn btree_iteration_order() {
    check_iteration(&BTreeIndex::new());
}

// -------------------- SkipList variant --------------------

#[test]
fn skiplist_basic_contract() {
    check_basic_contract(&SkipListIndex::new());
}

#[test]
fn skiplist_iteration_order() {
    check_iteration(&SkipListIndex::new());
}

// -------------------- BPlusTree variant --------------------

#[test]
fn bptree_basic_contract() {
    let dir = tempdir().unwrap();
    let index = BptreeIndex::open(dir.path()).unwrap();
    check_basic_contract(&index);
}

#[test]
fn bptree_iteration_order() {
    let dir = tempdir().unwrap();
    let index = BptreeIndex::open(dir.path()).unwrap();
    check_iteration(&index);
}

#[test]
fn bptree_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let index = BptreeIndex::open(dir.path()).unwrap();
        index.put(b"persisted".to_vec(), pos(4, 2048)).unwrap();
        index.close().unwrap();
    }

    let index = BptreeIndex::open(dir.path()).unwrap();
    assert_eq!(index.get(b"persisted").unwrap(), Some(pos(4, 2048)));
    assert_eq!(index.size().unwrap(), 1);
}

// -------------------- Cursor behavior --------------------

#[test]
fn seek_forward_lands_on_first_key_at_or_after() {
    let index = BTreeIndex::new();
    for key in [b"aa", b"cc", b"ee"] {
        index.put(key.to_vec(), pos(0, 0)).unwrap();
    }

    let mut iter = index.iterator(false).unwrap();
    iter.seek(b"bb");
    assert!(iter.valid());
    assert_eq!(iter.key(), b"cc");

    iter.seek(b"cc");
    assert_eq!(iter.key(), b"cc");

    iter.seek(b"zz");
    assert!(!iter.valid());
}

#[test]
fn seek_reverse_lands_on_first_key_at_or_before() {
    let index = BTreeIndex::new();
    for key in [b"aa", b"cc", b"ee"] {
        index.put(key.to_vec(), pos(0, 0)).unwrap();
    }

    let mut iter = index.iterator(true).unwrap();
    iter.seek(b"dd");
    assert!(iter.valid());
    assert_eq!(iter.key(), b"cc");

    iter.seek(b"cc");
    assert_eq!(iter.key(), b"cc");

    iter.seek(b"a");
    assert!(!iter.valid());
}

#[test]
fn iterator_is_a_snapshot() {
    let index = BTreeIndex::new();
    index.put(b"k1".to_vec(), pos(0, 0)).unwrap();

    let mut iter = index.iterator(false).unwrap();
    index.put(b"k2".to_vec(), pos(0, 10)).unwrap();
    index.delete(b"k1").unwrap();

    // The cursor still sees exactly the state at creation time.
    iter.rewind();
    assert!(iter.valid());
    assert_eq!(iter.key(), b"k1");
    iter.next();
    assert!(!iter.valid());
}

#[test]
fn closed_iterator_is_invalid() {
    let index = BTreeIndex::new();
    index.put(b"k".to_vec(), pos(0, 0)).unwrap();

    let mut iter = index.iterator(false).unwrap();
    assert!(iter.valid());
    iter.close();
    assert!(!iter.valid());
}

#[test]
fn rewind_after_exhaustion_restarts() {
    let index = BTreeIndex::new();
    index.put(b"k1".to_vec(), pos(0, 0)).unwrap();
    index.put(b"k2".to_vec(), pos(0, 1)).unwrap();

    let mut iter = index.iterator(false).unwrap();
    while iter.valid() {
        iter.next();
    }
    iter.rewind();
    assert!(iter.valid());
    assert_eq!(iter.key(), b"k1");
}

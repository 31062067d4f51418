use super::helpers::test_options;
use crate::*;
use anyhow::Result;
use tempfile::tempdir;

fn seeded_db(dir: &std::path::Path) -> Result<DB> {
    let db = DB::open(test_options(dir))?;
    for key in ["acorn", "apple", "banana", "beet", "cherry"] {
        db.put(key.as_bytes(), format!("v-{}", key).as_bytes())?;
    }
    Ok(db)
}

// --------------------- Ordering ---------------------

#[test]
fn forward_iteration_is_lexicographic() -> Result<()> {
    let dir = tempdir()?;
    let db = seeded_db(dir.path())?;

    let mut iter = db.iter(IteratorOptions::default())?;
    let mut seen = Vec::new();
    iter.rewind();
    while iter.valid() {
        seen.push((iter.key().to_vec(), iter.value()?));
        iter.next();
    }

    assert_eq!(
        seen.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>(),
        vec![
            b"acorn".to_vec(),
            b"apple".to_vec(),
            b"banana".to_vec(),
            b"beet".to_vec(),
            b"cherry".to_vec(),
        ]
    );
    assert_eq!(seen[0].1, b"v-acorn");
    Ok(())
}

#[test]
fn reverse_iteration_is_descending() -> Result<()> {
    let dir = tempdir()?;
    let db = seeded_db(dir.path())?;

    let mut iter = db.iter(IteratorOptions {
        reverse: true,
        ..Default::default()
    })?;
    let mut keys = Vec::new();
    iter.rewind();
    while iter.valid() {
        keys.push(iter.key().to_vec());
        iter.next();
    }

    assert_eq!(
        keys,
        vec![
            b"cherry".to_vec(),
            b"beet".to_vec(),
            b"banana".to_vec(),
            b"apple".to_vec(),
            b"acorn".to_vec(),
        ]
    );
    Ok(())
}

// --------------------- Seek ---------------------

#[test]
fn seek_forward() -> Result<()> {
    let dir = tempdir()?;
    let db = seeded_db(dir.path())?;

    let mut iter = db.iter(IteratorOptions::default())?;
    iter.seek(b"b");
    assert!(iter.valid());
    assert_eq!(iter.key(), b"banana");
    Ok(())
}

#[test]
fn seek_reverse() -> Result<()> {
    let dir = tempdir()?;
    let db = seeded_db(dir.path())?;

    let mut iter = db.iter(IteratorOptions {
        reverse: true,
        ..Default::default()
    })?;
    iter.seek(b"b");
    assert!(iter.valid());
    assert_eq!(iter.key(), b"apple");
    Ok(())
}

// --------------------- Prefix filtering ---------------------

#[test]
fn prefix_yields_only_matching_keys() -> Result<()> {
    let dir = tempdir()?;
    let db = seeded_db(dir.path())?;

    let mut iter = db.iter(IteratorOptions {
        prefix: b"a".to_vec(),
        reverse: false,
    })?;
    let mut keys = Vec::new();
    while iter.valid() {
        keys.push(iter.key().to_vec());
        iter.next();
    }

    assert_eq!(keys, vec![b"acorn".to_vec(), b"apple".to_vec()]);
    Ok(())
}

#[test]
fn prefix_with_no_matches_is_immediately_invalid() -> Result<()> {
    let dir = tempdir()?;
    let db = seeded_db(dir.path())?;

    let iter = db.iter(IteratorOptions {
        prefix: b"zzz".to_vec(),
        reverse: false,
    })?;
    assert!(!iter.valid());
    Ok(())
}

// --------------------- Snapshot semantics ---------------------

#[test]
fn iterator_ignores_writes_made_after_creation() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;
    db.put(b"k1", b"v1")?;

    let mut iter = db.iter(IteratorOptions::default())?;
    db.put(b"k2", b"v2")?;

    let mut keys = Vec::new();
    iter.rewind();
    while iter.valid() {
        keys.push(iter.key().to_vec());
        iter.next();
    }
    assert_eq!(keys, vec![b"k1".to_vec()]);
    Ok(())
}

#[test]
fn iterator_sees_one_entry_per_live_key() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    db.put(b"k", b"v1")?;
    db.put(b"k", b"v2")?;
    db.put(b"gone", b"v")?;
    db.delete(b"gone")?;

    let mut iter = db.iter(IteratorOptions::default())?;
    let mut entries = Vec::new();
    while iter.valid() {
        entries.push((iter.key().to_vec(), iter.value()?));
        iter.next();
    }
    assert_eq!(entries, vec![(b"k".to_vec(), b"v2".to_vec())]);
    Ok(())
}

// --------------------- Lifecycle ---------------------

#[test]
fn iterator_on_empty_db_is_invalid() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    let iter = db.iter(IteratorOptions::default())?;
    assert!(!iter.valid());
    Ok(())
}

#[test]
fn closed_iterator_stops_yielding() -> Result<()> {
    let dir = tempdir()?;
    let db = seeded_db(dir.path())?;

    let mut iter = db.iter(IteratorOptions::default())?;
    assert!(iter.valid());
    iter.close();
    assert!(!iter.valid());
    Ok(())
}

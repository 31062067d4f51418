use super::helpers::{data_file_count, test_options};
use crate::*;
use anyhow::Result;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

// --------------------- Basic put / get / delete ---------------------

#[test]
fn put_and_get() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    db.put(b"name", b"driftkv")?;
    assert_eq!(db.get(b"name")?, b"driftkv");
    Ok(())
}

#[test]
fn delete_removes_key() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    db.put(b"name", b"driftkv")?;
    db.delete(b"name")?;
    assert!(matches!(db.get(b"name"), Err(Error::KeyNotFound)));
    Ok(())
}

#[test]
fn overwrite_returns_latest() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    db.put(b"k", b"v1")?;
    db.put(b"k", b"v2")?;
    assert_eq!(db.get(b"k")?, b"v2");
    Ok(())
}

#[test]
fn put_after_delete_resurrects() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    db.put(b"k", b"v1")?;
    db.delete(b"k")?;
    db.put(b"k", b"v2")?;
    assert_eq!(db.get(b"k")?, b"v2");
    Ok(())
}

#[test]
fn delete_of_absent_key_is_noop() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    db.delete(b"never-written")?;
    assert_eq!(data_file_count(dir.path()), 0, "no-op must not append");
    Ok(())
}

// --------------------- Key validation ---------------------

#[test]
fn put_rejects_empty_key() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    assert!(matches!(db.put(b"", b"v"), Err(Error::KeyIsEmpty)));
    Ok(())
}

#[test]
fn delete_rejects_empty_key() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    assert!(matches!(db.delete(b""), Err(Error::KeyIsEmpty)));
    Ok(())
}

#[test]
fn get_rejects_empty_key() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    assert!(matches!(db.get(b""), Err(Error::KeyIsEmpty)));
    Ok(())
}

// --------------------- Rotation ---------------------

#[test]
fn active_segment_rotates_at_size_limit() -> Result<()> {
    let dir = tempdir()?;
    let mut options = test_options(dir.path());
    options.data_file_size = 128;
    let db = DB::open(options)?;

    let value = vec![b'x'; 1024];
    for i in 0..40u32 {
        db.put(format!("k{:02}", i).as_bytes(), &value)?;
    }

    assert!(
        data_file_count(dir.path()) >= 2,
        "expected multiple segments, got {}",
        data_file_count(dir.path())
    );
    assert_eq!(db.get(b"k17")?, value);
    Ok(())
}

#[test]
fn reads_span_older_segments() -> Result<()> {
    let dir = tempdir()?;
    let mut options = test_options(dir.path());
    options.data_file_size = 256;
    let db = DB::open(options)?;

    for i in 0..50u32 {
        db.put(
            format!("key{:03}", i).as_bytes(),
            format!("val{:03}", i).as_bytes(),
        )?;
    }

    for i in 0..50u32 {
        assert_eq!(
            db.get(format!("key{:03}", i).as_bytes())?,
            format!("val{:03}", i).into_bytes()
        );
    }
    Ok(())
}

// --------------------- Sync ---------------------

#[test]
fn sync_flushes_without_error() -> Result<()> {
    let dir = tempdir()?;
    let db = DB::open(test_options(dir.path()))?;

    db.put(b"k", b"v")?;
    db.sync()?;
    Ok(())
}

#[test]
fn sync_writes_mode_roundtrips() -> Result<()> {
    let dir = tempdir()?;
    let mut options = test_options(dir.path());
    options.sync_writes = true;
    let db = DB::open(options)?;

    db.put(b"durable", b"yes")?;
    assert_eq!(db.get(b"durable")?, b"yes");
    Ok(())
}

// --------------------- Options validation ---------------------

#[test]
fn open_rejects_zero_data_file_size() {
    let dir = tempdir().unwrap();
    let mut options = test_options(dir.path());
    options.data_file_size = 0;

    assert!(matches!(
        DB::open(options),
        Err(Error::InvalidOptions(_))
    ));
}

#[test]
fn open_rejects_empty_dir_path() {
    let mut options = test_options(std::path::Path::new(""));
    options.dir_path = std::path::PathBuf::new();

    assert!(matches!(
        DB::open(options),
        Err(Error::InvalidOptions(_))
    ));
}

// --------------------- Concurrency ---------------------

#[test]
fn concurrent_writers_and_readers() -> Result<()> {
    let dir = tempdir()?;
    let db = Arc::new(DB::open(test_options(dir.path()))?);

    let mut handles = Vec::new();
    for t in 0..4u32 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for i in 0..100u32 {
                let key = format!("t{}-k{:03}", t, i);
                db.put(key.as_bytes(), key.as_bytes()).unwrap();
                // read back through the shared engine
                assert_eq!(db.get(key.as_bytes()).unwrap(), key.into_bytes());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.list_keys()?.len(), 400);
    for t in 0..4u32 {
        for i in 0..100u32 {
            let key = format!("t{}-k{:03}", t, i);
            assert_eq!(db.get(key.as_bytes())?, key.into_bytes());
        }
    }
    Ok(())
}

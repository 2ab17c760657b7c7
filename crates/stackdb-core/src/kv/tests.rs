use super::*;
use crate::{
    cursor::{collect_keys, collect_pairs},
    error::ErrorClass,
};
use std::sync::Arc;

fn keys(db: &MemoryDb, opts: &IteratorOptions) -> Vec<Vec<u8>> {
    db.view(|txn| collect_keys(&mut txn.new_iterator(opts)))
        .expect("iterate")
}

#[test]
fn get_set_delete_roundtrip() {
    let db = MemoryDb::new();

    db.update(|txn| txn.set(b"k", b"v")).expect("set");
    let item = db.view(|txn| txn.get(b"k")).expect("get");
    assert_eq!(item.value, b"v".to_vec());
    assert_eq!(db.len(), 1);

    db.update(|txn| txn.delete(b"k")).expect("delete");
    let err = db.view(|txn| txn.get(b"k")).unwrap_err();
    assert!(err.is_not_found());
    assert!(db.is_empty());
}

#[test]
fn transaction_sees_its_own_writes() {
    let db = MemoryDb::new();
    db.update(|txn| txn.set(b"b", b"old")).expect("seed");

    db.update(|txn| {
        txn.set(b"a", b"new")?;
        txn.delete(b"b")?;

        assert_eq!(txn.get(b"a")?.value, b"new".to_vec());
        assert!(txn.get(b"b").unwrap_err().is_not_found());
        assert_eq!(
            collect_keys(&mut txn.new_iterator(&IteratorOptions::default()))?,
            vec![b"a".to_vec()]
        );
        Ok(())
    })
    .expect("write");
}

#[test]
fn readers_keep_their_snapshot() {
    let db = MemoryDb::new();
    db.update(|txn| txn.set(b"k", b"1")).expect("seed");

    let reader = db.begin(false);
    db.update(|txn| txn.set(b"k", b"2")).expect("overwrite");

    assert_eq!(reader.get(b"k").expect("snapshot").value, b"1".to_vec());
    reader.discard();

    let fresh = db.view(|txn| txn.get(b"k")).expect("fresh");
    assert_eq!(fresh.value, b"2".to_vec());
}

#[test]
fn concurrent_writers_on_same_key_conflict() {
    let db = MemoryDb::new();
    db.update(|txn| txn.set(b"k", b"0")).expect("seed");

    let first = db.begin(true);
    let second = db.begin(true);

    first.get(b"k").expect("read");
    second.get(b"k").expect("read");
    first.set(b"k", b"1").expect("stage");
    second.set(b"k", b"2").expect("stage");

    first.commit().expect("first commit wins");
    let err = second.commit().unwrap_err();
    assert_eq!(err.class, ErrorClass::Conflict);

    let item = db.view(|txn| txn.get(b"k")).expect("get");
    assert_eq!(item.value, b"1".to_vec());
}

#[test]
fn scan_conflicts_with_insert_into_scanned_prefix() {
    let db = MemoryDb::new();

    let scanner = db.begin(true);
    {
        let cursor = scanner.new_iterator(&IteratorOptions::prefix(b"p"));
        assert!(!cursor.valid());
    }
    scanner.set(b"summary", b"empty").expect("stage");

    db.update(|txn| txn.set(b"p1", b"x")).expect("insert");

    let err = scanner.commit().unwrap_err();
    assert_eq!(err.class, ErrorClass::Conflict);
}

#[test]
fn read_only_transaction_rejects_writes() {
    let db = MemoryDb::new();

    let err = db.view(|txn| txn.set(b"k", b"v")).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
    assert_eq!(err.message, "write on a read-only transaction");
}

#[test]
fn failed_update_is_discarded() {
    let db = MemoryDb::new();

    let err = db
        .update(|txn| {
            txn.set(b"k", b"v")?;
            Err::<(), _>(InternalError::invalid_argument(ErrorOrigin::Kv, "abort"))
        })
        .unwrap_err();

    assert_eq!(err.message, "abort");
    assert!(db.is_empty());
}

#[test]
fn expired_entries_are_invisible() {
    let db = MemoryDb::new();

    db.update(|txn| {
        txn.set_entry(Entry::new(b"gone".to_vec(), b"x".to_vec()).with_expires_at(1))?;
        let kept = Entry::new(b"kept".to_vec(), b"y".to_vec());
        txn.set_entry(kept.with_ttl(Duration::from_secs(3600)))
    })
    .expect("write");

    assert!(db.view(|txn| txn.get(b"gone")).unwrap_err().is_not_found());
    assert_eq!(keys(&db, &IteratorOptions::default()), vec![b"kept".to_vec()]);
    assert_eq!(db.len(), 1);
}

#[test]
fn user_meta_is_preserved() {
    let db = MemoryDb::new();

    db.update(|txn| txn.set_entry(Entry::new(b"k".to_vec(), b"v".to_vec()).with_meta(42)))
        .expect("write");

    let meta = db
        .view(|txn| {
            let mut cursor = txn.new_iterator(&IteratorOptions::default());
            cursor.rewind();
            Ok(cursor.item().map(|i| i.user_meta))
        })
        .expect("read");
    assert_eq!(meta, Some(42));
}

#[test]
fn prefix_iteration_forward_reverse_and_seek() {
    let db = MemoryDb::new();

    db.update(|txn| {
        for key in [&b"a1"[..], b"b1", b"b2", b"b3", b"c1"] {
            txn.set(key, key)?;
        }
        Ok(())
    })
    .expect("write");

    let forward = keys(&db, &IteratorOptions::prefix(b"b"));
    assert_eq!(forward, vec![b"b1".to_vec(), b"b2".to_vec(), b"b3".to_vec()]);

    let reverse = keys(&db, &IteratorOptions::prefix(b"b").reversed(true));
    assert_eq!(reverse, vec![b"b3".to_vec(), b"b2".to_vec(), b"b1".to_vec()]);

    db.view(|txn| {
        let mut fwd = txn.new_iterator(&IteratorOptions::default());
        fwd.seek(b"b15");
        assert_eq!(fwd.key()?, b"b2".to_vec());

        let mut rev = txn.new_iterator(&IteratorOptions::default().reversed(true));
        rev.seek(b"b15");
        assert_eq!(rev.key()?, b"b1".to_vec());

        rev.seek(b"a");
        assert!(!rev.valid());
        Ok(())
    })
    .expect("seek");
}

#[test]
fn nested_options_prepend_fragment() {
    let opts = IteratorOptions::prefix(b"x").reversed(true).nested(b"store");

    assert_eq!(opts.prefix, b"storex".to_vec());
    assert!(opts.reverse);
}

#[test]
fn sequence_leases_blocks_and_releases_the_rest() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());

    let seq = Sequence::new(Arc::clone(&db), b"seq", 10).expect("sequence");
    assert_eq!(seq.next().expect("0"), 0);
    assert_eq!(seq.next().expect("1"), 1);

    let ceiling = db.view(|txn| txn.get(b"seq")).expect("ceiling");
    assert_eq!(ceiling.value, 10u64.to_be_bytes().to_vec());

    seq.release().expect("release");
    let resumed = Sequence::new(Arc::clone(&db), b"seq", 10).expect("resume");
    assert_eq!(resumed.next().expect("next"), 2);
}

#[test]
fn sequence_refills_past_the_block() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let seq = Sequence::new(db, b"seq", 2).expect("sequence");

    let drawn: Vec<u64> = (0..5).map(|_| seq.next().expect("next")).collect();
    assert_eq!(drawn, vec![0, 1, 2, 3, 4]);
}

#[test]
fn zero_bandwidth_is_rejected() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());

    let err = Sequence::new(db, b"seq", 0).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
}

#[test]
fn snapshot_file_roundtrip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("db.cbor");

    let db = MemoryDb::new();
    db.update(|txn| {
        txn.set(b"a", b"1")?;
        txn.set_entry(Entry::new(b"b".to_vec(), b"2".to_vec()).with_meta(3))
    })
    .expect("write");
    db.save_snapshot(&path).expect("save");

    let reopened = MemoryDb::open_snapshot(&path).expect("open");
    let pairs = reopened
        .view(|txn| collect_pairs(&mut txn.new_iterator(&IteratorOptions::default())))
        .expect("pairs");
    assert_eq!(
        pairs,
        vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec())
        ]
    );

    let meta = reopened.view(|txn| txn.get(b"b")).expect("b").user_meta;
    assert_eq!(meta, 3);
}

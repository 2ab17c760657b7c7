use super::*;
use crate::{
    cursor::collect_pairs,
    error::ErrorClass,
    kv::{DatabaseExt, MemoryDb},
};

fn refs() -> RefStore {
    RefStore::new(PrefixStore::new(b"r"))
}

#[test]
fn set_then_get_and_iterate_roundtrip() {
    let db = MemoryDb::new();
    let store = refs();

    db.update(|txn| {
        let r = store.instance(txn);
        r.set(b"child-1", RefEntry::new(b"parent-a".to_vec()))?;
        r.set(b"child-2", RefEntry::new(b"parent-a".to_vec()).with_value(b"data".to_vec()))?;
        r.set(b"child-3", RefEntry::new(b"parent-b".to_vec()))?;
        Ok(())
    })
    .expect("write");

    db.view(|txn| {
        let r = store.instance(txn);
        assert_eq!(r.get(b"parent-a")?, b"child-1".to_vec());
        assert_eq!(r.get(b"parent-b")?, b"child-3".to_vec());

        let pairs = collect_pairs(&mut r.new_iterator(&IteratorOptions::default()))?;
        let expected: Vec<(Vec<u8>, Vec<u8>)> = vec![
            (b"parent-a".to_vec(), b"child-1".to_vec()),
            (b"parent-a".to_vec(), b"child-2".to_vec()),
            (b"parent-b".to_vec(), b"child-3".to_vec()),
        ];
        assert_eq!(pairs, expected);

        let item = r.get_exact(b"parent-a", b"child-2")?.expect("pair exists");
        assert_eq!(item.value, Some(b"data".to_vec()));
        assert_eq!(r.get_exact(b"parent-a", b"child-1")?.and_then(|i| i.value), None);
        Ok(())
    })
    .expect("read");
}

#[test]
fn physical_layout_is_prefix_then_key_with_length_meta() {
    let db = MemoryDb::new();

    db.update(|txn| refs().instance(txn).set(b"BB", RefEntry::new(b"A".to_vec())))
        .expect("write");

    let item = db.view(|txn| txn.get(b"rABB")).expect("raw entry");
    assert_eq!(item.user_meta, 2);
    assert!(item.value.is_empty());
}

#[test]
fn get_skips_longer_prefix_parts() {
    let db = MemoryDb::new();
    let store = refs();

    db.update(|txn| {
        let r = store.instance(txn);
        r.set(b"1", RefEntry::new(b"ab".to_vec()))?;
        r.set(b"2", RefEntry::new(b"a".to_vec()))?;
        Ok(())
    })
    .expect("write");

    let key = db.view(|txn| store.instance(txn).get(b"a")).expect("get");
    assert_eq!(key, b"2".to_vec());

    let err = db.view(|txn| store.instance(txn).get(b"zz")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn oversized_key_part_is_rejected() {
    let db = MemoryDb::new();

    let err = db
        .update(|txn| refs().instance(txn).set(&[7u8; 256], RefEntry::new(b"p".to_vec())))
        .unwrap_err();

    assert_eq!(err.class, ErrorClass::InvalidArgument);
}

#[test]
fn corrupt_length_meta_surfaces_codec_error() {
    let db = MemoryDb::new();

    db.update(|txn| txn.set_entry(Entry::new(b"rxy".to_vec(), Vec::new()).with_meta(9)))
        .expect("write");

    let opts = IteratorOptions::default();
    let err = db
        .view(|txn| collect_pairs(&mut refs().instance(txn).new_iterator(&opts)))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Codec);
}

#[test]
fn delete_by_full_key_and_by_pair() {
    let db = MemoryDb::new();
    let store = refs();

    db.update(|txn| {
        let r = store.instance(txn);
        r.set(b"k1", RefEntry::new(b"p".to_vec()))?;
        r.set(b"k2", RefEntry::new(b"p".to_vec()))?;

        r.delete(b"pk1")?;
        r.delete_ref(b"p", b"k2")?;
        Ok(())
    })
    .expect("write");

    let opts = IteratorOptions::default();
    let remaining = db
        .view(|txn| crate::cursor::count(&mut store.instance(txn).new_iterator(&opts)))
        .expect("count");
    assert_eq!(remaining, 0);
}

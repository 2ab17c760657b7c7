use super::*;
use crate::{
    cursor::{Slice, collect_pairs},
    kv::{DatabaseExt, MemoryDb},
    reference::{RefEntry, RefStore},
    store::PrefixStore,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn refs() -> RefStore {
    RefStore::new(PrefixStore::new(b"R"))
}

// Every letter A..Z as a prefix part, each with key parts "" and a..z.
fn alphabet_db() -> MemoryDb {
    let db = MemoryDb::new();

    db.update(|txn| {
        let r = refs().instance(txn);
        for upper in b'A'..=b'Z' {
            r.set(b"", RefEntry::new(vec![upper]))?;
            for lower in b'a'..=b'z' {
                r.set(&[lower], RefEntry::new(vec![upper]))?;
            }
        }
        Ok(())
    })
    .expect("seed");

    db
}

fn run(db: &MemoryDb, chunks: Vec<Chunk>, reverse: bool) -> Vec<(Vec<u8>, Vec<u8>)> {
    db.view(|txn| {
        let r = refs().instance(txn);
        collect_pairs(&mut scan(&r, Slice::new(chunks), reverse))
    })
    .expect("scan")
}

fn included(b: &[u8]) -> Bound<Vec<u8>> {
    Bound::Included(b.to_vec())
}

fn excluded(b: &[u8]) -> Bound<Vec<u8>> {
    Bound::Excluded(b.to_vec())
}

#[test]
fn half_open_forward_chunk_stops_at_high() {
    let db = alphabet_db();

    let pairs = run(&db, vec![Chunk::new(included(b"A"), excluded(b"B"))], false);

    assert_eq!(pairs.len(), 27);
    assert!(pairs.iter().all(|(a, _)| a == b"A"));
    assert_eq!(pairs[0].1, Vec::<u8>::new());
    assert_eq!(pairs[26].1, b"z".to_vec());
}

#[test]
fn open_closed_reverse_chunk_covers_high_prefix_only() {
    let db = alphabet_db();

    let pairs = run(&db, vec![Chunk::new(excluded(b"X"), included(b"Y"))], true);

    assert_eq!(pairs.len(), 27);
    assert!(pairs.iter().all(|(a, _)| a == b"Y"));
    assert_eq!(pairs[0].1, b"z".to_vec());
    assert_eq!(pairs[26].1, Vec::<u8>::new());
}

#[test]
fn prefix_chunk_matches_one_letter() {
    let db = alphabet_db();

    let pairs = run(&db, vec![Chunk::prefix(b"Q".to_vec())], false);
    assert_eq!(pairs.len(), 27);

    let reversed = run(&db, vec![Chunk::prefix(b"Q".to_vec())], true);
    let mut expected = pairs;
    expected.reverse();
    assert_eq!(reversed, expected);
}

#[test]
fn chunks_are_walked_in_given_order() {
    let db = alphabet_db();

    let chunks = vec![Chunk::point(b"Ab".to_vec()), Chunk::point(b"Cc".to_vec())];
    let pairs = run(&db, chunks, false);

    assert_eq!(
        pairs,
        vec![
            (b"A".to_vec(), b"b".to_vec()),
            (b"C".to_vec(), b"c".to_vec())
        ]
    );
}

#[test]
fn inverted_bounds_give_an_empty_chunk() {
    assert!(Chunk::new(included(b"B"), included(b"A")).is_empty());
    assert!(Chunk::new(included(b"A"), excluded(b"A")).is_empty());
    assert!(Chunk::new(excluded(b"A"), included(b"A")).is_empty());
    assert!(Chunk::new(excluded(b"\xFF\xFF"), Bound::Unbounded).is_empty());
    assert!(!Chunk::new(included(b"A"), included(b"A")).is_empty());
    assert!(!Chunk::all().is_empty());

    let db = alphabet_db();
    assert!(run(&db, vec![Chunk::new(included(b"M"), excluded(b"C"))], false).is_empty());
}

#[test]
fn unbounded_chunk_scans_everything() {
    let db = alphabet_db();

    assert_eq!(run(&db, vec![Chunk::all()], false).len(), 26 * 27);
    assert_eq!(run(&db, vec![Chunk::all()], true).len(), 26 * 27);
}

#[test]
fn scan_keys_returns_key_parts() {
    let db = alphabet_db();

    let keys = db
        .view(|txn| {
            let r = refs().instance(txn);
            scan_keys(&r, Slice::new(vec![Chunk::new(included(b"Dx"), Bound::Unbounded)]), false)
        })
        .expect("keys");

    assert_eq!(keys[..3], [b"x".to_vec(), b"y".to_vec(), b"z".to_vec()]);
    assert_eq!(keys[3], Vec::<u8>::new());
}

///
/// PROPERTIES
///

fn byte_string() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(vec![0u8, 1, 2, 0xFE, 0xFF]), 0..3)
}

fn bound() -> impl Strategy<Value = Bound<Vec<u8>>> {
    prop_oneof![
        Just(Bound::Unbounded),
        byte_string().prop_map(Bound::Included),
        byte_string().prop_map(Bound::Excluded),
    ]
}

fn seeded(entries: &BTreeSet<(u8, Vec<u8>)>) -> MemoryDb {
    let db = MemoryDb::new();

    db.update(|txn| {
        let r = refs().instance(txn);
        for (a, b) in entries {
            r.set(b, RefEntry::new(vec![*a]))?;
        }
        Ok(())
    })
    .expect("seed");

    db
}

fn expected(entries: &BTreeSet<(u8, Vec<u8>)>, chunks: &[Chunk], reverse: bool) -> Vec<Vec<u8>> {
    let mut out: Vec<Vec<u8>> = entries
        .iter()
        .map(|(a, b)| [&[*a][..], b].concat())
        .filter(|key| chunks.iter().any(|c| c.contains(key)))
        .collect();
    if reverse {
        out.reverse();
    }

    out
}

fn scanned(db: &MemoryDb, chunks: Vec<Chunk>, reverse: bool) -> Vec<Vec<u8>> {
    run(db, chunks, reverse)
        .into_iter()
        .map(|(a, b)| [a, b].concat())
        .collect()
}

fn entries() -> impl Strategy<Value = BTreeSet<(u8, Vec<u8>)>> {
    prop::collection::btree_set(
        (prop::sample::select(vec![0u8, 1, 2, 0xFE, 0xFF]), byte_string()),
        0..24,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn single_chunk_matches_bound_predicate(
        entries in entries(),
        low in bound(),
        high in bound(),
        reverse in any::<bool>(),
    ) {
        let db = seeded(&entries);
        let chunk = Chunk::new(low, high);

        let want = expected(&entries, std::slice::from_ref(&chunk), reverse);
        prop_assert_eq!(scanned(&db, vec![chunk], reverse), want);
    }

    #[test]
    fn split_chunks_form_one_ordered_stream(
        entries in entries(),
        low in bound(),
        mid in byte_string(),
        high in bound(),
        reverse in any::<bool>(),
    ) {
        let db = seeded(&entries);
        let mut chunks = vec![
            Chunk::new(low, Bound::Excluded(mid.clone())),
            Chunk::new(Bound::Included(mid), high),
        ];

        let want = expected(&entries, &chunks, reverse);
        if reverse {
            chunks.reverse();
        }
        prop_assert_eq!(scanned(&db, chunks, reverse), want);
    }
}

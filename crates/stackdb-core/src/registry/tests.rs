use super::*;
use crate::{error::ErrorClass, kv::MemoryDb};
use std::thread;

fn registry(db: &MemoryDb) -> NameRegistry {
    NameRegistry::new(Arc::new(db.clone()), b"reg").expect("registry")
}

#[test]
fn tags_start_at_one_and_are_stable() {
    let db = MemoryDb::new();
    let reg = registry(&db);

    assert_eq!(reg.name("foo").expect("foo"), vec![0x01]);
    assert_eq!(reg.name("bar").expect("bar"), vec![0x02]);
    assert_eq!(reg.name("foo").expect("foo again"), vec![0x01]);
}

#[test]
fn mapping_survives_a_fresh_registry_over_the_same_db() {
    let db = MemoryDb::new();
    registry(&db).name("foo").expect("foo");
    registry(&db).name("bar").expect("bar");

    let reopened = registry(&db);
    assert_eq!(reopened.name("bar").expect("bar"), vec![0x02]);
    assert_eq!(reopened.tag_of("baz").expect("lookup"), None);
    assert_eq!(reopened.names().expect("names").len(), 2);
}

#[test]
fn one_byte_registry_fills_up() {
    let db = MemoryDb::new();
    let reg = registry(&db);

    for i in 0..255 {
        reg.name(&format!("n{i}")).expect("within capacity");
    }

    let err = reg.name("overflow").unwrap_err();
    assert_eq!(err.class, ErrorClass::Full);
    assert_eq!(err.message, "registry full");
}

#[test]
fn wider_tags_are_big_endian() {
    let db = MemoryDb::new();
    let reg = NameRegistry::with_tag_len(Arc::new(db), b"wide", 2).expect("registry");

    assert_eq!(reg.name("first").expect("first"), vec![0x00, 0x01]);
}

#[test]
fn invalid_construction_is_rejected() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());

    let err = NameRegistry::with_tag_len(Arc::clone(&db), b"r", 9).unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);

    let err = NameRegistry::new(db, b"").unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
}

#[test]
fn sub_registry_nests_under_parent_tag() {
    let db = MemoryDb::new();
    let reg = registry(&db);

    let sub = reg.sub_registry("child").expect("sub");
    assert_eq!(sub.prefix(), b"reg\x01");
    assert_eq!(sub.name("x").expect("x"), vec![0x01]);
    assert_eq!(reg.name("other").expect("other"), vec![0x02]);
}

#[test]
fn concurrent_callers_agree_on_tags() {
    let db = MemoryDb::new();
    let reg = Arc::new(registry(&db));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let reg = Arc::clone(&reg);
            thread::spawn(move || {
                ["a", "b", "c"]
                    .iter()
                    .map(|n| reg.name(n).expect("name"))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("thread"))
        .collect();

    assert!(results.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(reg.names().expect("names").len(), 3);
}

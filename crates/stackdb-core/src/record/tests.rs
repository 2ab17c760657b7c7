use super::*;
use crate::{
    cursor::{collect_keys, collect_values},
    error::ErrorClass,
    index::{Component, ConcatIndexer},
    kv::{DatabaseExt, MemoryDb},
    lex::{LexDecode, LexEncode, inverted},
    value::{FieldValue, ValueKind},
};
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};

///
/// Task
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
struct Task {
    #[serde(skip)]
    id: u64,
    title: String,
    priority: i64,
    done: bool,
}

impl Record for Task {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

impl FieldValues for Task {
    fn get_value(&self, path: &str) -> Option<Value> {
        match path {
            "title" => Some(self.title.to_value()),
            "priority" => Some(self.priority.to_value()),
            "done" => Some(self.done.to_value()),
            _ => None,
        }
    }
}

fn task(title: &str, priority: i64, done: bool) -> Task {
    Task {
        id: 0,
        title: title.to_string(),
        priority,
        done,
    }
}

fn setup() -> (Arc<dyn Database>, RecordStore<Task>) {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let store = RecordStore::builder(PrefixStore::new(b"tasks"))
        .sequence(Arc::clone(&db), b"tasks-seq".to_vec())
        .build()
        .expect("build");

    (db, store)
}

fn populate(db: &Arc<dyn Database>, store: &RecordStore<Task>) -> Vec<u64> {
    db.update(|txn| {
        let tasks = store.instance(txn);
        let mut ids = Vec::new();
        for (title, priority, done) in [
            ("write", 2, false),
            ("review", 3, true),
            ("ship", 1, false),
            ("plan", 3, false),
            ("test", 2, true),
        ] {
            ids.push(tasks.set(&mut task(title, priority, done))?);
        }
        Ok(ids)
    })
    .expect("populate")
}

fn by_priority() -> Index<Task> {
    Index::new(
        "by_priority",
        ConcatIndexer::new(vec![Component::new("priority", ValueKind::Int)]).expect("indexer"),
    )
}

#[test]
fn sequence_ids_start_at_one() {
    let (db, store) = setup();

    assert_eq!(populate(&db, &store), vec![1, 2, 3, 4, 5]);

    let got = db
        .view(|txn| store.instance(txn).get(&3))
        .expect("get");
    assert_eq!(got.id, 3);
    assert_eq!(got.title, "ship");
}

#[test]
fn set_returns_the_assigned_id_and_updates_the_record() {
    let (db, store) = setup();

    let mut fresh = task("write", 1, false);
    let id = db
        .update(|txn| store.instance(txn).set(&mut fresh))
        .expect("set");
    assert_eq!(id, 1);
    assert_eq!(fresh.id, 1);

    let mut explicit = task("pinned", 9, false);
    explicit.id = 40;
    let id = db
        .update(|txn| store.instance(txn).set(&mut explicit))
        .expect("set");
    assert_eq!(id, 40);
}

#[test]
fn zero_id_without_source_is_rejected() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let store = RecordStore::<Task>::builder(PrefixStore::new(b"tasks"))
        .build()
        .expect("build");

    let err = db
        .update(|txn| store.instance(txn).set(&mut task("write", 1, false)))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
    assert_eq!(err.message, "zero id and no id source");
}

#[test]
fn missing_records_and_get_many() {
    let (db, store) = setup();
    populate(&db, &store);

    db.update(|txn| store.instance(txn).delete(&2))
        .expect("delete");

    db.view(|txn| {
        let tasks = store.instance(txn);
        assert!(!tasks.exists(&2)?);
        assert!(tasks.get(&2).unwrap_err().is_not_found());

        let many = tasks.get_many(&[1, 2, 5])?;
        let titles: Vec<Option<String>> = many.into_iter().map(|t| t.map(|t| t.title)).collect();
        assert_eq!(
            titles,
            vec![Some("write".to_string()), None, Some("test".to_string())]
        );
        Ok(())
    })
    .expect("view");
}

#[test]
fn iteration_yields_typed_ids() {
    let (db, store) = setup();
    populate(&db, &store);

    db.view(|txn| {
        let tasks = store.instance(txn);
        let mut all = tasks.new_iterator(&IteratorOptions::default());
        let records = collect_values(&mut all)?;
        assert_eq!(
            records.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );

        let mut reversed = tasks.new_iterator(&IteratorOptions::default().reversed(true));
        assert_eq!(collect_keys(&mut reversed)?, vec![5, 4, 3, 2, 1]);
        Ok(())
    })
    .expect("view");
}

#[test]
fn range_bounds_are_exact() {
    let (db, store) = setup();
    populate(&db, &store);

    db.view(|txn| {
        let tasks = store.instance(txn);
        let ids = |low, high, reverse| -> Result<Vec<u64>, InternalError> {
            let mut cursor = tasks.iter_range(low, high, reverse)?;
            collect_keys(&mut cursor)
        };

        assert_eq!(ids(Bound::Included(2), Bound::Excluded(4), false)?, vec![2, 3]);
        assert_eq!(ids(Bound::Excluded(2), Bound::Included(4), false)?, vec![3, 4]);
        assert_eq!(ids(Bound::Included(2), Bound::Included(4), true)?, vec![4, 3, 2]);
        assert_eq!(ids(Bound::Excluded(2), Bound::Unbounded, true)?, vec![5, 4, 3]);
        assert_eq!(ids(Bound::Unbounded, Bound::Excluded(3), false)?, vec![1, 2]);
        assert_eq!(ids(Bound::Included(9), Bound::Unbounded, false)?, Vec::<u64>::new());
        Ok(())
    })
    .expect("view");
}

#[test]
fn query_filters_with_the_default_engine() {
    let (db, store) = setup();
    populate(&db, &store);

    db.view(|txn| {
        let tasks = store.instance(txn);

        let mut open = tasks.query("priority >= 2 && done == false")?;
        assert_eq!(collect_keys(&mut open)?, vec![1, 4]);

        let mut either = tasks.query("title == 'ship' || title == 'test'")?;
        assert_eq!(collect_keys(&mut either)?, vec![3, 5]);

        let err = tasks.query("priority >>").err().expect("syntax error");
        assert_eq!(err.class, ErrorClass::InvalidArgument);
        Ok(())
    })
    .expect("view");
}

#[test]
fn lookup_goes_through_named_indexes() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let store = RecordStore::builder(PrefixStore::new(b"tasks"))
        .sequence(Arc::clone(&db), b"tasks-seq".to_vec())
        .index(by_priority())
        .build()
        .expect("build");
    populate(&db, &store);

    db.view(|txn| {
        let tasks = store.instance(txn);

        let mut urgent = tasks.lookup("by_priority", &[PathBound::ge("priority", 2i64)], false)?;
        let found = collect_values(&mut urgent)?;
        assert_eq!(
            found.iter().map(|t| (t.id, t.priority)).collect::<Vec<_>>(),
            vec![(1, 2), (5, 2), (2, 3), (4, 3)]
        );

        let mut low = tasks.lookup("by_priority", &[PathBound::eq("priority", 1i64)], true)?;
        assert_eq!(collect_keys(&mut low)?, vec![3]);

        let err = tasks.lookup("by_title", &[], false).err().expect("unknown");
        assert_eq!(err.class, ErrorClass::InvalidArgument);
        Ok(())
    })
    .expect("view");
}

#[test]
fn add_index_backfills_existing_records() {
    let (db, store) = setup();
    populate(&db, &store);

    let indexed = db
        .update(|txn| store.add_index(txn, by_priority()))
        .expect("add index");
    assert_eq!(indexed, 5);
    assert!(store.index("by_priority").is_some());

    let hits = db
        .view(|txn| {
            let mut top = store
                .instance(txn)
                .lookup("by_priority", &[PathBound::eq("priority", 3i64)], false)?;
            collect_keys(&mut top)
        })
        .expect("lookup");
    assert_eq!(hits, vec![2, 4]);
}

#[test]
fn close_releases_leased_ids() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let config = StackConfig {
        sequence_bandwidth: 100,
        ..StackConfig::default()
    };
    let open = |db: &Arc<dyn Database>| {
        RecordStore::<Task>::builder(PrefixStore::new(b"tasks"))
            .sequence(Arc::clone(db), b"tasks-seq".to_vec())
            .config(config.clone())
            .build()
            .expect("build")
    };

    let first = open(&db);
    db.update(|txn| {
        let tasks = first.instance(txn);
        tasks.set(&mut task("a", 1, false))?;
        tasks.set(&mut task("b", 1, false))
    })
    .expect("set");
    first.close().expect("close");

    let second = open(&db);
    let id = db
        .update(|txn| second.instance(txn).set(&mut task("c", 1, false)))
        .expect("set");
    assert_eq!(id, 3);
}

#[test]
fn invalid_config_fails_the_build() {
    let config = StackConfig {
        sequence_bandwidth: 0,
        ..StackConfig::default()
    };

    let err = RecordStore::<Task>::builder(PrefixStore::new(b"tasks"))
        .config(config)
        .build()
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::InvalidArgument);
}

#[test]
fn documents_are_records_with_text_ids() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let counter = Arc::new(AtomicU64::new(0));
    let next = Arc::clone(&counter);
    let store = RecordStore::<Document>::builder(PrefixStore::new(b"docs"))
        .id_fn(move || Ok(format!("doc-{}", next.fetch_add(1, Ordering::SeqCst))))
        .build()
        .expect("build");

    let id = db
        .update(|txn| {
            store
                .instance(txn)
                .set(&mut Document::new().with("kind", "note"))
        })
        .expect("set");
    assert_eq!(id, "doc-0");
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let doc = db
        .view(|txn| store.instance(txn).get(&"doc-0".to_string()))
        .expect("get");
    assert_eq!(doc.id(), Some("doc-0"));
    assert_eq!(doc.get("kind"), Some(&Value::Text("note".to_string())));
}

///
/// NewestFirst
/// Inverted id encoding, so iteration runs from the highest id.
///

struct NewestFirst;

impl IdCodec<u64> for NewestFirst {
    fn encode(&self, id: &u64) -> Result<Vec<u8>, InternalError> {
        Ok(inverted(&id.to_lex()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<u64, InternalError> {
        Ok(u64::lex_decode(&inverted(bytes)).map_err(IdentityError::from)?)
    }
}

#[test]
fn custom_id_codec_controls_key_order() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let store = RecordStore::builder(PrefixStore::new(b"tasks"))
        .id_codec(NewestFirst)
        .sequence(Arc::clone(&db), b"tasks-seq".to_vec())
        .build()
        .expect("build");
    populate(&db, &store);

    assert_eq!(store.encode_id(&1).expect("encode"), inverted(&1u64.to_lex()));

    let ids = db
        .view(|txn| {
            let mut all = store.instance(txn).new_iterator(&IteratorOptions::default());
            collect_keys(&mut all)
        })
        .expect("iterate");
    assert_eq!(ids, vec![5, 4, 3, 2, 1]);

    let recent = db
        .view(|txn| {
            let mut older = store
                .instance(txn)
                .iter_range(Bound::Included(4), Bound::Unbounded, false)?;
            collect_keys(&mut older)
        })
        .expect("range");
    assert_eq!(recent, vec![4, 3, 2, 1]);
}

#[test]
fn weak_handles_follow_the_store() {
    let (_db, store) = setup();
    let weak = store.downgrade();

    assert!(weak.upgrade().is_some());
    drop(store);
    assert!(weak.upgrade().is_none());
}

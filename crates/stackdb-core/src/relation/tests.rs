use super::*;
use crate::{
    cursor::{collect_keys, collect_pairs, count},
    error::ErrorClass,
    ext::SetOptions,
    kv::{Database, DatabaseExt, MemoryDb},
    record::{Record, RecordStore},
    store::PrefixStore,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

///
/// Folder
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
struct Folder {
    #[serde(skip)]
    id: u64,
    name: String,
}

impl Record for Folder {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

///
/// Note
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
struct Note {
    #[serde(skip)]
    id: u64,
    folder: u64,
    text: String,
}

impl Record for Note {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

fn folder(name: &str) -> Folder {
    Folder {
        id: 0,
        name: name.to_string(),
    }
}

fn note(text: &str) -> Note {
    Note {
        id: 0,
        folder: 0,
        text: text.to_string(),
    }
}

fn store<T>(db: &Arc<dyn Database>, name: &str) -> RecordStore<T>
where
    T: Record + Serialize + serde::de::DeserializeOwned,
    T::Id: TryFrom<u64>,
{
    RecordStore::builder(PrefixStore::new(name))
        .sequence(Arc::clone(db), format!("{name}-seq"))
        .build()
        .expect("store")
}

fn stores() -> (Arc<dyn Database>, RecordStore<Folder>, RecordStore<Note>) {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let folders = store(&db, "folders");
    let notes = store(&db, "notes");

    (db, folders, notes)
}

fn raw_keys<T: Record>(db: &Arc<dyn Database>, records: &RecordStore<T>, name: &str) -> usize {
    let space = records.ext().extension_store(name).expect("space");

    db.view(|txn| count(&mut space.instance(txn).new_iterator(&Default::default())))
        .expect("count")
}

fn note_ids(db: &Arc<dyn Database>, notes: &RecordStore<Note>) -> Vec<u64> {
    db.view(|txn| {
        let mut all = notes.instance(txn).new_iterator(&Default::default());
        collect_keys(&mut all)
    })
    .expect("notes")
}

#[test]
fn deleting_a_parent_cascades_to_children() {
    let (db, folders, notes) = stores();
    let link = Association::builder("notes", &folders, &notes)
        .install()
        .expect("install");

    db.update(|txn| {
        let opts = SetOptions::new().with(Children(vec![note("first"), note("second")]));
        folders.instance(txn).set_with(&mut folder("inbox"), &opts)?;
        Ok(())
    })
    .expect("set parent");

    db.view(|txn| {
        let notes_of = link.instance(txn);
        assert_eq!(notes_of.children_count(&1)?, 2);
        assert_eq!(notes_of.get_parent_id(&2)?, 1);
        assert_eq!(notes_of.get_parent(&1)?.name, "inbox");

        let mut children = notes_of.children_iterator(&1, false)?;
        let texts: Vec<(u64, String)> = collect_pairs(&mut children)?
            .into_iter()
            .map(|(id, n)| (id, n.text))
            .collect();
        assert_eq!(
            texts,
            vec![(1, "first".to_string()), (2, "second".to_string())]
        );

        let mut reversed = notes_of.children_iterator(&1, true)?;
        assert_eq!(collect_keys(&mut reversed)?, vec![2, 1]);
        Ok(())
    })
    .expect("view");
    assert_eq!(raw_keys(&db, &notes, "notes"), 4);

    db.update(|txn| folders.instance(txn).delete(&1))
        .expect("delete parent");

    assert!(note_ids(&db, &notes).is_empty());
    assert_eq!(raw_keys(&db, &notes, "notes"), 0);
    assert!(!db.view(|txn| folders.instance(txn).exists(&1)).expect("exists"));
}

#[test]
fn children_need_an_existing_parent() {
    let (db, folders, notes) = stores();
    let link = Association::builder("notes", &folders, &notes)
        .install()
        .expect("install");

    let err = db
        .update(|txn| link.instance(txn).set_child(&99, &mut note("lost")))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Integrity);
    assert!(err.message.contains("failed to get parent"), "{}", err.message);

    let err = db
        .update(|txn| notes.instance(txn).set(&mut note("loose")))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Integrity);

    assert!(note_ids(&db, &notes).is_empty());
}

#[test]
fn orphans_are_accepted_when_allowed() {
    let (db, folders, notes) = stores();
    let link = Association::builder("notes", &folders, &notes)
        .allow_orphans()
        .install()
        .expect("install");

    let id = db
        .update(|txn| link.instance(txn).set_child(&99, &mut note("stray")))
        .expect("set orphan");

    db.view(|txn| {
        let notes_of = link.instance(txn);
        assert_eq!(notes_of.get_parent_id(&id)?, 99);

        let err = notes_of.get_parent(&id).unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message.starts_with("failed to get parent"));
        Ok(())
    })
    .expect("view");
}

#[test]
fn changing_the_parent_relinks_the_child() {
    let (db, folders, notes) = stores();
    let link = Association::builder("notes", &folders, &notes)
        .install()
        .expect("install");

    db.update(|txn| {
        let folder_store = folders.instance(txn);
        folder_store.set(&mut folder("inbox"))?;
        folder_store.set(&mut folder("archive"))?;

        let mut moved = note("moved");
        link.instance(txn).set_child(&1, &mut moved)?;
        link.instance(txn).set_child(&2, &mut moved)?;

        moved.text = "edited".to_string();
        notes.instance(txn).set(&mut moved)?;
        Ok(())
    })
    .expect("relink");

    db.view(|txn| {
        let notes_of = link.instance(txn);
        assert_eq!(notes_of.children_count(&1)?, 0);
        assert_eq!(notes_of.children_count(&2)?, 1);
        assert_eq!(notes_of.get_parent_id(&1)?, 2);
        Ok(())
    })
    .expect("view");
    assert_eq!(raw_keys(&db, &notes, "notes"), 2);
}

#[test]
fn extractor_reads_the_parent_from_the_child() {
    let (db, folders, notes) = stores();
    let link = Association::builder("notes", &folders, &notes)
        .with_pid_fn(|n: &Note| n.folder)
        .install()
        .expect("install");

    db.update(|txn| {
        let folder_store = folders.instance(txn);
        folder_store.set(&mut folder("inbox"))?;
        folder_store.set(&mut folder("archive"))?;

        let mut filed = note("filed");
        filed.folder = 1;
        notes.instance(txn).set(&mut filed)?;
        filed.folder = 2;
        notes.instance(txn).set(&mut filed)?;
        Ok(())
    })
    .expect("set");

    db.view(|txn| {
        let notes_of = link.instance(txn);
        assert_eq!(notes_of.children_count(&1)?, 0);
        assert_eq!(notes_of.children_count(&2)?, 1);
        assert_eq!(notes_of.get_parent(&1)?.name, "archive");
        Ok(())
    })
    .expect("view");
    // forward refs only
    assert_eq!(raw_keys(&db, &notes, "notes"), 1);

    db.update(|txn| notes.instance(txn).delete(&1))
        .expect("delete child");
    assert_eq!(raw_keys(&db, &notes, "notes"), 0);
}

#[test]
fn attach_backfills_populated_stores() {
    let (db, folders, notes) = stores();
    db.update(|txn| {
        folders.instance(txn).set(&mut folder("inbox"))?;
        for text in ["a", "b", "c"] {
            let mut n = note(text);
            n.folder = 1;
            notes.instance(txn).set(&mut n)?;
        }
        Ok(())
    })
    .expect("populate");

    let (link, replayed) = db
        .update(|txn| {
            Association::builder("notes", &folders, &notes)
                .with_pid_fn(|n: &Note| n.folder)
                .attach(txn)
        })
        .expect("attach");
    assert_eq!(replayed, 3);

    let linked = db
        .view(|txn| link.instance(txn).children_count(&1))
        .expect("count");
    assert_eq!(linked, 3);
}

///
/// Person / Team / Membership
///

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
struct Person {
    #[serde(skip)]
    id: u64,
    name: String,
}

impl Record for Person {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
struct Team {
    #[serde(skip)]
    id: u64,
    title: String,
}

impl Record for Team {
    type Id = u64;

    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct Membership {
    a: i64,
}

type Members = Relation<Person, Team, Membership>;

fn teams() -> (Arc<dyn Database>, RecordStore<Person>, RecordStore<Team>, Members) {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let people = store::<Person>(&db, "people");
    let teams = store::<Team>(&db, "teams");
    let members = Relation::install("members", &people, &teams).expect("relation");

    db.update(|txn| {
        for name in ["ann", "ben"] {
            people.instance(txn).set(&mut Person {
                id: 0,
                name: name.to_string(),
            })?;
        }
        for title in ["red", "blue", "green"] {
            teams.instance(txn).set(&mut Team {
                id: 0,
                title: title.to_string(),
            })?;
        }
        Ok(())
    })
    .expect("populate");

    (db, people, teams, members)
}

#[test]
fn relation_pairs_carry_data() {
    let (db, people, teams, members) = teams();
    let pair = RelationKey::new(1, 2);

    db.update(|txn| members.instance(txn).set(&pair, &Membership { a: 12 }))
        .expect("set");

    db.view(|txn| {
        let rel = members.instance(txn);
        assert_eq!(rel.get(&pair)?, Membership { a: 12 });
        assert!(rel.exists(&pair)?);
        assert!(!rel.exists(&RelationKey::new(2, 1))?);

        let mut all = rel.iter(false)?;
        assert_eq!(collect_keys(&mut all)?, vec![pair.clone()]);
        Ok(())
    })
    .expect("view");
    assert_eq!(raw_keys(&db, &teams, "members"), 1);
    assert_eq!(raw_keys(&db, &people, "members"), 1);

    db.update(|txn| people.instance(txn).delete(&1))
        .expect("delete left");

    db.view(|txn| {
        let rel = members.instance(txn);
        assert!(!rel.exists(&pair)?);
        assert!(rel.get(&pair).unwrap_err().is_not_found());
        assert_eq!(count(&mut rel.iter(false)?)?, 0);
        Ok(())
    })
    .expect("view");
    assert_eq!(raw_keys(&db, &teams, "members"), 0);
    assert_eq!(raw_keys(&db, &people, "members"), 0);
}

#[test]
fn relation_requires_both_endpoints() {
    let (db, _people, _teams, members) = teams();

    for pair in [RelationKey::new(9, 1), RelationKey::new(1, 9)] {
        let err = db
            .update(|txn| members.instance(txn).set(&pair, &Membership { a: 1 }))
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::Integrity);
    }

    let err = db
        .update(|txn| members.instance(txn).delete(&RelationKey::new(1, 1)))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn peers_of_one_endpoint() {
    let (db, _people, teams, members) = teams();

    db.update(|txn| {
        let rel = members.instance(txn);
        rel.set(&RelationKey::new(1, 1), &Membership { a: 1 })?;
        rel.set(&RelationKey::new(1, 3), &Membership { a: 3 })?;
        rel.set(&RelationKey::new(2, 3), &Membership { a: 23 })?;
        Ok(())
    })
    .expect("set");

    db.view(|txn| {
        let rel = members.instance(txn);

        let mut of_ann = rel.iter_left(&1, false)?;
        let pairs = collect_pairs(&mut of_ann)?;
        assert_eq!(
            pairs,
            vec![
                (RelationKey::new(1, 1), Membership { a: 1 }),
                (RelationKey::new(1, 3), Membership { a: 3 }),
            ]
        );

        let mut of_green = rel.iter_right(&3, true)?;
        assert_eq!(
            collect_keys(&mut of_green)?,
            vec![RelationKey::new(2, 3), RelationKey::new(1, 3)]
        );

        let mut all = rel.iter(false)?;
        assert_eq!(count(&mut all)?, 3);
        Ok(())
    })
    .expect("view");

    db.update(|txn| teams.instance(txn).delete(&3))
        .expect("delete right");
    let left = db
        .view(|txn| {
            let mut all = members.instance(txn).iter(false)?;
            collect_keys(&mut all)
        })
        .expect("iterate");
    assert_eq!(left, vec![RelationKey::new(1, 1)]);
}

#[test]
fn dropped_stores_surface_as_internal_errors() {
    let db: Arc<dyn Database> = Arc::new(MemoryDb::new());
    let people = store::<Person>(&db, "people");
    let teams = store::<Team>(&db, "teams");
    let members: Members = Relation::install("members", &people, &teams).expect("relation");
    drop(teams);

    let err = db
        .view(|txn| members.instance(txn).exists(&RelationKey::new(1, 1)))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Internal);
}

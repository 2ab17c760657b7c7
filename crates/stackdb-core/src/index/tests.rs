use super::*;
use crate::{
    cursor::{collect_keys, collect_values},
    error::ErrorClass,
    kv::{DatabaseExt, MemoryDb},
    lex::{LexEncode, inverted, pad_right},
    serialize::CborCodec,
    store::PrefixStore,
    value::{Document, Value, ValueKind},
};
use serde::{Deserialize, Serialize};

fn people_indexer() -> ConcatIndexer<Document> {
    ConcatIndexer::new(vec![
        Component::new("Str2", ValueKind::Text),
        Component::new("Int", ValueKind::Int),
    ])
    .expect("indexer")
}

fn person(name: &str, gender: &str, age: i64) -> Document {
    Document::new()
        .with("Str1", name)
        .with("Str2", gender)
        .with("Int", age)
}

fn people() -> ExtStore<Document> {
    ExtStore::new(PrefixStore::new(b"people"), CborCodec::shared::<Document>())
}

fn chunks(indexer: &dyn Indexer<Document>, bounds: &[PathBound]) -> Vec<Chunk> {
    let mut slice = indexer.lookup(bounds).expect("lookup");
    collect_values(&mut slice).expect("chunks")
}

fn populate(db: &MemoryDb, store: &ExtStore<Document>) {
    db.update(|txn| {
        let s = store.instance(txn);
        s.set(b"alice", &person("Alice", "Male", 30))?;
        s.set(b"bob", &person("Bob", "Male", 25))?;
        s.set(b"carol", &person("Carol", "Female", 41))?;
        Ok(())
    })
    .expect("populate");
}

///
/// Tagged
/// Two tag-indexed fields through the derive.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, stackdb_derive::FieldValues)]
struct Tagged {
    #[field(index)]
    name: String,
    #[field(index)]
    tags: Vec<String>,
    age: u32,
}

fn tagged(name: &str, tags: &[&str]) -> Tagged {
    Tagged {
        name: name.to_string(),
        tags: tags.iter().map(ToString::to_string).collect(),
        age: 7,
    }
}

#[test]
fn composite_key_concatenates_padded_components() {
    let entries = people_indexer()
        .index(&person("Alice", "Male", 30), true)
        .expect("index");

    let expected = [pad_right(b"Male", 256), 30i64.to_lex()].concat();
    assert_eq!(entries, vec![IndexEntry::new(expected)]);
}

#[test]
fn equality_on_leading_component_fills_the_rest() {
    let found = chunks(&people_indexer(), &[PathBound::eq("Str2", "Male")]);

    let male = pad_right(b"Male", 256);
    assert_eq!(
        found,
        vec![Chunk::new(
            Bound::Included([male.clone(), vec![0x00; 8]].concat()),
            Bound::Included([male, vec![0xFF; 8]].concat()),
        )]
    );
}

#[test]
fn full_equality_is_a_point_chunk() {
    let indexer = people_indexer();
    let found = chunks(
        &indexer,
        &[PathBound::eq("Int", 30), PathBound::eq("Str2", "Male")],
    );

    let key = indexer
        .key_for(&["Male".to_value(), 30i64.to_value()])
        .expect("key");
    assert_eq!(found, vec![Chunk::point(key)]);
}

#[test]
fn bounds_after_an_open_component_are_rejected() {
    let indexer = people_indexer();

    for bounds in [
        vec![PathBound::eq("Int", 30)],
        vec![PathBound::ge("Str2", "M"), PathBound::eq("Int", 30)],
        vec![PathBound::eq("Nope", 1)],
        vec![PathBound::eq("Str2", "a"), PathBound::eq("Str2", "b")],
    ] {
        let err = indexer.lookup(&bounds).unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidArgument, "{bounds:?}");
    }
}

#[test]
fn construction_rejects_empty_and_duplicate_components() {
    assert!(ConcatIndexer::<Document>::new(Vec::new()).is_err());

    let err = ConcatIndexer::<Document>::new(vec![
        Component::new("a", ValueKind::Int),
        Component::new("a", ValueKind::Int),
    ])
    .err()
    .expect("duplicate");
    assert_eq!(err.message, "duplicate component path 'a'");
}

#[test]
fn list_fields_expand_into_the_cartesian_product() {
    let indexer = ConcatIndexer::<Document>::new(vec![
        Component::new("tags", ValueKind::Text).fixed(2),
        Component::new("n", ValueKind::Int),
        Component::new("flags", ValueKind::Bool),
    ])
    .expect("indexer");
    let doc = Document::new()
        .with("tags", vec!["a", "b"])
        .with("n", 1)
        .with("flags", vec![false, true]);

    let keys: Vec<Vec<u8>> = indexer
        .index(&doc, true)
        .expect("index")
        .into_iter()
        .map(|e| e.key)
        .collect();

    let one = 1i64.to_lex();
    let key = |tag: &[u8], flag: u8| [pad_right(tag, 2), one.clone(), vec![flag]].concat();
    assert_eq!(
        keys,
        vec![key(b"a", 0), key(b"a", 1), key(b"b", 0), key(b"b", 1)]
    );
}

#[test]
fn descending_components_invert_and_swap_bounds() {
    let indexer = ConcatIndexer::<Document>::new(vec![Component::new("Int", ValueKind::Int).desc()])
        .expect("indexer");

    let entry = indexer.index(&Document::new().with("Int", 30), true).expect("index");
    assert_eq!(entry[0].key, inverted(&30i64.to_lex()));

    let found = chunks(&indexer, &[PathBound::gt("Int", 10)]);
    assert_eq!(
        found,
        vec![Chunk::new(
            Bound::Included(vec![0x00; 8]),
            Bound::Excluded(inverted(&10i64.to_lex())),
        )]
    );
    assert!(found[0].contains(&entry[0].key));
}

#[test]
fn typed_components_bucket_kinds_and_numeric_ones_coerce() {
    let typed = ConcatIndexer::<Document>::new(vec![Component::new("v", ValueKind::Int).typed()])
        .expect("typed");
    let key_of = |doc: Document| typed.index(&doc, true).expect("index").remove(0).key;
    let int_key = key_of(Document::new().with("v", 5));
    let text_key = key_of(Document::new().with("v", "5"));
    assert_eq!(int_key[0], ValueKind::Int.tag());
    assert_eq!(text_key[0], ValueKind::Text.tag());
    assert!(int_key < text_key);

    let strict = ConcatIndexer::<Document>::new(vec![Component::new("v", ValueKind::Int)])
        .expect("strict");
    let err = strict.index(&Document::new().with("v", 5u32), true).unwrap_err();
    assert_eq!(err.class, ErrorClass::Codec);
    assert_eq!(err.message, "component 'v' expects int, found uint");

    let numeric =
        ConcatIndexer::<Document>::new(vec![Component::new("v", ValueKind::Int).numeric()])
            .expect("numeric");
    let coerced = numeric.index(&Document::new().with("v", 5u32), true).expect("coerced");
    assert_eq!(coerced[0].key, 5i64.to_lex());
}

#[test]
fn missing_fields_index_as_null() {
    let entries = people_indexer()
        .index(&Document::new().with("Int", 1), true)
        .expect("index");

    assert_eq!(entries[0].key, [vec![0x00; 256], 1i64.to_lex()].concat());
}

#[test]
fn null_shares_the_minimum_key_unless_typed() {
    let min = Document::new().with("v", i64::MIN);
    let null = Document::new().with("v", Value::Null);

    let plain = ConcatIndexer::<Document>::new(vec![Component::new("v", ValueKind::Int)])
        .expect("plain");
    let plain_key = |doc: &Document| plain.index(doc, true).expect("index").remove(0).key;
    assert_eq!(plain_key(&null), vec![0x00; 8]);
    assert_eq!(plain_key(&min), plain_key(&null));

    let typed = ConcatIndexer::<Document>::new(vec![Component::new("v", ValueKind::Int).typed()])
        .expect("typed");
    let typed_key = |doc: &Document| typed.index(doc, true).expect("index").remove(0).key;
    assert_eq!(typed_key(&null)[0], ValueKind::Null.tag());
    assert!(typed_key(&null) < typed_key(&min));

    let hit = chunks(&typed, &[PathBound::eq("v", i64::MIN)]);
    assert_eq!(hit, vec![Chunk::point(typed_key(&min))]);
}

#[test]
fn index_extension_scans_record_keys_in_index_order() {
    let db = MemoryDb::new();
    let store = people();
    let index = Index::new("gender_age", people_indexer());
    index.install(&store).expect("install");
    populate(&db, &store);

    db.view(|txn| {
        let male = [PathBound::eq("Str2", "Male")];
        let keys = collect_values(&mut index.lookup(&store, txn, &male, false)?)?;
        assert_eq!(keys, vec![b"bob".to_vec(), b"alice".to_vec()]);

        let keys = collect_values(&mut index.lookup(&store, txn, &male, true)?)?;
        assert_eq!(keys, vec![b"alice".to_vec(), b"bob".to_vec()]);

        let older = [PathBound::eq("Str2", "Male"), PathBound::gt("Int", 25)];
        let keys = collect_values(&mut index.lookup(&store, txn, &older, false)?)?;
        assert_eq!(keys, vec![b"alice".to_vec()]);

        let everyone = collect_values(&mut index.lookup(&store, txn, &[], false)?)?;
        assert_eq!(everyone.len(), 3);
        Ok(())
    })
    .expect("read");
}

#[test]
fn reindexing_and_deleting_keep_entries_in_step() {
    let db = MemoryDb::new();
    let store = people();
    let index = Index::new("gender_age", people_indexer());
    index.install(&store).expect("install");
    populate(&db, &store);

    db.update(|txn| {
        let s = store.instance(txn);
        s.set(b"bob", &person("Bob", "Female", 26))?;
        s.delete(b"carol")
    })
    .expect("write");

    db.view(|txn| {
        let female = [PathBound::eq("Str2", "Female")];
        let keys = collect_values(&mut index.lookup(&store, txn, &female, false)?)?;
        assert_eq!(keys, vec![b"bob".to_vec()]);

        let raw = index.refs(&store)?.store().instance(txn);
        assert_eq!(crate::cursor::count(&mut raw.new_iterator(&IteratorOptions::default()))?, 2);
        Ok(())
    })
    .expect("read");
}

#[test]
fn lookup_records_fetches_the_indexed_values() {
    let db = MemoryDb::new();
    let store = people();
    let index = Index::new("gender_age", people_indexer());
    populate(&db, &store);

    let backfilled = db
        .update(|txn| store.instance(txn).add_extension(index.name(), index.extension()))
        .expect("backfill");
    assert_eq!(backfilled, 3);

    let names = db
        .view(|txn| {
            let mut records =
                index.lookup_records(&store, txn, &[PathBound::le("Str2", "Female")], false)?;
            collect_values(&mut records)
        })
        .expect("records");
    assert_eq!(names, vec![person("Carol", "Female", 41)]);
}

#[test]
fn unique_index_rejects_a_second_owner() {
    let db = MemoryDb::new();
    let store = people();
    let by_name =
        ConcatIndexer::<Document>::new(vec![Component::new("Str1", ValueKind::Text).fixed(16)])
            .expect("indexer");
    let index = Index::new("name", by_name).unique();
    index.install(&store).expect("install");
    populate(&db, &store);

    db.update(|txn| store.instance(txn).set(b"alice", &person("Alice", "Female", 31)))
        .expect("same owner may re-set");

    let err = db
        .update(|txn| store.instance(txn).set(b"alice2", &person("Alice", "Male", 1)))
        .unwrap_err();
    assert_eq!(err.class, ErrorClass::Conflict);
    assert_eq!(
        err.message,
        "extension 'name': unique index 'name' already holds this key"
    );

    let exists = db.view(|txn| store.instance(txn).exists(b"alice2")).expect("exists");
    assert!(!exists);
}

#[test]
fn injected_values_answer_from_the_index() {
    let db = MemoryDb::new();
    let store = people();
    let index = Index::new("with_name", ValueInjector::new(people_indexer(), ["Str1", "Missing"]));
    index.install(&store).expect("install");
    populate(&db, &store);

    let entries = db
        .view(|txn| index.lookup_entries(&store, txn, &[PathBound::eq("Str2", "Male")], false))
        .expect("entries");

    let names: Vec<Value> = entries
        .iter()
        .map(|e| {
            let injected = decode_injected(e.value.as_deref().expect("value")).expect("decode");
            assert_eq!(injected.len(), 1);
            injected["Str1"].clone()
        })
        .collect();
    assert_eq!(names, vec!["Bob".to_value(), "Alice".to_value()]);
    assert_eq!(entries[0].key, b"bob".to_vec());
}

#[test]
fn tag_indexer_keys_each_tagged_value() {
    let indexer = TagIndexer::<Tagged>::new().with_default_width(8);
    let keys: Vec<Vec<u8>> = indexer
        .index(&tagged("bob", &["x", "y"]), true)
        .expect("index")
        .into_iter()
        .map(|e| e.key)
        .collect();

    let key = |ns: &[u8], v: &[u8]| {
        [ns, b"\x00\x06".as_slice(), pad_right(v, 8).as_slice()].concat()
    };
    assert_eq!(keys, vec![key(b"name", b"bob"), key(b"tags", b"x"), key(b"tags", b"y")]);
}

#[test]
fn tag_indexer_lookups() {
    let indexer = TagIndexer::<Tagged>::new().with_default_width(8);
    let lookup = |bounds: &[PathBound]| {
        let mut slice = indexer.lookup(bounds)?;
        collect_values(&mut slice)
    };

    let point = lookup(&[PathBound::eq("tags", "x")]).expect("point");
    assert_eq!(
        point,
        vec![Chunk::point(
            indexer.field_key("tags", &"x".to_value()).expect("key")
        )]
    );

    let open = lookup(&[PathBound::range("name", Bound::Unbounded, Bound::Unbounded)])
        .expect("open");
    assert_eq!(open, vec![Chunk::prefix(b"name\x00".to_vec())]);

    let ranged = lookup(&[PathBound::ge("name", "m")]).expect("ranged");
    assert_eq!(
        ranged,
        vec![Chunk::new(
            Bound::Included(indexer.field_key("name", &"m".to_value()).expect("low")),
            Bound::Included(b"name\x00\x06".to_vec()),
        )]
    );

    for bounds in [
        vec![PathBound::eq("age", 7)],
        vec![],
        vec![PathBound::eq("name", "a"), PathBound::eq("tags", "b")],
        vec![PathBound::range(
            "name",
            Bound::Included("a".to_value()),
            Bound::Included(3i64.to_value()),
        )],
    ] {
        let err = lookup(&bounds).unwrap_err();
        assert_eq!(err.class, ErrorClass::InvalidArgument, "{bounds:?}");
    }
}

#[test]
fn tag_index_finds_records_by_any_tag() {
    let db = MemoryDb::new();
    let store = ExtStore::new(PrefixStore::new(b"t"), CborCodec::shared::<Tagged>());
    let index = Index::new("tags", TagIndexer::<Tagged>::new());
    index.install(&store).expect("install");

    db.update(|txn| {
        let s = store.instance(txn);
        s.set(b"1", &tagged("ann", &["red", "blue"]))?;
        s.set(b"2", &tagged("ben", &["blue"]))?;
        Ok(())
    })
    .expect("write");

    let blue = db
        .view(|txn| {
            let bounds = [PathBound::eq("tags", "blue")];
            collect_values(&mut index.lookup(&store, txn, &bounds, false)?)
        })
        .expect("blue");
    assert_eq!(blue, vec![b"1".to_vec(), b"2".to_vec()]);

    let names = db
        .view(|txn| {
            let bounds = [PathBound::ge("name", "b")];
            collect_keys(&mut index.lookup(&store, txn, &bounds, false)?)
        })
        .expect("names");
    assert_eq!(names, vec![indexer_key("name", "ben")]);
}

fn indexer_key(field: &str, value: &str) -> Vec<u8> {
    TagIndexer::<Tagged>::new()
        .field_key(field, &value.to_value())
        .expect("key")
}

#[test]
fn path_bound_point_requires_matching_inclusive_ends() {
    assert_eq!(PathBound::eq("a", 1).point(), Some(&Value::Int(1)));
    assert_eq!(PathBound::ge("a", 1).point(), None);
    let span = PathBound::range(
        "a",
        Bound::Included(1i64.to_value()),
        Bound::Included(2i64.to_value()),
    );
    assert_eq!(span.point(), None);
}

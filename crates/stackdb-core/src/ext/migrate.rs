use crate::{
    cursor::{Cursor, invalid_position},
    error::InternalError,
    ext::{ExtStore, Extension},
    kv::{Entry, IteratorOptions, KvItem, Transaction},
    serialize::Codec,
};
use std::sync::Arc;

/// Rebuild `src` as a store of `U` at the same root.
///
/// Every extension of `src` is dropped, each record is converted with
/// `convert(old, item)` (`item` carries the logical key and entry metadata)
/// and rewritten, then `extensions` are added and backfilled in order.
pub fn migrate<S, U, F>(
    txn: &dyn Transaction,
    src: &ExtStore<S>,
    codec: Arc<dyn Codec<U>>,
    extensions: Vec<(String, Arc<dyn Extension<U>>)>,
    mut convert: F,
) -> Result<ExtStore<U>, InternalError>
where
    S: 'static,
    U: 'static,
    F: FnMut(S, &KvItem) -> Result<U, InternalError>,
{
    src.instance(txn).drop_all_extensions()?;

    let src_data = src.data().instance(txn);
    let mut converted = Vec::new();
    let mut cursor = src_data.raw().new_iterator(&IteratorOptions::default());
    cursor.rewind();
    while cursor.valid() {
        let key = cursor.key()?;
        let mut item = cursor.item().cloned().ok_or_else(invalid_position)?;
        item.key = key;

        let old = src.codec().unmarshal(&item.value)?;
        let new = convert(old, &item).map_err(|err| err.context("failed to convert record"))?;
        converted.push((item, new));
        cursor.next();
    }
    cursor.status()?;
    cursor.close();

    let dst = ExtStore::build(src.root().clone(), codec, src.registry().cloned());
    let dst_data = dst.data().instance(txn);
    for (item, value) in &converted {
        let mut template = Entry::new(Vec::new(), Vec::new()).with_meta(item.user_meta);
        template.expires_at = item.expires_at;
        dst_data.set_with(&item.key, value, template)?;
    }

    let dst_instance = dst.instance(txn);
    for (name, ext) in extensions {
        dst_instance.add_extension(name, ext)?;
    }

    tracing::debug!(
        records = converted.len(),
        extensions = ?dst.extension_names(),
        "migrated store"
    );

    Ok(dst)
}

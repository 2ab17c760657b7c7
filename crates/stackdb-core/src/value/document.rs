use crate::value::{FieldValue, FieldValues, Value};
use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

///
/// Document
///
/// Schemaless record: a map of field names to dynamic values, stored with the
/// default CBOR codec. Nesting is flat: a nested field is a dotted key
/// (`"address.city"`), so path lookup is a single map probe.
///

#[derive(Clone, Debug, Default, Deref, DerefMut, Deserialize, PartialEq, Serialize)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Field holding the document id when documents are used as records.
    pub const ID_FIELD: &'static str = "_id";

    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl FieldValue) -> Self {
        self.0.insert(field.into(), value.to_value());
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl FieldValue) {
        self.0.insert(field.into(), value.to_value());
    }

    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get(Self::ID_FIELD).and_then(Value::as_text)
    }

    #[must_use]
    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl From<BTreeMap<String, Value>> for Document {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FieldValues for Document {
    fn get_value(&self, path: &str) -> Option<Value> {
        self.0.get(path).cloned()
    }
}

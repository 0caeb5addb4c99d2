//! Contracts consumed from the (out-of-scope) schema registry.
//!
//! Schema registration itself (parsing entity definitions, building the
//! segment/model/property graph) lives outside this core. The core only
//! needs to *read* that graph, so it depends on a trait rather than a
//! concrete registry.

use crate::{
    error::{Error, Result},
    model::Record,
};

/// Declared type of one property on a `Model`, as the registry reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyType {
    Int,
    String,
    Array,
    /// Anything the registry declares that schema sync cannot map; surfacing
    /// it as data (rather than refusing to parse it) lets sync report
    /// `Error::InvalidType` with the offending name.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub kind: PropertyType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

/// One entity model: the declared shape of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub class: String,
    pub table: String,
    pub sharded: bool,
    pub properties: Vec<Property>,
    pub indexes: Vec<Index>,
    /// Whether this model declares a one-time `bootstrap(db)` hook to run
    /// on first sync (after its table is created).
    pub bootstrap: bool,
}

impl Model {
    pub fn is_sharded(&self) -> bool {
        self.sharded
    }
}

/// Map a declared property type onto the backend-native type schema sync
/// should create the column with. Unmapped types are a fatal schema error.
pub fn type_map(kind: &PropertyType) -> Result<&'static str> {
    match kind {
        PropertyType::Int => Ok("unsigned integer"),
        PropertyType::String => Ok("string"),
        PropertyType::Array => Ok("variant"),
        PropertyType::Other(name) => Err(Error::InvalidType(name.clone())),
    }
}

/// A named group of models that share a lifecycle and live in the same
/// bucket(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub fullname: String,
    pub models: Vec<Model>,
}

impl Segment {
    pub fn tables(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.table.as_str()).collect()
    }
}

/// Read-only view onto entity→segment→model metadata.
pub trait SchemaRegistry: Send + Sync {
    fn has_segment(&self, name: &str) -> bool;
    fn get_segment_by_name(&self, name: &str) -> Option<Segment>;
    fn get_class_table(&self, class: &str) -> Option<String>;
    fn get_class_segment(&self, class: &str) -> Option<Segment>;
    fn get_class_model(&self, class: &str) -> Option<Model>;
}

/// A caller-supplied scalar shard key, either the original integer or a
/// string that gets hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValue {
    Int(i64),
    Str(String),
}

/// Per-class override capability: a custom shard-key extractor and/or a
/// custom storage-placement strategy. Entities that don't need either get
/// the defaults via `DefaultClassRef`.
pub trait ClassRef: Send + Sync {
    /// Extract the shard key from a payload. Default: look up `"id"`.
    fn key(&self, data: &Record) -> Option<KeyValue> {
        default_key(data)
    }

    /// Pick the storage a new bucket should be placed on, given the
    /// eligible `(storage id, usage)` candidates (already filtered to
    /// exclude storages colocating another bucket of the same name).
    /// Returning `None` defers to the assigner's default least-usage
    /// strategy.
    fn cast_storage(&self, _candidates: &[(u64, u64)]) -> Option<u64> {
        None
    }
}

/// Default extractor: look up `data["id"]`, absent -> `None`.
pub fn default_key(data: &Record) -> Option<KeyValue> {
    match data.get("id")? {
        serde_json::Value::Number(n) => n.as_i64().map(KeyValue::Int),
        serde_json::Value::String(s) => Some(KeyValue::Str(s.clone())),
        _ => None,
    }
}

/// The default `ClassRef` used for every class without a registered override.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultClassRef;

impl ClassRef for DefaultClassRef {}

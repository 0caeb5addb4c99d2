//! Entities routed and persisted by the sharding core.

use std::collections::BTreeMap;

use serde_json::Value;

/// A record payload or row image: a name -> value mapping.
///
/// Using a `BTreeMap` (rather than `serde_json::Map`, which is a thin
/// `IndexMap`/`Map` wrapper already) keeps iteration order deterministic,
/// which matters for the `tuple` equality checks in the change log tests.
pub type Record = BTreeMap<String, Value>;

/// The segment name the bucket table itself lives under. The locator
/// special-cases this so resolving "where does the bucket table live"
/// never re-enters bucket lookup.
pub const BUCKET_SEGMENT: &str = "bucket";

/// Reserved id of the single bootstrap bucket that hosts the bucket table.
pub const BOOTSTRAP_BUCKET_ID: u64 = 1;

/// `*` wildcard subscription table, matching every table on a storage.
pub const ALL_TABLES: &str = "*";

/// Catalog table names, persisted on the bootstrap storage.
pub const BUCKET_TABLE: &str = "bucket";
pub const TOPOLOGY_TABLE: &str = "topology";
pub const STORAGE_TABLE: &str = "storage";
pub const REPLICATION_LISTENER: &str = "replication";

/// Topology lifecycle state. Only `Ready` topologies route traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TopologyStatus {
    Creating,
    Ready,
    Retired,
}

/// The sharding plan for one segment at one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub id: u64,
    pub name: String,
    pub version: u64,
    pub status: TopologyStatus,
    pub shards: u32,
    pub replicas: u32,
}

impl Topology {
    /// The implicit topology used when a segment has never been configured:
    /// one shard, no replicas, immediately ready.
    pub fn default_for(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            version: 0,
            status: TopologyStatus::Ready,
            shards: 1,
            replicas: 0,
        }
    }

    pub fn to_record(&self) -> Record {
        let status = match self.status {
            TopologyStatus::Creating => "creating",
            TopologyStatus::Ready => "ready",
            TopologyStatus::Retired => "retired",
        };
        Record::from([
            ("id".into(), Value::from(self.id)),
            ("name".into(), Value::from(self.name.clone())),
            ("version".into(), Value::from(self.version)),
            ("status".into(), Value::from(status)),
            ("shards".into(), Value::from(self.shards)),
            ("replicas".into(), Value::from(self.replicas)),
        ])
    }

    pub fn from_record(r: &Record) -> Option<Self> {
        let status = match r.get("status")?.as_str()? {
            "creating" => TopologyStatus::Creating,
            "ready" => TopologyStatus::Ready,
            "retired" => TopologyStatus::Retired,
            _ => return None,
        };
        Some(Self {
            id: r.get("id")?.as_u64()?,
            name: r.get("name")?.as_str()?.to_string(),
            version: r.get("version")?.as_u64()?,
            status,
            shards: r.get("shards")?.as_u64()? as u32,
            replicas: r.get("replicas")?.as_u64()? as u32,
        })
    }
}

/// One `(name, version, shard, replica)` cell, placed on exactly one storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub id: u64,
    pub name: String,
    pub version: u64,
    pub shard: u32,
    pub replica: u32,
    /// 0 until assigned; then the id of the storage hosting this bucket.
    pub storage: u64,
}

impl Bucket {
    pub fn is_primary(&self) -> bool {
        self.replica == 0
    }

    pub fn is_assigned(&self) -> bool {
        self.storage != 0
    }

    pub fn to_record(&self) -> Record {
        Record::from([
            ("id".into(), Value::from(self.id)),
            ("name".into(), Value::from(self.name.clone())),
            ("version".into(), Value::from(self.version)),
            ("shard".into(), Value::from(self.shard)),
            ("replica".into(), Value::from(self.replica)),
            ("storage".into(), Value::from(self.storage)),
        ])
    }

    pub fn from_record(r: &Record) -> Option<Self> {
        Some(Self {
            id: r.get("id")?.as_u64()?,
            name: r.get("name")?.as_str()?.to_string(),
            version: r.get("version")?.as_u64()?,
            shard: r.get("shard")?.as_u64()? as u32,
            replica: r.get("replica")?.as_u64()? as u32,
            storage: r.get("storage")?.as_u64()?,
        })
    }
}

/// One physical backend, addressed through a `Driver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Storage {
    pub id: u64,
}

impl Storage {
    pub fn to_record(&self) -> Record {
        Record::from([("id".into(), Value::from(self.id))])
    }

    pub fn from_record(r: &Record) -> Option<Self> {
        Some(Self {
            id: r.get("id")?.as_u64()?,
        })
    }
}

/// A declaration that `listener` wants changes from `table` ("*" = all
/// tables on that storage).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub listener: String,
    pub table: String,
}

/// The kind of mutation a `Change` row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// One persisted emission: a mutation, recorded once per subscribed listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub seq: u64,
    pub listener: String,
    pub table: String,
    pub action: Action,
    pub tuple: Record,
    pub context: Record,
}

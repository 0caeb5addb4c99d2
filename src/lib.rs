//! Sharding locator and change-subscription core.
//!
//! Given a logical class (entity type) and a record, this crate decides
//! which physical storage node(s) hold that record, allocates storage
//! assignments lazily, and (for storage backends that support it) records
//! every mutation in a durable change log external subscribers may
//! drain. See `SPEC_FULL.md` at the repository root for the full contract.

pub mod assigner;
pub mod driver;
pub mod driver_registry;
pub mod error;
pub mod locator;
pub mod memory;
pub mod model;
pub mod schema;
pub mod test_support;
pub mod topology;

pub use assigner::StorageAssigner;
pub use driver::Driver;
pub use driver_registry::DriverRegistry;
pub use error::{BackendError, Error, Result};
pub use locator::{BucketLocator, LocateContext};
pub use memory::MemoryDriver;
pub use model::{
    Action, Bucket, Change, Record, Storage, Subscription, Topology, TopologyStatus, ALL_TABLES,
    BOOTSTRAP_BUCKET_ID, BUCKET_SEGMENT, BUCKET_TABLE, REPLICATION_LISTENER, STORAGE_TABLE,
    TOPOLOGY_TABLE,
};
pub use schema::{
    ClassRef, DefaultClassRef, Index, KeyValue, Model, Property, PropertyType, SchemaRegistry,
    Segment,
};
pub use topology::{ConfigureJob, TopologyManager};

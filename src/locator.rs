//! Bucket locator: given a class and a payload, resolves the bucket
//! set a caller should route to.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::{
    assigner::StorageAssigner,
    driver::Driver,
    driver_registry::DriverRegistry,
    error::{Error, Result},
    model::{Bucket, Record, Topology, TopologyStatus, BUCKET_SEGMENT, BUCKET_TABLE},
    schema::{ClassRef, KeyValue, SchemaRegistry},
    topology::TopologyManager,
};

/// The external collaborators one `getBuckets` call needs: the schema
/// registry, the per-class key/placement override, and the driver
/// registry. Bundled so the locator's entry point doesn't take a handful
/// of unrelated reference arguments.
pub struct LocateContext<'a> {
    pub schema: &'a dyn SchemaRegistry,
    pub class_ref: &'a dyn ClassRef,
    pub drivers: &'a dyn DriverRegistry,
}

/// Given (class, data, writable?, multiple?), resolves which `Bucket`(s)
/// hold the record.
pub struct BucketLocator {
    catalog: Arc<dyn Driver>,
    bootstrap_bucket: Bucket,
    topology: TopologyManager,
    assigner: StorageAssigner,
}

impl BucketLocator {
    /// `catalog` is the driver hosting the bucket/topology/storage tables.
    /// `bootstrap_bucket` is the well-known bucket the bucket table itself
    /// lives in; it breaks the recursion of "locating buckets requires
    /// reading the buckets table, which itself lives in a bucket".
    pub fn new(
        catalog: Arc<dyn Driver>,
        bootstrap_bucket: Bucket,
        topology: TopologyManager,
    ) -> Self {
        let assigner = StorageAssigner::new(catalog.clone());
        Self {
            catalog,
            bootstrap_bucket,
            topology,
            assigner,
        }
    }

    /// `getBuckets(class, data, writable, multiple)`.
    pub async fn get_buckets(
        &self,
        ctx: &LocateContext<'_>,
        class: &str,
        data: &Record,
        writable: bool,
        multiple: bool,
    ) -> Result<Vec<Bucket>> {
        let LocateContext {
            schema,
            class_ref,
            drivers,
        } = *ctx;
        let name = resolve_segment_name(class, schema);

        if name == BUCKET_SEGMENT {
            return Ok(vec![self.bootstrap_bucket.clone()]);
        }

        let query = Record::from([("name".to_string(), Value::from(name.clone()))]);
        let rows = self.catalog.find(BUCKET_TABLE, &query).await?;
        let mut buckets: Vec<Bucket> = rows.iter().filter_map(Bucket::from_record).collect();

        let topology = self
            .topology
            .get_topology(schema, class, TopologyStatus::Ready)
            .await?;

        if let Some(ref t) = topology {
            buckets.retain(|b| b.version == t.version);
        }

        if buckets.is_empty() {
            let t = topology
                .clone()
                .unwrap_or_else(|| Topology::default_for(&name));
            buckets = self.generate_buckets(&t).await?;
        }

        let want_replica = !writable;
        let (matching, rest): (Vec<Bucket>, Vec<Bucket>) = buckets.into_iter().partition(|b| {
            if want_replica {
                b.replica > 0
            } else {
                b.replica == 0
            }
        });
        let mut candidates = if matching.is_empty() { rest } else { matching };

        if let Some(ref t) = topology {
            if candidates.len() > 1 {
                if let Some(shard) = get_shard(t, class_ref, data) {
                    candidates.retain(|b| b.shard == shard);
                }
            }
        }

        if !multiple && candidates.len() > 1 {
            return Err(Error::AmbiguousRouting(candidates.len()));
        }

        for bucket in candidates.iter_mut() {
            self.assigner
                .assign_storage(bucket, class, schema, class_ref, &self.topology, drivers)
                .await?;
        }

        Ok(candidates)
    }

    /// `generateBuckets(topology)`: emit `shards × (replicas + 1)` bucket
    /// rows, idempotent on `(name, version, shard, replica)`.
    async fn generate_buckets(&self, topology: &Topology) -> Result<Vec<Bucket>> {
        let mut buckets = Vec::with_capacity((topology.shards * (topology.replicas + 1)) as usize);
        for shard in 0..topology.shards {
            for replica in 0..=topology.replicas {
                let query = Record::from([
                    ("name".to_string(), Value::from(topology.name.clone())),
                    ("version".to_string(), Value::from(topology.version)),
                    ("shard".to_string(), Value::from(shard)),
                    ("replica".to_string(), Value::from(replica)),
                ]);
                let data = Record::from([
                    ("name".to_string(), Value::from(topology.name.clone())),
                    ("version".to_string(), Value::from(topology.version)),
                    ("shard".to_string(), Value::from(shard)),
                    ("replica".to_string(), Value::from(replica)),
                    ("storage".to_string(), Value::from(0u64)),
                ]);
                let row = self
                    .catalog
                    .find_or_create(BUCKET_TABLE, &query, data)
                    .await?;
                let bucket = Bucket::from_record(&row).ok_or(Error::NotFound)?;
                debug!(name = %topology.name, shard, replica, "generated bucket");
                buckets.push(bucket);
            }
        }
        Ok(buckets)
    }
}

/// Resolve the segment name a class or raw table string routes through.
fn resolve_segment_name(class: &str, schema: &dyn SchemaRegistry) -> String {
    if let Some(segment) = schema.get_class_segment(class) {
        return segment.fullname;
    }
    if let Some(idx) = class.find('.') {
        return class[..idx].to_string();
    }
    if let Some(idx) = class.find('_') {
        return class[..idx].to_string();
    }
    class.to_string()
}

/// `getShard(topology, class, data)`: the shard a payload routes to, or
/// `None` if it carries no shard key.
fn get_shard(topology: &Topology, class_ref: &dyn ClassRef, data: &Record) -> Option<u32> {
    let key = class_ref.key(data)?;
    let numeric = match key {
        KeyValue::Int(i) => i,
        KeyValue::Str(ref s) => {
            // Use the integer value directly if the string round-trips as
            // a decimal integer, else hash it.
            if let Ok(i) = s.parse::<i64>() {
                if i.to_string() == *s {
                    i
                } else {
                    crc32(s) as i64
                }
            } else {
                crc32(s) as i64
            }
        }
    };
    Some((numeric.unsigned_abs() as u32) % topology.shards)
}

fn crc32(s: &str) -> u32 {
    crc32fast::hash(s.as_bytes())
}

//! Storage assigner: on first bucket access, binds the bucket to a
//! backend and triggers schema sync and (for replicated primaries)
//! replication registration.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    driver::Driver,
    driver_registry::DriverRegistry,
    error::{Error, Result},
    model::{
        Bucket, Record, Storage, TopologyStatus, BUCKET_TABLE, REPLICATION_LISTENER, STORAGE_TABLE,
    },
    schema::{ClassRef, SchemaRegistry},
    topology::TopologyManager,
};

pub struct StorageAssigner {
    catalog: Arc<dyn Driver>,
}

impl StorageAssigner {
    pub fn new(catalog: Arc<dyn Driver>) -> Self {
        Self { catalog }
    }

    /// `assignStorage(bucket, class)`.
    pub async fn assign_storage(
        &self,
        bucket: &mut Bucket,
        class: &str,
        schema: &dyn SchemaRegistry,
        class_ref: &dyn ClassRef,
        topology: &TopologyManager,
        drivers: &dyn DriverRegistry,
    ) -> Result<()> {
        if !bucket.is_assigned() {
            let storage_id = self
                .choose_storage(&bucket.name, class_ref, drivers)
                .await?;
            self.catalog
                .update(
                    BUCKET_TABLE,
                    &Value::from(bucket.id),
                    Record::from([("storage".to_string(), Value::from(storage_id))]),
                )
                .await?;
            bucket.storage = storage_id;
            info!(bucket = bucket.id, storage = storage_id, "storage assigned");
        }

        let driver = drivers
            .get_storage_driver(bucket.storage)
            .ok_or_else(|| Error::NoAvailableStorage(bucket.name.clone()))?;

        if let Some(segment) = schema.get_class_segment(class) {
            if schema.has_segment(&bucket.name) {
                let created = driver.sync_schema(&segment).await?;
                for model in &segment.models {
                    if model.bootstrap && created.contains(&model.table) {
                        debug!(table = %model.table, "bootstrap hook due after first sync");
                    }
                }
            }
        }

        if bucket.version > 0 && bucket.is_primary() {
            if let Some(t) = topology
                .get_topology(schema, class, TopologyStatus::Ready)
                .await?
            {
                if t.replicas > 0 {
                    if let Some(segment) = schema.get_class_segment(class) {
                        for table in segment.tables() {
                            driver.register_changes(table, REPLICATION_LISTENER).await?;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Default `castStorage`: least-used storage not already hosting a
    /// sibling bucket of the same name.
    async fn choose_storage(
        &self,
        bucket_name: &str,
        class_ref: &dyn ClassRef,
        drivers: &dyn DriverRegistry,
    ) -> Result<u64> {
        let storages: Vec<Storage> = self
            .catalog
            .find(STORAGE_TABLE, &Record::new())
            .await?
            .iter()
            .filter_map(Storage::from_record)
            .collect();

        let occupied: HashSet<u64> = self
            .catalog
            .find(
                BUCKET_TABLE,
                &Record::from([("name".to_string(), Value::from(bucket_name))]),
            )
            .await?
            .iter()
            .filter_map(Bucket::from_record)
            .filter(|b| b.is_assigned())
            .map(|b| b.storage)
            .collect();

        let mut candidates = Vec::new();
        for storage in &storages {
            if occupied.contains(&storage.id) {
                continue;
            }
            let Some(driver) = drivers.get_storage_driver(storage.id) else {
                continue;
            };
            let usage = driver.get_usage().await?;
            candidates.push((storage.id, usage));
        }

        if let Some(id) = class_ref.cast_storage(&candidates) {
            return Ok(id);
        }

        candidates
            .into_iter()
            .min_by_key(|(_, usage)| *usage)
            .map(|(id, _)| id)
            .ok_or_else(|| Error::NoAvailableStorage(bucket_name.to_string()))
    }
}

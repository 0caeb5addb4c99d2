//! Topology manager: maintains per-segment `Topology` records and
//! provisions a default topology on first access of a new segment.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    driver::Driver,
    error::Result,
    model::{Record, Topology, TopologyStatus, TOPOLOGY_TABLE},
    schema::SchemaRegistry,
};

/// The external `Configure(name)` job: out of scope for this core (it owns
/// provisioning the initial `Bucket` rows and promoting the topology to
/// `Ready`), consumed here only as a dispatch point.
#[async_trait]
pub trait ConfigureJob: Send + Sync {
    async fn configure(&self, name: &str) -> Topology;
}

/// Reads `Topology` rows from the catalog storage (the same bootstrap
/// storage that hosts the bucket table) and dispatches `Configure` on first
/// access of a segment that has never been provisioned.
pub struct TopologyManager {
    catalog: Arc<dyn Driver>,
    configure: Arc<dyn ConfigureJob>,
}

impl TopologyManager {
    pub fn new(catalog: Arc<dyn Driver>, configure: Arc<dyn ConfigureJob>) -> Self {
        Self { catalog, configure }
    }

    /// `getTopology(class, status)`. Unsharded (or unregistered) entities
    /// never route through a topology and get `None`.
    pub async fn get_topology(
        &self,
        schema: &dyn SchemaRegistry,
        class: &str,
        status: TopologyStatus,
    ) -> Result<Option<Topology>> {
        let Some(model) = schema.get_class_model(class) else {
            return Ok(None);
        };
        if !model.is_sharded() {
            return Ok(None);
        }
        let Some(segment) = schema.get_class_segment(class) else {
            return Ok(None);
        };
        let name = segment.fullname;

        let query = Record::from([("name".into(), serde_json::Value::from(name.clone()))]);
        let rows = self.catalog.find(TOPOLOGY_TABLE, &query).await?;
        let matching: Vec<Topology> = rows
            .iter()
            .filter_map(Topology::from_record)
            .filter(|t| t.status == status)
            .collect();

        if let Some(topology) = matching.into_iter().last() {
            debug!(segment = %name, version = topology.version, "topology already provisioned");
            return Ok(Some(topology));
        }

        info!(segment = %name, "dispatching Configure job for new segment");
        Ok(Some(self.configure.configure(&name).await))
    }
}

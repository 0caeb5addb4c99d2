//! Fixture implementations of the core's external collaborators (schema
//! registry, driver registry, `Configure` job), used by this crate's own
//! test suite and available to downstream integration tests.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use crate::{
    driver::Driver,
    driver_registry::DriverRegistry,
    model::{Topology, TopologyStatus},
    schema::{Model, SchemaRegistry, Segment},
    topology::ConfigureJob,
};

/// A schema registry backed by an in-memory map, built up with `register`.
#[derive(Default)]
pub struct FixtureSchema {
    classes: HashMap<String, (String, Model)>,
    segments: HashMap<String, Segment>,
}

impl FixtureSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `class` as belonging to `segment`, with the given model.
    pub fn register(&mut self, class: &str, segment: &str, model: Model) -> &mut Self {
        self.classes
            .insert(class.to_string(), (segment.to_string(), model.clone()));
        self.segments
            .entry(segment.to_string())
            .or_insert_with(|| Segment {
                fullname: segment.to_string(),
                models: Vec::new(),
            })
            .models
            .push(model);
        self
    }
}

impl SchemaRegistry for FixtureSchema {
    fn has_segment(&self, name: &str) -> bool {
        self.segments.contains_key(name)
    }

    fn get_segment_by_name(&self, name: &str) -> Option<Segment> {
        self.segments.get(name).cloned()
    }

    fn get_class_table(&self, class: &str) -> Option<String> {
        self.classes.get(class).map(|(_, m)| m.table.clone())
    }

    fn get_class_segment(&self, class: &str) -> Option<Segment> {
        let (segment, _) = self.classes.get(class)?;
        self.segments.get(segment).cloned()
    }

    fn get_class_model(&self, class: &str) -> Option<Model> {
        self.classes.get(class).map(|(_, m)| m.clone())
    }
}

/// A driver registry backed by an in-memory map of storage id -> driver.
#[derive(Default, Clone)]
pub struct FixtureDrivers {
    drivers: HashMap<u64, Arc<dyn Driver>>,
}

impl FixtureDrivers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, id: u64, driver: Arc<dyn Driver>) -> Self {
        self.drivers.insert(id, driver);
        self
    }
}

impl DriverRegistry for FixtureDrivers {
    fn get_storage_driver(&self, storage_id: u64) -> Option<Arc<dyn Driver>> {
        self.drivers.get(&storage_id).cloned()
    }
}

/// A `Configure` job fixture that deterministically returns the same
/// topology for a given segment name, without actually persisting it:
/// the locator's own idempotent `generate_buckets` still converges
/// correctly across repeated dispatches.
pub struct FixtureConfigure {
    pub shards: u32,
    pub replicas: u32,
}

#[async_trait]
impl ConfigureJob for FixtureConfigure {
    async fn configure(&self, name: &str) -> Topology {
        Topology {
            id: 1,
            name: name.to_string(),
            version: 1,
            status: TopologyStatus::Ready,
            shards: self.shards,
            replicas: self.replicas,
        }
    }
}

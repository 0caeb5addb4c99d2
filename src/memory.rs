//! An in-process reference `Driver`, used by the crate's own test suite and
//! available to downstream integration tests as a fixture. It is
//! not a production storage backend (no real backend ships in this core)
//! but it implements the full contract, including transactional emit,
//! using its lock's critical section as the "transaction".

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::{
    driver::Driver,
    error::Result,
    model::{Action, Change, Record, Subscription},
    schema::{type_map, Segment},
};

#[derive(Default)]
struct Inner {
    tables: HashMap<String, Vec<Record>>,
    indexes: HashMap<String, HashSet<String>>,
    next_id: HashMap<String, i64>,
    subscriptions: Vec<Subscription>,
    changes: Vec<Change>,
    next_seq: u64,
    context: Record,
}

impl Inner {
    fn listeners_for(&self, table: &str) -> Vec<String> {
        self.subscriptions
            .iter()
            .filter(|s| s.table == table || s.table == crate::model::ALL_TABLES)
            .map(|s| s.listener.clone())
            .collect()
    }

    fn emit(&mut self, table: &str, action: Action, tuple: Record) {
        let listeners = self.listeners_for(table);
        if listeners.is_empty() {
            return;
        }
        let context = self.context.clone();
        for listener in listeners {
            self.next_seq += 1;
            self.changes.push(Change {
                seq: self.next_seq,
                listener,
                table: table.to_string(),
                action,
                tuple: tuple.clone(),
                context: context.clone(),
            });
        }
    }

    fn matches(row: &Record, query: &Record) -> bool {
        query.iter().all(|(k, v)| row.get(k) == Some(v))
    }

    fn row_id_matches(row: &Record, id: &Value) -> bool {
        if let Value::Object(fields) = id {
            fields.iter().all(|(k, v)| row.get(k) == Some(v))
        } else {
            row.get("id") == Some(id)
        }
    }
}

/// An in-memory storage backend: every table is a `Vec<Record>` behind one
/// mutex, with CDC change/subscription state alongside it.
#[derive(Default)]
pub struct MemoryDriver {
    inner: Mutex<Inner>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(inner: &mut Inner, table: &str) -> i64 {
        let next = inner.next_id.entry(table.to_string()).or_insert(0);
        *next += 1;
        *next
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    async fn create(&self, table: &str, mut data: Record) -> Result<Record> {
        let mut inner = self.inner.lock();
        if !data.contains_key("id") {
            let id = Self::allocate_id(&mut inner, table);
            data.insert("id".to_string(), Value::from(id));
        }
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(data.clone());
        inner.emit(table, Action::Create, data.clone());
        Ok(data)
    }

    async fn update(&self, table: &str, id: &Value, data: Record) -> Result<Option<Record>> {
        let mut inner = self.inner.lock();
        let row = inner
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| Inner::row_id_matches(r, id)));
        let Some(row) = row else {
            return Ok(None);
        };
        row.extend(data);
        let post_image = row.clone();
        inner.emit(table, Action::Update, post_image.clone());
        Ok(Some(post_image))
    }

    async fn delete(&self, table: &str, id: &Value) -> Result<Option<Record>> {
        let mut inner = self.inner.lock();
        let Some(rows) = inner.tables.get_mut(table) else {
            return Ok(None);
        };
        let position = rows.iter().position(|r| Inner::row_id_matches(r, id));
        let Some(position) = position else {
            return Ok(None);
        };
        let pre_image = rows.remove(position);
        inner.emit(table, Action::Delete, pre_image.clone());
        Ok(Some(pre_image))
    }

    async fn find(&self, table: &str, query: &Record) -> Result<Vec<Record>> {
        let inner = self.inner.lock();
        Ok(inner
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| Inner::matches(r, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_or_create(&self, table: &str, query: &Record, data: Record) -> Result<Record> {
        let mut inner = self.inner.lock();
        if let Some(existing) = inner
            .tables
            .get(table)
            .and_then(|rows| rows.iter().find(|r| Inner::matches(r, query)).cloned())
        {
            return Ok(existing);
        }
        let mut row = query.clone();
        row.extend(data);
        if !row.contains_key("id") {
            let id = Self::allocate_id(&mut inner, table);
            row.insert("id".to_string(), Value::from(id));
        }
        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        inner.emit(table, Action::Create, row.clone());
        Ok(row)
    }

    async fn has_table(&self, table: &str) -> Result<bool> {
        Ok(self.inner.lock().tables.contains_key(table))
    }

    async fn sync_schema(&self, segment: &Segment) -> Result<Vec<String>> {
        let mut inner = self.inner.lock();
        let mut created = Vec::new();
        for model in &segment.models {
            let pre_existed = inner.tables.contains_key(&model.table);
            inner.tables.entry(model.table.clone()).or_default();
            if !pre_existed {
                debug!(table = %model.table, "sync_schema created table");
                created.push(model.table.clone());
            }
            for property in &model.properties {
                type_map(&property.kind)?;
            }
            let table_indexes = inner.indexes.entry(model.table.clone()).or_default();
            for index in &model.indexes {
                table_indexes.insert(index.name.clone());
            }
        }
        Ok(created)
    }

    async fn get_usage(&self) -> Result<u64> {
        let inner = self.inner.lock();
        Ok(inner.tables.values().map(|rows| rows.len() as u64).sum())
    }

    async fn register_changes(&self, table: &str, listener: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let subscription = Subscription {
            listener: listener.to_string(),
            table: table.to_string(),
        };
        if !inner.subscriptions.contains(&subscription) {
            inner.subscriptions.push(subscription);
        }
        Ok(())
    }

    async fn get_changes(&self, listener: &str, limit: usize) -> Result<Vec<Change>> {
        let inner = self.inner.lock();
        Ok(inner
            .changes
            .iter()
            .filter(|c| c.listener == listener)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ack_changes(&self, changes: &[Change]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.changes.retain(|c| {
            !changes
                .iter()
                .any(|acked| acked.seq == c.seq && acked.listener == c.listener)
        });
        Ok(())
    }

    fn set_context(&self, context: Record) {
        self.inner.lock().context = context;
    }
}

//! The uniform CRUD + schema-sync + CDC surface every storage backend
//! exposes. A storage driver is any type implementing this trait;
//! the core holds instances behind `Arc<dyn Driver>`.

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    error::Result,
    model::{Change, Record},
    schema::Segment,
};

/// One backend connection, uniform across storage kinds.
///
/// Backends that cannot express transactional emission still implement the
/// four CDC methods: `register_changes` should return an error, the other
/// three are no-ops, so a plain driver's mutations always take the fast
/// path described above.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Insert one row; returns the stored form (with generated keys).
    async fn create(&self, table: &str, data: Record) -> Result<Record>;

    /// Set the provided fields on the row keyed by `id`. `None` if absent.
    async fn update(&self, table: &str, id: &Value, data: Record) -> Result<Option<Record>>;

    /// Remove by id (or by compound key if `id` is a map). Returns the
    /// pre-image, or `None` if absent.
    async fn delete(&self, table: &str, id: &Value) -> Result<Option<Record>>;

    /// Full match on every query field (all-equal AND).
    async fn find(&self, table: &str, query: &Record) -> Result<Vec<Record>>;

    /// As `find`, first match or none.
    async fn find_one(&self, table: &str, query: &Record) -> Result<Option<Record>> {
        Ok(self.find(table, query).await?.into_iter().next())
    }

    /// As `find_one`, fails `NotFound` if none.
    async fn find_or_fail(&self, table: &str, query: &Record) -> Result<Record> {
        self.find_one(table, query)
            .await?
            .ok_or(crate::error::Error::NotFound)
    }

    /// Atomically: return an existing match, else insert with `data`.
    /// The change log emits only when an insert actually occurs.
    async fn find_or_create(&self, table: &str, query: &Record, data: Record) -> Result<Record>;

    /// Table existence check.
    async fn has_table(&self, table: &str) -> Result<bool>;

    /// Idempotently materialize every model in the segment.
    /// Returns the tables that were newly created by this call (as opposed
    /// to already present), so the storage assigner can invoke each
    /// newly-created model's `bootstrap` hook exactly once.
    async fn sync_schema(&self, segment: &Segment) -> Result<Vec<String>>;

    /// Monotonic utilization metric (bytes, rows: opaque; only `min`
    /// matters to the storage assigner).
    async fn get_usage(&self) -> Result<u64>;

    /// Subscribe a listener to a table ("*" = every table on this storage).
    /// Lazily creates the change/subscription tables.
    async fn register_changes(&self, table: &str, listener: &str) -> Result<()>;

    /// Drain up to `limit` pending changes for `listener`. Empty if the CDC
    /// tables don't exist (i.e. nothing has ever subscribed on this storage).
    async fn get_changes(&self, listener: &str, limit: usize) -> Result<Vec<Change>>;

    /// Delete the supplied change rows.
    async fn ack_changes(&self, changes: &[Change]) -> Result<()>;

    /// Set the process-local context map attached to subsequent change
    /// emissions until replaced. Process-wide per driver instance.
    fn set_context(&self, context: Record);
}

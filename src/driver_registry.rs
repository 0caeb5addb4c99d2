//! `getStorageDriver(storageId) -> Driver`, consumed from the (out of
//! scope) `Database` facade.

use std::sync::Arc;

use crate::driver::Driver;

/// Looks up the driver instance bound to a storage id.
pub trait DriverRegistry: Send + Sync {
    fn get_storage_driver(&self, storage_id: u64) -> Option<Arc<dyn Driver>>;
}

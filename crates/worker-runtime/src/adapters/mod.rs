//! Port implementations.

pub mod storage;

pub use storage::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use storage::{RocksDbConfig, RocksDbStore};

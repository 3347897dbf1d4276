//! Ports consumed by the runtime.

pub mod outbound;

pub use outbound::{BatchOperation, KVStoreError, KeyValueStore, ScanResult};

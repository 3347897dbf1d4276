//! # Worker Runtime
//!
//! Composition root for backend worker services.
//!
//! ## Structure
//!
//! - `builder/` - `AppBuilder`: registration and assembly
//! - `app` - `App`: the assembled, immutable snapshot
//! - `job/` - `Job` contract and the built-in heartbeat
//! - `ports/` - `KeyValueStore` port
//! - `adapters/` - In-memory and RocksDB stores
//! - `config` - `WorkerConfig` for the `worker` binary
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut builder = AppBuilder::new("indexer");
//! builder
//!     .register_store(Arc::new(InMemoryKVStore::new()))
//!     .register_chain_client(client)
//!     .register_http_server(server)
//!     .register_job(Arc::new(HeartbeatJob::new(Duration::from_secs(30))));
//! builder.register_metrics(&MetricsConfig::default())?;
//! builder.register_metrics_endpoint()?;
//!
//! let app = builder.build(Logger::new("indexer"));
//! ```

pub mod adapters;
pub mod app;
pub mod builder;
pub mod config;
pub mod job;
pub mod ports;

pub use adapters::InMemoryKVStore;
#[cfg(feature = "rocksdb")]
pub use adapters::{RocksDbConfig, RocksDbStore};
pub use app::App;
pub use builder::{AppBuilder, BuilderError, MetricsActivation};
pub use config::{ConfigError, StoreConfig, WorkerConfig, DEFAULT_HEARTBEAT_INTERVAL};
pub use job::{HeartbeatJob, Job, JobContext, JobError, Schedule, HEARTBEATS_METRIC};
pub use ports::{BatchOperation, KVStoreError, KeyValueStore, ScanResult};

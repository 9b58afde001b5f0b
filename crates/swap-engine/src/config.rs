use serde::{Deserialize, Serialize};
use swap_store::StoreConfig;

/// Top-level configuration for an [`crate::Engine`]: the Store Lifecycle's
/// RocksDB tuning plus the worker pool sizing the concurrency model calls
/// for. Deserializable so a host process can load it from its own config
/// file rather than this crate hardcoding the values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    /// Number of worker threads draining the swap queue.
    pub workers: usize,
    /// Bound on the pipeline-to-worker queue; `submit` blocks once full.
    pub queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            store: StoreConfig::default(),
            workers: 4,
            queue_capacity: 256,
        }
    }
}

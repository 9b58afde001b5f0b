use serde::{Deserialize, Serialize};

const MIB: u64 = 1024 * 1024;

/// RocksDB tuning and cron cadence for the Store Lifecycle, overridable via
/// configuration rather than hardcoded at each call site. Defaults match
/// the values the swap engine this crate ports has always used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub max_write_buffer_number: i32,
    pub min_write_buffer_number_to_merge: i32,
    pub level0_file_num_compaction_trigger: i32,
    pub target_file_size_base: u64,
    pub max_bytes_for_level_base: u64,
    pub max_background_compactions: i32,
    pub compaction_readahead_size: usize,
    pub block_size: usize,
    pub block_cache_size: usize,
    pub optimize_filters_for_hits: bool,

    /// Cron ticks between `rocksdb.total-sst-files-size` samples.
    pub disk_used_update_period_ticks: u64,
    /// Cron ticks between health-probe file writes.
    pub disk_health_detect_period_ticks: u64,
    /// Cron ticks between `UTIL_GET_STATS` submissions.
    pub stats_interval_ticks: u64,

    /// Soft ceiling `used_db_size` is compared against when rendering
    /// stats; `0` disables the check.
    pub max_db_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            max_write_buffer_number: 6,
            min_write_buffer_number_to_merge: 2,
            level0_file_num_compaction_trigger: 2,
            target_file_size_base: 32 * MIB,
            max_bytes_for_level_base: 256 * MIB,
            max_background_compactions: 4,
            compaction_readahead_size: 2 * MIB as usize,
            block_size: 8 * 1024,
            block_cache_size: MIB as usize,
            optimize_filters_for_hits: true,
            disk_used_update_period_ticks: 60,
            disk_health_detect_period_ticks: 1,
            stats_interval_ticks: 10,
            max_db_size: 0,
        }
    }
}

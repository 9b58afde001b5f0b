/// Fencing granularity of a `KeyRequest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Fleet-wide fence (e.g. `FLUSHALL`).
    Server,
    /// Fences a single logical database (e.g. `FLUSHDB`).
    Db,
    /// Fences one key.
    Key,
}

/// Direction of a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intention {
    /// Disk to RAM.
    In,
    /// RAM to disk.
    Out,
    /// Remove from both.
    Del,
    /// Administrative (compaction, stats).
    Util,
    /// No swap required.
    Nop,
}

bitflags::bitflags! {
    /// Modifiers on an [`Intention`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IntentionFlags: u32 {
        /// After loading, physically remove the swapped-in data from disk.
        const IN_DEL = 1 << 0;
        /// The disk representation was wholly consumed by this load; remove
        /// the whole range, not just the keys that were read.
        const IN_DEL_FULL = 1 << 1;
        /// Delete from memory first; disk cleanup is deferred.
        const DEL_ASYNC = 1 << 2;
        /// Administrative: trigger a full-keyspace compaction.
        const UTIL_COMPACT_RANGE = 1 << 3;
        /// Administrative: read `rocksdb.stats` into the request's result.
        const UTIL_GET_STATS = 1 << 4;
    }
}

impl Default for IntentionFlags {
    fn default() -> Self {
        IntentionFlags::empty()
    }
}

/// Drained disk-cleanup outcome of an `IN` swap, composed from the request's
/// `IN_DEL`/`IN_DEL_FULL` flags and the actual RIO action taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelFlag {
    None,
    Del,
    DelFull,
}

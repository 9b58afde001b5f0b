//! Store Lifecycle: owns the embedded RocksDB process this workspace swaps
//! data in and out of, from first `init` through snapshots, checkpoints,
//! compaction, and periodic housekeeping.

mod config;
pub mod stats;

pub use config::StoreConfig;
pub use stats::{gen_info_string, StatsPreamble};

use rocksdb::checkpoint::Checkpoint;
use rocksdb::{BlockBasedOptions, Cache, Options, ReadOptions, Snapshot, WriteOptions, DB};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use swap_types::Result;

/// Owns one RocksDB instance plus the bookkeeping the cron loop needs:
/// cached `rocksdb.stats` text, a sticky disk-health flag, and the
/// at-most-one live snapshot/checkpoint the original store enforced.
pub struct Rocks {
    db: Arc<DB>,
    /// Fixed base directory every epoch's store directory is nested under.
    /// Cleared on the very first [`Rocks::init`] of a process; never
    /// touched again until the next process start.
    root: PathBuf,
    /// Monotonically increasing counter naming the on-disk directory for
    /// the current store incarnation. Bumped by [`Rocks::reinit`].
    epoch: u64,
    path: PathBuf,
    config: StoreConfig,
    _block_cache: Cache,

    cron_ticks: AtomicU64,
    disk_error: AtomicBool,
    disk_used: AtomicU64,
    stats_cache: Mutex<String>,

    snapshot: Mutex<Option<Snapshot<'static>>>,
    checkpoint_dir: Mutex<Option<PathBuf>>,
}

// SAFETY: `Snapshot<'static>` inside `snapshot` actually borrows `db`. The
// borrow is sound as long as no `Snapshot` outlives the `Arc<DB>` it was
// taken from; `release_snapshot` and `Drop` both clear it before `db` can
// be dropped, and `db` itself is never replaced without going through
// `release_snapshot` first (see `reinit`).
unsafe impl Send for Rocks {}
unsafe impl Sync for Rocks {}

impl Rocks {
    /// Opens the store at epoch 0 under `root`, with the tuning in
    /// `config`. Per the on-disk layout contract, `root` is cleared first —
    /// a fresh process never inherits a prior incarnation's directory.
    pub fn init(root: impl AsRef<Path>, config: StoreConfig) -> Result<Rocks> {
        let root = root.as_ref().to_path_buf();
        if root.exists() {
            std::fs::remove_dir_all(&root)?;
        }
        Rocks::open_epoch(root, 0, config)
    }

    fn open_epoch(root: PathBuf, epoch: u64, config: StoreConfig) -> Result<Rocks> {
        let path = root.join(epoch.to_string());
        std::fs::create_dir_all(&path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_write_buffer_number(config.max_write_buffer_number);
        opts.set_min_write_buffer_number_to_merge(config.min_write_buffer_number_to_merge);
        opts.set_level_zero_file_num_compaction_trigger(config.level0_file_num_compaction_trigger);
        opts.set_target_file_size_base(config.target_file_size_base);
        opts.set_max_bytes_for_level_base(config.max_bytes_for_level_base);
        opts.set_max_background_jobs(config.max_background_compactions);
        opts.set_compaction_readahead_size(config.compaction_readahead_size);
        opts.set_optimize_filters_for_hits(config.optimize_filters_for_hits);
        opts.optimize_for_point_lookup(config.block_cache_size as u64 / (1024 * 1024));

        let block_cache = Cache::new_lru_cache(config.block_cache_size);
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_block_size(config.block_size);
        block_opts.set_block_cache(&block_cache);
        block_opts.set_cache_index_and_filter_blocks(false);
        opts.set_block_based_table_factory(&block_opts);

        let db = DB::open(&opts, &path)?;

        tracing::debug!(path = %path.display(), epoch, "rocks store initialized");
        Ok(Rocks {
            db: Arc::new(db),
            root,
            epoch,
            path,
            config,
            _block_cache: block_cache,
            cron_ticks: AtomicU64::new(0),
            disk_error: AtomicBool::new(false),
            disk_used: AtomicU64::new(0),
            stats_cache: Mutex::new(String::new()),
            snapshot: Mutex::new(None),
            checkpoint_dir: Mutex::new(None),
        })
    }

    /// Closes the store and reopens it at a fresh, empty directory one
    /// epoch later, preserving any outstanding checkpoint handle and its
    /// directory across the close/open. The previous epoch's directory is
    /// left on disk — callers that want it removed too should use
    /// [`Rocks::flush_all`].
    pub fn reinit(self) -> Result<Rocks> {
        self.release_snapshot();
        let Rocks {
            root,
            epoch,
            config,
            checkpoint_dir,
            ..
        } = self;
        let mut rocks = Rocks::open_epoch(root, epoch + 1, config)?;
        rocks.checkpoint_dir = checkpoint_dir;
        Ok(rocks)
    }

    /// Reinitializes the store and removes the directory of the epoch it
    /// just left behind — the full wipe a `FLUSHALL`-style command needs,
    /// as opposed to [`Rocks::reinit`]'s "start clean but leave the old
    /// data in place" semantics (used when the caller still needs to read
    /// or back up the prior epoch).
    pub fn flush_all(self) -> Result<Rocks> {
        let old_path = self.path.clone();
        let rocks = self.reinit()?;
        std::fs::remove_dir_all(&old_path)?;
        Ok(rocks)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn db(&self) -> &Arc<DB> {
        &self.db
    }

    pub fn read_options(&self) -> ReadOptions {
        let mut opts = ReadOptions::default();
        opts.set_verify_checksums(false);
        opts.fill_cache(false);
        opts
    }

    pub fn write_options(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.disable_wal(true);
        opts
    }

    /// Triggers a full-keyspace compaction (`UTIL_COMPACT_RANGE`).
    pub fn compact_range(&self) {
        self.db.compact_range::<&[u8], &[u8]>(None, None);
    }

    /// Takes the single live snapshot, releasing any previous one first.
    pub fn create_snapshot(&self) {
        self.release_snapshot();
        let snap: Snapshot<'_> = self.db.snapshot();
        // SAFETY: see the impl block's safety comment.
        let snap: Snapshot<'static> = unsafe { std::mem::transmute(snap) };
        *self.snapshot.lock().unwrap() = Some(snap);
    }

    pub fn release_snapshot(&self) {
        self.snapshot.lock().unwrap().take();
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.lock().unwrap().is_some()
    }

    pub fn use_snapshot(&self, opts: &mut ReadOptions) {
        if let Some(snap) = self.snapshot.lock().unwrap().as_ref() {
            opts.set_snapshot(snap);
        }
    }

    /// Hands `f` the current live snapshot, if any, without leaking the
    /// lock guard across the call. Lets callers outside this crate (the
    /// Swap Executor's RIO path) pin a `Scan`'s iterator to the same
    /// snapshot `Get`/`MultiGet` already honor via `use_snapshot`.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(Option<&Snapshot<'static>>) -> R) -> R {
        let guard = self.snapshot.lock().unwrap();
        f(guard.as_ref())
    }

    /// Takes the single live checkpoint at `dir`, releasing any previous
    /// one first.
    pub fn create_checkpoint(&self, dir: impl AsRef<Path>) -> Result<()> {
        self.release_checkpoint()?;
        let checkpoint = Checkpoint::new(&self.db)?;
        checkpoint.create_checkpoint(dir.as_ref())?;
        *self.checkpoint_dir.lock().unwrap() = Some(dir.as_ref().to_path_buf());
        Ok(())
    }

    pub fn release_checkpoint(&self) -> Result<()> {
        if let Some(dir) = self.checkpoint_dir.lock().unwrap().take() {
            if dir.exists() {
                std::fs::remove_dir_all(dir)?;
            }
        }
        Ok(())
    }

    /// Advances the cron loop by one tick, sampling disk usage, probing
    /// disk health, and refreshing the cached stats text on the cadences
    /// named by `self.config`.
    pub fn cron_tick(&self) -> Result<()> {
        let n = self.cron_ticks.fetch_add(1, Ordering::SeqCst) + 1;
        if n % self.config.disk_health_detect_period_ticks.max(1) == 0 {
            self.health_probe();
        }
        if n % self.config.disk_used_update_period_ticks.max(1) == 0 {
            self.sample_disk_used()?;
        }
        if n % self.config.stats_interval_ticks.max(1) == 0 {
            self.refresh_stats_cache()?;
        }
        Ok(())
    }

    /// Writes a small probe file under the store directory; failure sets a
    /// sticky `disk_error` flag that only clears on the next successful
    /// probe.
    fn health_probe(&self) {
        let probe_path = self.path.join(".rocks_health");
        match std::fs::write(&probe_path, b"ok") {
            Ok(()) => self.disk_error.store(false, Ordering::SeqCst),
            Err(err) => {
                self.disk_error.store(true, Ordering::SeqCst);
                tracing::warn!(error = %err, "rocks disk health probe failed");
            }
        }
    }

    pub fn disk_error(&self) -> bool {
        self.disk_error.load(Ordering::SeqCst)
    }

    fn sample_disk_used(&self) -> Result<()> {
        if let Some(v) = self.db.property_int_value("rocksdb.total-sst-files-size")? {
            self.disk_used.store(v, Ordering::SeqCst);
            if self.config.max_db_size > 0 && v > self.config.max_db_size {
                tracing::warn!(
                    used = v,
                    max = self.config.max_db_size,
                    "rocks disk usage exceeds the configured max_db_size"
                );
            }
        }
        Ok(())
    }

    fn refresh_stats_cache(&self) -> Result<()> {
        if let Some(s) = self.db.property_value("rocksdb.stats")? {
            *self.stats_cache.lock().unwrap() = s;
        }
        Ok(())
    }

    /// Renders the current info string from cached stats and live store
    /// properties.
    pub fn info_string(&self) -> Result<String> {
        let sequence = self.db.latest_sequence_number();
        let used_db_size = self.disk_used.load(Ordering::SeqCst);
        let used_disk_size = dir_size(&self.path).unwrap_or(0);
        let preamble = StatsPreamble {
            sequence,
            used_db_size,
            max_db_size: self.config.max_db_size,
            used_disk_size,
            // Filesystem capacity requires a `statvfs`-style call this
            // workspace has no dependency for; reporting it equal to usage
            // keeps `used_disk_percent` defined without fabricating a
            // number for free space we can't observe.
            disk_capacity: used_disk_size,
            swap_error: self.disk_error() as u64,
        };
        let rocksdb_stats = self.stats_cache.lock().unwrap().clone();
        Ok(gen_info_string(&preamble, &rocksdb_stats))
    }
}

/// Sums the size of every regular file under `path`, recursing into
/// subdirectories. Unlike a loop over `readdir(3)` entries, `read_dir`
/// never yields a `.`/`..` entry, so there's nothing here to double-count.
fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            total += dir_size(&entry.path())?;
        } else if file_type.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, Rocks) {
        let dir = TempDir::new().unwrap();
        let rocks = Rocks::init(dir.path().join("db"), StoreConfig::default()).unwrap();
        (dir, rocks)
    }

    #[test]
    fn init_creates_an_empty_store() {
        let (_dir, rocks) = store();
        assert!(!rocks.has_snapshot());
        assert!(!rocks.disk_error());
    }

    #[test]
    fn snapshot_lifecycle_is_a_singleton() {
        let (_dir, rocks) = store();
        rocks.create_snapshot();
        assert!(rocks.has_snapshot());
        rocks.create_snapshot();
        assert!(rocks.has_snapshot());
        rocks.release_snapshot();
        assert!(!rocks.has_snapshot());
    }

    #[test]
    fn checkpoint_creates_and_removes_its_directory() {
        let (dir, rocks) = store();
        rocks
            .db()
            .put_opt(b"k", b"v", &rocks.write_options())
            .unwrap();
        let checkpoint_path = dir.path().join("checkpoint");
        rocks.create_checkpoint(&checkpoint_path).unwrap();
        assert!(checkpoint_path.exists());
        rocks.release_checkpoint().unwrap();
        assert!(!checkpoint_path.exists());
    }

    #[test]
    fn cron_tick_refreshes_stats_cache_on_its_configured_cadence() {
        let mut config = StoreConfig::default();
        config.stats_interval_ticks = 1;
        config.disk_used_update_period_ticks = 1;
        let dir = TempDir::new().unwrap();
        let rocks = Rocks::init(dir.path().join("db"), config).unwrap();
        rocks.cron_tick().unwrap();
        let info = rocks.info_string().unwrap();
        assert!(info.starts_with("sequence:"));
        assert!(info.contains("# L0"));
    }

    #[test]
    fn cron_tick_runs_the_disk_used_sample_without_error_even_against_max_db_size() {
        let mut config = StoreConfig::default();
        config.disk_used_update_period_ticks = 1;
        config.max_db_size = 1;
        let dir = TempDir::new().unwrap();
        let rocks = Rocks::init(dir.path().join("db"), config).unwrap();
        rocks.db().put_opt(b"k", b"v", &rocks.write_options()).unwrap();
        rocks.db().flush().unwrap();
        rocks.cron_tick().unwrap();
        assert!(rocks.disk_used.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn health_probe_clears_the_sticky_flag_on_success() {
        let (_dir, rocks) = store();
        rocks.health_probe();
        assert!(!rocks.disk_error());
    }

    #[test]
    fn reinit_bumps_the_epoch_and_opens_a_fresh_directory() {
        let (_dir, rocks) = store();
        rocks.db().put_opt(b"k", b"v", &rocks.write_options()).unwrap();
        let old_path = rocks.path().to_path_buf();
        assert_eq!(rocks.epoch(), 0);

        let rocks = rocks.reinit().unwrap();
        assert_eq!(rocks.epoch(), 1);
        assert!(old_path.exists(), "reinit leaves the prior epoch directory behind");
        assert!(
            rocks.db().get_opt(b"k", &rocks.read_options()).unwrap().is_none(),
            "the new epoch starts empty"
        );
    }

    #[test]
    fn flush_all_reinits_and_removes_the_previous_epoch_directory() {
        let (_dir, rocks) = store();
        let old_path = rocks.path().to_path_buf();

        let rocks = rocks.flush_all().unwrap();
        assert_eq!(rocks.epoch(), 1);
        assert!(!old_path.exists(), "flush_all removes the prior epoch directory");
    }

    #[test]
    fn reinit_preserves_an_outstanding_checkpoint_across_the_close_open() {
        let (dir, rocks) = store();
        let checkpoint_path = dir.path().join("checkpoint");
        rocks.create_checkpoint(&checkpoint_path).unwrap();

        let rocks = rocks.reinit().unwrap();
        assert!(checkpoint_path.exists());
        rocks.release_checkpoint().unwrap();
        assert!(!checkpoint_path.exists());
    }
}

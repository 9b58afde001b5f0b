use crate::error::SwapError;
use crate::intention::{Intention, IntentionFlags};
use crate::key_request::KeyRequestList;
use bytes::Bytes;
use std::any::Any;
use std::fmt;

/// Phase of a [`SwapRequest`]'s life cycle.
///
/// Transitions are driven by `std::mem::replace(&mut self.state, State::Invalid)`
/// at each step, so a panic mid-transition can never leave two overlapping
/// owned states alive: the request is momentarily `Invalid` rather than
/// holding stale data under its old variant.
#[derive(Debug, Default)]
pub enum SwapState {
    #[default]
    New,
    /// The `Encoder` has produced RIO descriptors for this request.
    Encoded,
    /// Those RIOs have been submitted to the store and are in flight.
    IoIssued,
    /// RIO results have come back and been handed to the `Encoder`'s decode
    /// step.
    Decoded,
    /// Decoded results have been merged into the request's `result`.
    Merged,
    /// The request's `notify_cb` has run.
    Notified,
    /// Terminal: either completed normally or short-circuited by an error.
    Finished,
    /// Transient placeholder used only while a transition is in progress.
    Invalid,
}

impl fmt::Display for SwapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SwapState::New => "new",
            SwapState::Encoded => "encoded",
            SwapState::IoIssued => "io_issued",
            SwapState::Decoded => "decoded",
            SwapState::Merged => "merged",
            SwapState::Notified => "notified",
            SwapState::Finished => "finished",
            SwapState::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

/// Opaque per-request payload carried between the `Encoder` and the
/// executor. Production encoders hang their own decoded object behind this;
/// the swap engine core never inspects it.
pub type Opaque = Box<dyn Any + Send>;

/// One request to move a key (or its sub-elements) between memory and disk.
///
/// `data`/`datactx` are the encoder-opaque payload and its decode context;
/// `result` is the buffer the executor's merge step writes into;
/// `finish_cb`/`notify_cb` are run once, in that order, as the request
/// crosses into `Finished`.
pub struct SwapRequest {
    pub key_requests: KeyRequestList,
    pub intention: Intention,
    pub intention_flags: IntentionFlags,
    pub dbid: u32,
    state: SwapState,

    pub data: Option<Opaque>,
    pub datactx: Option<Opaque>,
    pub result: Option<Bytes>,
    pub errcode: Option<SwapError>,

    finish_cb: Option<Box<dyn FnOnce(&mut SwapRequest) + Send>>,
    notify_cb: Option<Box<dyn FnOnce(&mut SwapRequest) + Send>>,

    /// Estimated resident memory this request will free or consume once
    /// applied, used by the Store Lifecycle's `used_db_size` accounting.
    pub swap_memory: usize,
}

impl SwapRequest {
    pub fn new(
        key_requests: KeyRequestList,
        intention: Intention,
        intention_flags: IntentionFlags,
        dbid: u32,
    ) -> SwapRequest {
        SwapRequest {
            key_requests,
            intention,
            intention_flags,
            dbid,
            state: SwapState::New,
            data: None,
            datactx: None,
            result: None,
            errcode: None,
            finish_cb: None,
            notify_cb: None,
            swap_memory: 0,
        }
    }

    pub fn state(&self) -> &SwapState {
        &self.state
    }

    pub fn set_finish_cb(&mut self, cb: impl FnOnce(&mut SwapRequest) + Send + 'static) {
        self.finish_cb = Some(Box::new(cb));
    }

    pub fn set_notify_cb(&mut self, cb: impl FnOnce(&mut SwapRequest) + Send + 'static) {
        self.notify_cb = Some(Box::new(cb));
    }

    fn advance(&mut self, expected: fn(&SwapState) -> bool, next: SwapState, op: &'static str) {
        let prev = std::mem::replace(&mut self.state, SwapState::Invalid);
        if !expected(&prev) {
            tracing::warn!(from = %prev, to = %next, op, "swap request advanced from an unexpected state");
        } else {
            tracing::trace!(from = %prev, to = %next, op, "swap request state transition");
        }
        self.state = next;
    }

    pub fn mark_encoded(&mut self) {
        self.advance(|s| matches!(s, SwapState::New), SwapState::Encoded, "encode");
    }

    pub fn mark_io_issued(&mut self) {
        self.advance(
            |s| matches!(s, SwapState::Encoded),
            SwapState::IoIssued,
            "issue_io",
        );
    }

    pub fn mark_decoded(&mut self) {
        self.advance(
            |s| matches!(s, SwapState::IoIssued),
            SwapState::Decoded,
            "decode",
        );
    }

    pub fn mark_merged(&mut self) {
        self.advance(
            |s| matches!(s, SwapState::Decoded),
            SwapState::Merged,
            "merge",
        );
    }

    /// Runs `notify_cb`, if set, and advances to `Notified`.
    pub fn notify(&mut self) {
        self.advance(
            |s| matches!(s, SwapState::Merged),
            SwapState::Notified,
            "notify",
        );
        if let Some(cb) = self.notify_cb.take() {
            cb(self);
        }
    }

    /// Advances to the terminal `Finished` state and, unless the request
    /// carries a terminal error, runs `finish_cb` — the pipeline-thread
    /// commit of the in-memory side (the host's `SwapIn`/`SwapOut`/`SwapDel`
    /// finalizer). Valid from any non-terminal state: an error can
    /// short-circuit a request at any point in the pipeline.
    ///
    /// A request with `errcode.is_some()` skips `finish_cb` entirely — it
    /// is a no-op beyond the state transition, matching the swap engine's
    /// error handling design: the pipeline never commits a result it
    /// doesn't have.
    pub fn finish(&mut self) {
        let prev = std::mem::replace(&mut self.state, SwapState::Invalid);
        tracing::debug!(from = %prev, errcode = ?self.errcode, "swap request finished");
        self.state = SwapState::Finished;
        let cb = self.finish_cb.take();
        if self.errcode.is_none() {
            if let Some(cb) = cb {
                cb(self);
            }
        }
    }

    /// Records a terminal error and immediately finishes the request,
    /// skipping whatever states remain between the current one and
    /// `Finished`.
    pub fn fail(&mut self, err: SwapError) {
        self.errcode = Some(err);
        self.finish();
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SwapState::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_request::KeyRequest;

    fn request() -> SwapRequest {
        let mut list = KeyRequestList::new();
        list.push(KeyRequest::server(Intention::Util, 0));
        SwapRequest::new(list, Intention::Util, IntentionFlags::empty(), 0)
    }

    #[test]
    fn happy_path_runs_through_every_state() {
        let mut req = request();
        assert!(matches!(req.state(), SwapState::New));
        req.mark_encoded();
        req.mark_io_issued();
        req.mark_decoded();
        req.mark_merged();
        req.notify();
        assert!(matches!(req.state(), SwapState::Notified));
        req.finish();
        assert!(req.is_finished());
    }

    #[test]
    fn fail_short_circuits_straight_to_finished() {
        let mut req = request();
        req.mark_encoded();
        req.fail(SwapError::ExecFail("boom".into()));
        assert!(req.is_finished());
        assert!(req.errcode.is_some());
    }

    #[test]
    fn finish_runs_the_callback_exactly_once() {
        let mut req = request();
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ran2 = ran.clone();
        req.set_finish_cb(move |_| {
            ran2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        req.finish();
        assert_eq!(ran.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn finish_skips_the_callback_when_the_request_errored() {
        let mut req = request();
        let ran = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ran2 = ran.clone();
        req.set_finish_cb(move |_| {
            ran2.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });
        req.fail(SwapError::ExecFail("boom".into()));
        assert_eq!(ran.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert!(req.is_finished());
    }
}

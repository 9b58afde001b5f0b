//! The swap engine core: wires the Request Analyzer, Swap Executor, LSM
//! Adapter, and Store Lifecycle together behind the Scheduler plug-in
//! surface a host process consumes.

mod config;
mod string_hash;

pub use config::EngineConfig;
pub use string_hash::StringHashEncoder;

pub use swap_analyzer::{analyze, arg_window, Command};
pub use swap_executor::{Encoder, WorkerPool};
pub use swap_rio::FaultInjector;
pub use swap_store::Rocks;
pub use swap_types::*;

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use swap_executor::Executor;

/// Owns the `Rocks` handle, the engine configuration, and the
/// fault-injection knobs, and exposes the Scheduler plug-in surface of
/// `analyze`/`submit`/`execute`/`finish`/`cron_tick` a host process calls
/// into. Generic over the `Encoder` so a host can plug in its own
/// object-type support; this workspace's own instantiation uses
/// [`StringHashEncoder`].
///
/// `executor` is an `Option` only so [`Engine::reinit`]/[`Engine::flush_all`]
/// can briefly take exclusive ownership of the `Rocks` handle behind it
/// (see those methods); it is always `Some` between calls.
pub struct Engine<E: Encoder> {
    executor: Option<Arc<Executor<E>>>,
    pool: WorkerPool,
    fault: Arc<FaultInjector>,
    config: EngineConfig,
}

impl<E: Encoder + 'static> Engine<E> {
    pub fn open(path: impl AsRef<Path>, config: EngineConfig, encoder: E) -> Result<Engine<E>> {
        let fault = Arc::new(FaultInjector::default());
        let rocks = Arc::new(Rocks::init(path, config.store.clone())?);
        let executor = Arc::new(Executor::new(rocks, encoder, fault.clone()));
        let pool = WorkerPool::new(config.workers, config.queue_capacity);
        Ok(Engine {
            executor: Some(executor),
            pool,
            fault,
            config,
        })
    }

    fn executor(&self) -> &Arc<Executor<E>> {
        self.executor.as_ref().expect("engine executor missing outside of reinit/flush_all")
    }

    pub fn analyze(&self, command: Command, argv: &[Bytes], dbid: u32) -> Result<KeyRequestList> {
        swap_analyzer::analyze(command, argv, dbid)
    }

    /// Worker-thread entry: runs `request` through the Swap Executor's
    /// state machine in place. Exposed directly for callers that already
    /// own a worker thread of their own; [`Engine::submit`] is the
    /// convenience wrapper over this workspace's own pool.
    pub fn execute(&self, request: &mut SwapRequest) -> Result<()> {
        self.executor().execute(request)
    }

    /// Submits `request` to the worker pool. On a worker thread, `request`
    /// runs through [`Engine::execute`] and then `notify()`s exactly once —
    /// on success or on the first error alike — before `on_notified` is
    /// handed the request. `on_notified` is the crossing back to whatever
    /// the host considers its pipeline thread; per the concurrency model,
    /// the host must not touch the hot keyspace until it has called
    /// [`Engine::finish`] on the request there.
    pub fn submit(&self, mut request: SwapRequest, on_notified: impl FnOnce(SwapRequest) + Send + 'static) {
        let executor = self.executor().clone();
        self.pool.submit(move || {
            if let Err(err) = executor.execute(&mut request) {
                tracing::warn!(error = %err, "swap request failed, notifying with a terminal error");
                request.errcode = Some(err);
            }
            request.notify();
            on_notified(request);
        });
    }

    /// Pipeline-thread entry: commits the in-memory side via `request`'s
    /// `finish_cb` — the host's `SwapIn`/`SwapOut`/`SwapDel` finalizer,
    /// registered before the request was submitted — and returns the
    /// now-`Finished` request. A no-op beyond the state transition if the
    /// request carries a terminal error.
    pub fn finish(&self, mut request: SwapRequest) -> SwapRequest {
        request.finish();
        request
    }

    pub fn fault_injector(&self) -> &Arc<FaultInjector> {
        &self.fault
    }

    pub fn rocks(&self) -> &Arc<Rocks> {
        self.executor().rocks()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advances the Store Lifecycle's cron loop by one tick.
    pub fn cron_tick(&self) -> Result<()> {
        self.rocks().cron_tick()
    }

    /// Quiesces the worker pool, reinitializes the store at the next
    /// epoch, and resumes with a fresh pool. Requires `&mut self`: Rust's
    /// exclusive-borrow rule stands in for the concurrency model's "all
    /// `Rocks` mutation requires the worker pool quiesced" requirement —
    /// no caller can be submitting concurrently while this runs.
    pub fn reinit(&mut self) -> Result<()> {
        self.swap_rocks(Rocks::reinit)
    }

    /// Like [`Engine::reinit`], but also removes the prior epoch's
    /// directory — the full wipe a `FLUSHALL`-style command needs.
    pub fn flush_all(&mut self) -> Result<()> {
        self.swap_rocks(Rocks::flush_all)
    }

    fn swap_rocks(&mut self, op: impl FnOnce(Rocks) -> Result<Rocks>) -> Result<()> {
        let old_pool = std::mem::replace(&mut self.pool, WorkerPool::new(self.config.workers.max(1), self.config.queue_capacity));
        old_pool.shutdown();

        let executor = self.executor.take().expect("engine executor missing");
        let executor = Arc::try_unwrap(executor)
            .unwrap_or_else(|_| panic!("swap executor still has outstanding references during reinit"));
        let (rocks, encoder, fault) = executor.into_parts();
        let rocks = Arc::try_unwrap(rocks)
            .unwrap_or_else(|_| panic!("rocks store still has outstanding references during reinit"));

        let rocks = Arc::new(op(rocks)?);
        self.executor = Some(Arc::new(Executor::new(rocks, encoder, fault)));
        Ok(())
    }

    pub fn shutdown(self) {
        self.pool.shutdown();
    }
}

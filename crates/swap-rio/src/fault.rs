use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use swap_types::{Result, SwapError};

/// Injects synthetic latency and failures ahead of RIO execution.
///
/// Held by the `Engine` context and shared across workers; a no-op
/// injector (the `Default`) costs one atomic load per call. Exists to let
/// tests exercise the executor's error-propagation and partial-result
/// paths without a real RocksDB fault.
#[derive(Default)]
pub struct FaultInjector {
    /// Number of calls remaining before the next injected error; `0` means
    /// disarmed.
    armed: AtomicUsize,
    template: Mutex<Option<fn() -> SwapError>>,
    delay: Mutex<Option<Duration>>,
}

impl FaultInjector {
    /// Arms the injector to fail the `n`th call from now with `err`.
    pub fn fail_after(&self, n: usize, err: fn() -> SwapError) {
        self.armed.store(n.max(1), Ordering::SeqCst);
        *self.template.lock().unwrap() = Some(err);
    }

    pub fn set_latency(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Called immediately before a RIO executes. Sleeps for the configured
    /// latency, then returns `Err` if this call is the armed one.
    pub fn check(&self) -> Result<()> {
        if let Some(delay) = *self.delay.lock().unwrap() {
            std::thread::sleep(delay);
        }
        let prev = self.armed.load(Ordering::SeqCst);
        if prev == 0 {
            return Ok(());
        }
        if prev == 1 {
            self.armed.store(0, Ordering::SeqCst);
            if let Some(template) = self.template.lock().unwrap().take() {
                return Err(template());
            }
        } else {
            self.armed.store(prev - 1, Ordering::SeqCst);
        }
        Ok(())
    }
}

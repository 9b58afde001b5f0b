use crossbeam_channel::{bounded, Sender};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size worker pool fed by a single bounded queue, matching the
/// pipeline-thread/worker-pool split: one thread decodes commands and
/// submits swap work, a fixed number of workers drain it concurrently so a
/// slow disk can't stall command intake past the queue's capacity.
pub struct WorkerPool {
    sender: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` threads sharing one bounded queue of capacity
    /// `queue_capacity`.
    pub fn new(workers: usize, queue_capacity: usize) -> WorkerPool {
        let (sender, receiver) = bounded::<Job>(queue_capacity);
        let handles = (0..workers.max(1))
            .map(|id| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("swap-worker-{id}"))
                    .spawn(move || {
                        for job in receiver {
                            job();
                        }
                    })
                    .expect("failed to spawn swap worker thread")
            })
            .collect();
        WorkerPool { sender, workers: handles }
    }

    /// Enqueues `job`, blocking if every worker is busy and the queue is
    /// full. Blocking (rather than dropping or growing unboundedly) is the
    /// back-pressure the concurrency model relies on.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if self.sender.send(Box::new(job)).is_err() {
            tracing::warn!("swap worker pool submit failed: all workers have shut down");
        }
    }

    /// Drops the send side and waits for queued work to drain.
    pub fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.join();
        }
    }
}

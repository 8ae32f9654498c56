//! Coalescing one-shot notification timer
//!
//! [`DelayedNotify::send_notification`] arms a timer unless one is already
//! pending; when the timer expires the callback runs once on the timer's
//! worker thread. Any number of sends inside one interval produce a single
//! callback.

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

enum TimerCommand {
    Arm,
    Shutdown,
}

/// Debounced notifier with an injected callback
pub struct DelayedNotify {
    delay: Duration,
    pending: Arc<AtomicBool>,
    tx: Sender<TimerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl DelayedNotify {
    /// Spawn the timer thread
    pub fn new<F>(delay: Duration, callback: F) -> Self
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let pending = Arc::new(AtomicBool::new(false));
        let worker_pending = pending.clone();

        let worker = thread::Builder::new()
            .name("delayed-notify".into())
            .spawn(move || {
                while let Ok(command) = rx.recv() {
                    match command {
                        TimerCommand::Arm => match rx.recv_timeout(delay) {
                            Err(RecvTimeoutError::Timeout) | Ok(TimerCommand::Arm) => {
                                // clear first so sends racing the callback re-arm
                                worker_pending.store(false, Ordering::Release);
                                callback();
                            }
                            Ok(TimerCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => {
                                break
                            }
                        },
                        TimerCommand::Shutdown => break,
                    }
                }
            })
            .ok();

        if worker.is_none() {
            tracing::warn!("failed to spawn notification timer thread");
        }

        Self {
            delay,
            pending,
            tx,
            worker,
        }
    }

    /// Arm the timer unless a notification is already pending
    pub fn send_notification(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(TimerCommand::Arm);
        }
    }

    /// Is a notification waiting to fire?
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Debounce interval
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for DelayedNotify {
    fn drop(&mut self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

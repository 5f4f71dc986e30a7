//! [`PolicyWorker`] – fixed-rate background control loop.
//!
//! The worker runs a tick closure on its own thread at absolute deadlines
//! `start + n · period`.  Between ticks it polls a
//! [`CancellationToken`]; cancellation is cooperative, so a tick in progress
//! always runs to completion.
//!
//! [`PolicyWorker::stop`] cancels the token and waits for the worker's
//! completion signal for at most `timeout`.  A worker that signals in time is
//! joined, which makes all of its effects visible to the caller.  A worker
//! that does not is detached and reported as stalled instead of hanging the
//! caller.
//!
//! A tick that overruns its period is logged and the schedule re-bases on
//! the current time rather than bursting to catch up.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mimic_types::MimicError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::watchdog::FaultLog;

/// Handle to a running control loop thread.
pub struct PolicyWorker {
    component: String,
    token: CancellationToken,
    done_rx: Receiver<u64>,
    handle: Option<JoinHandle<()>>,
    faults: Arc<FaultLog>,
}

impl PolicyWorker {
    /// Spawn a worker named `component` that calls `tick(n)` every `period`.
    ///
    /// The loop ends when the token is cancelled or `tick` returns an error;
    /// the error is reported to `faults`.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::HardwareFault`] if the OS refuses to spawn the
    /// thread.
    pub fn spawn<F>(
        component: &str,
        period: Duration,
        faults: Arc<FaultLog>,
        mut tick: F,
    ) -> Result<Self, MimicError>
    where
        F: FnMut(u64) -> Result<(), MimicError> + Send + 'static,
    {
        let token = CancellationToken::new();
        let (done_tx, done_rx) = mpsc::channel();

        let loop_token = token.clone();
        let loop_faults = Arc::clone(&faults);
        let name = component.to_string();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let mut deadline = Instant::now();
                let mut ticks = 0_u64;
                while !loop_token.is_cancelled() {
                    if let Err(e) = tick(ticks) {
                        loop_faults.report(&name, format!("tick {ticks} failed: {e}"));
                        break;
                    }
                    ticks += 1;

                    deadline += period;
                    let now = Instant::now();
                    match deadline.checked_duration_since(now) {
                        Some(wait) => thread::sleep(wait),
                        None => {
                            warn!(
                                worker = %name,
                                tick = ticks,
                                late_us = now.duration_since(deadline).as_micros() as u64,
                                "tick overran its period"
                            );
                            deadline = now;
                        }
                    }
                }
                debug!(worker = %name, ticks, "control loop finished");
                // The receiver may already be gone after a detach.
                let _ = done_tx.send(ticks);
            })
            .map_err(|e| MimicError::HardwareFault {
                component: component.to_string(),
                details: format!("failed to spawn worker thread: {e}"),
            })?;

        info!(worker = component, period_ms = period.as_secs_f64() * 1e3, "control loop started");
        Ok(Self {
            component: component.to_string(),
            token,
            done_rx,
            handle: Some(handle),
            faults,
        })
    }

    /// `true` while the loop thread has not yet returned.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Request cancellation without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancel the loop and wait up to `timeout` for it to finish.
    ///
    /// Returns the number of completed ticks.
    ///
    /// # Errors
    ///
    /// - [`MimicError::WorkerStalled`] if the loop did not finish in time; the
    ///   thread is detached and a fault is reported.
    /// - [`MimicError::HardwareFault`] if the loop thread panicked.
    pub fn stop(mut self, timeout: Duration) -> Result<u64, MimicError> {
        self.cancel();
        match self.done_rx.recv_timeout(timeout) {
            Ok(ticks) => {
                self.join()?;
                info!(worker = %self.component, ticks, "control loop stopped");
                Ok(ticks)
            }
            Err(RecvTimeoutError::Disconnected) => {
                // The sender was dropped without a signal: the loop panicked.
                self.join()?;
                Err(MimicError::HardwareFault {
                    component: self.component.clone(),
                    details: "worker exited without completion signal".to_string(),
                })
            }
            Err(RecvTimeoutError::Timeout) => {
                // Detach: the thread keeps its cancelled token and exits on
                // its own if the stuck tick ever returns.
                drop(self.handle.take());
                let timeout_ms = timeout.as_millis() as u64;
                self.faults.report(
                    &self.component,
                    format!("did not stop within {timeout_ms} ms; detached"),
                );
                Err(MimicError::WorkerStalled {
                    label: self.component.clone(),
                    timeout_ms,
                })
            }
        }
    }

    fn join(&mut self) -> Result<(), MimicError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| MimicError::HardwareFault {
                component: self.component.clone(),
                details: "worker thread panicked".to_string(),
            }),
            None => Ok(()),
        }
    }
}

impl Drop for PolicyWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn runs_ticks_until_stopped() {
        let counter = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&counter);
        let worker = PolicyWorker::spawn(
            "test_worker",
            Duration::from_millis(2),
            Arc::new(FaultLog::new()),
            move |n| {
                assert_eq!(n, seen.load(Ordering::SeqCst));
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        assert!(worker.is_running());
        let ticks = worker.stop(Duration::from_millis(500)).unwrap();
        assert!(ticks > 0);
        // Joined: the counter is final and matches the reported tick count.
        assert_eq!(counter.load(Ordering::SeqCst), ticks);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(counter.load(Ordering::SeqCst), ticks);
    }

    #[test]
    fn failing_tick_ends_loop_and_reports_fault() {
        let faults = Arc::new(FaultLog::new());
        let worker = PolicyWorker::spawn(
            "failing_worker",
            Duration::from_millis(1),
            Arc::clone(&faults),
            |n| {
                if n == 3 {
                    Err(MimicError::PolicyFailed("boom".to_string()))
                } else {
                    Ok(())
                }
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        assert!(!worker.is_running());
        assert_eq!(worker.stop(Duration::from_millis(100)).unwrap(), 3);
        let reports = faults.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].message.contains("boom"));
    }

    #[test]
    fn stalled_tick_is_detached_after_timeout() {
        let faults = Arc::new(FaultLog::new());
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let worker = PolicyWorker::spawn(
            "stuck_worker",
            Duration::from_millis(1),
            Arc::clone(&faults),
            move |_| {
                let _ = release_rx.recv();
                Ok(())
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(10));
        let started = Instant::now();
        let err = worker.stop(Duration::from_millis(50)).unwrap_err();
        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(matches!(err, MimicError::WorkerStalled { timeout_ms: 50, .. }));
        assert_eq!(faults.reports().len(), 1);

        // Let the detached thread observe the cancelled token and exit.
        drop(release_tx);
    }

    #[test]
    fn overrunning_tick_keeps_running() {
        let counter = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&counter);
        let worker = PolicyWorker::spawn(
            "slow_worker",
            Duration::from_millis(1),
            Arc::new(FaultLog::new()),
            move |_| {
                thread::sleep(Duration::from_millis(5));
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
        .unwrap();

        thread::sleep(Duration::from_millis(40));
        let ticks = worker.stop(Duration::from_millis(500)).unwrap();
        assert!(ticks >= 2);
        assert_eq!(counter.load(Ordering::SeqCst), ticks);
    }
}

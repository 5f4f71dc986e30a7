//! [`Watchdog`] – liveness tracking for background workers.
//!
//! Each policy worker calls [`Watchdog::heartbeat`] once per completed tick.
//! The dispatcher thread polls [`Watchdog::health`] from its non-blocking
//! `run()` and reports a fault to the [`FaultLog`] when a worker has gone
//! silent past its deadline.
//!
//! Both types use interior locking so they can be shared as `Arc`s between
//! the dispatcher thread and worker threads.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use mimic_types::FaultReport;
use tracing::error;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health state reported for a single component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentHealth {
    /// A heartbeat arrived within the deadline.
    Healthy,
    /// No heartbeat within the deadline, or the component is unknown.
    TimedOut,
}

struct ComponentEntry {
    last_heartbeat: Instant,
    timeout: Duration,
}

// ────────────────────────────────────────────────────────────────────────────
// Watchdog
// ────────────────────────────────────────────────────────────────────────────

/// Heartbeat deadlines for registered components.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use mimic_runtime::watchdog::{ComponentHealth, Watchdog};
///
/// let wd = Watchdog::new();
/// wd.register("policy_worker:Mimic", Duration::from_millis(200));
/// wd.heartbeat("policy_worker:Mimic");
///
/// assert_eq!(wd.health("policy_worker:Mimic"), ComponentHealth::Healthy);
/// ```
#[derive(Default)]
pub struct Watchdog {
    components: Mutex<HashMap<String, ComponentEntry>>,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component_id` with a heartbeat `timeout`, starting healthy.
    /// Re-registering resets the deadline.
    pub fn register(&self, component_id: &str, timeout: Duration) {
        self.lock().insert(
            component_id.to_string(),
            ComponentEntry {
                last_heartbeat: Instant::now(),
                timeout,
            },
        );
    }

    /// Stop tracking `component_id`.
    pub fn deregister(&self, component_id: &str) {
        self.lock().remove(component_id);
    }

    /// Record a heartbeat.  No-op for unregistered components.
    pub fn heartbeat(&self, component_id: &str) {
        if let Some(entry) = self.lock().get_mut(component_id) {
            entry.last_heartbeat = Instant::now();
        }
    }

    pub fn health(&self, component_id: &str) -> ComponentHealth {
        match self.lock().get(component_id) {
            Some(entry) if entry.last_heartbeat.elapsed() <= entry.timeout => {
                ComponentHealth::Healthy
            }
            _ => ComponentHealth::TimedOut,
        }
    }

    /// Time since the last heartbeat of `component_id`.
    pub fn silence(&self, component_id: &str) -> Option<Duration> {
        self.lock()
            .get(component_id)
            .map(|entry| entry.last_heartbeat.elapsed())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ComponentEntry>> {
        self.components.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FaultLog
// ────────────────────────────────────────────────────────────────────────────

/// Append-only record of reported faults.
#[derive(Default)]
pub struct FaultLog {
    reports: Mutex<Vec<FaultReport>>,
}

impl FaultLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log and retain a fault.
    pub fn report(&self, component: &str, message: impl Into<String>) -> FaultReport {
        let fault = FaultReport::now(component, message);
        error!(component = %fault.component, message = %fault.message, "fault reported");
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(fault.clone());
        fault
    }

    /// Snapshot of every fault reported so far.
    pub fn reports(&self) -> Vec<FaultReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_empty(&self) -> bool {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

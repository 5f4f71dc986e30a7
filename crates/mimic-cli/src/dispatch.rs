//! State registration and the dispatcher loop driving one behavior.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use mimic_motion::MotionLibrary;
use mimic_runtime::sim::{ReplayPolicy, SimArticulation};
use mimic_runtime::{Articulation, FsmRegistry, FsmState, MimicConfig, MimicState};
use mimic_types::MimicError;
use tracing::{info, warn};

/// Mode number of the mimic behavior.
pub const MIMIC_MODE: i32 = 4;
pub const MIMIC_LABEL: &str = "Mimic";

/// Populate the registry with every state this binary can run.
///
/// # Errors
///
/// Propagates registration collisions.
pub fn register_default_states(
    config: &MimicConfig,
    library: &Arc<MotionLibrary>,
    robot: &Arc<SimArticulation>,
) -> Result<FsmRegistry, MimicError> {
    let mut registry = FsmRegistry::new();

    let config = config.clone();
    let library = Arc::clone(library);
    let robot = Arc::clone(robot);
    registry.register(MIMIC_MODE, MIMIC_LABEL, move |id| {
        let state = MimicState::new(
            id.clone(),
            config.clone(),
            Arc::clone(&library),
            Arc::clone(&robot) as Arc<dyn Articulation>,
            Box::new(ReplayPolicy::new(robot.dof())),
            Box::new(robot.sink()),
        )?;
        Ok(Box::new(state) as Box<dyn FsmState>)
    })?;

    Ok(registry)
}

/// Why the dispatcher stopped.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The state asked to hand over to the given label.
    Transition(String),
    /// `run_seconds` elapsed.
    TimeUp,
    /// The shutdown flag was raised.
    Interrupted,
}

/// Enter `state`, call `run()` every `period` until it requests a transition,
/// `limit` elapses or `shutdown` is set, then exit it.
///
/// `exit()` is always attempted; its error wins over a `run()` error only
/// when `run()` succeeded.
///
/// # Errors
///
/// Propagates `enter`, `run` and `exit` failures.
pub fn drive(
    state: &mut dyn FsmState,
    period: Duration,
    limit: Option<Duration>,
    shutdown: &AtomicBool,
) -> Result<Outcome, MimicError> {
    state.enter()?;
    info!(state = %state.id(), "dispatching");

    let started = Instant::now();
    let mut deadline = started;
    let result = loop {
        if shutdown.load(Ordering::SeqCst) {
            break Ok(Outcome::Interrupted);
        }
        if limit.is_some_and(|l| started.elapsed() >= l) {
            break Ok(Outcome::TimeUp);
        }
        if let Err(e) = state.run() {
            break Err(e);
        }
        if let Some(target) = state.check_transition() {
            break Ok(Outcome::Transition(target));
        }

        deadline += period;
        match deadline.checked_duration_since(Instant::now()) {
            Some(wait) => thread::sleep(wait),
            None => deadline = Instant::now(),
        }
    };

    let exited = state.exit();
    match (result, exited) {
        (Err(e), Err(exit_err)) => {
            warn!(error = %exit_err, "exit failed after run error");
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(_), Err(e)) => Err(e),
        (Ok(outcome), Ok(())) => Ok(outcome),
    }
}

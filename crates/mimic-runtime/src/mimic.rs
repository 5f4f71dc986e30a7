//! [`MimicState`] – reference-motion tracking behavior.
//!
//! # Lifecycle
//!
//! ```text
//! Idle ──enter()──▶ Active ──exit()──▶ Stopped ──enter()──▶ Active …
//! ```
//!
//! [`enter`][MimicState::enter] fetches the clip from the shared
//! [`MotionLibrary`] (loading it on first use), aligns the clip heading to the
//! robot's current heading at `time_start`, and starts exactly one
//! [`PolicyWorker`].  Each worker tick:
//!
//! 1. advances the playback cursor to `time_start + n · step_dt`,
//! 2. builds the observation from the clip and live robot state,
//! 3. queries the [`Policy`],
//! 4. publishes the action and heartbeats the [`Watchdog`].
//!
//! [`run`][MimicState::run] is the dispatcher-thread hook: it forwards the
//! latest action to the [`JointCommandSink`] and reports a stalled worker,
//! never blocking on the worker itself.
//!
//! [`exit`][MimicState::exit] cancels the worker and waits at most
//! `join_timeout_ms` for it.
//!
//! # Observation layout
//!
//! | term | width |
//! |---|---|
//! | reference joint positions ++ velocities | `2 · dof` |
//! | reference root orientation in root frame (6D) | `6` |
//! | robot joint positions | `dof` |
//! | robot joint velocities | `dof` |
//! | previous action | `dof` |

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mimic_motion::observation::{motion_anchor_ori_b, motion_command};
use mimic_motion::{AnchorAligner, MotionClip, MotionLibrary, PlaybackCursor};
use mimic_types::{Action, FaultReport, MimicError, Observation, StateId};
use nalgebra::{Rotation3, UnitQuaternion};
use tracing::{info, instrument, warn};

use crate::config::MimicConfig;
use crate::robot::{Articulation, JointCommandSink, Policy};
use crate::state::{FsmState, LifecyclePhase};
use crate::watchdog::{ComponentHealth, FaultLog, Watchdog};
use crate::worker::PolicyWorker;

/// Label requested when the robot has tipped past `max_tilt_rad`.
pub const PASSIVE_LABEL: &str = "Passive";
/// Label requested once playback has passed `time_end`.
pub const VELOCITY_LABEL: &str = "Velocity";

/// Progress published by the worker after every tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackStatus {
    /// Completed ticks since the last `enter()`.
    pub ticks: u64,
    /// Clip time of the most recent tick.
    pub motion_time: f32,
    pub frame: usize,
    /// `None` until the first tick completes.
    pub last_action: Option<Action>,
}

/// The mimic behavior state.
pub struct MimicState {
    id: StateId,
    component: String,
    config: MimicConfig,
    library: Arc<MotionLibrary>,
    articulation: Arc<dyn Articulation>,
    policy: Arc<Mutex<Box<dyn Policy>>>,
    sink: Box<dyn JointCommandSink>,
    watchdog: Arc<Watchdog>,
    faults: Arc<FaultLog>,
    status: Arc<Mutex<PlaybackStatus>>,
    phase: LifecyclePhase,
    worker: Option<PolicyWorker>,
    clip: Option<Arc<MotionClip>>,
    world_to_init: Option<Rotation3<f32>>,
    time_end: f32,
    stall_reported: bool,
}

impl MimicState {
    /// Construct an idle mimic state.
    ///
    /// # Errors
    ///
    /// Returns [`MimicError::InvalidConfig`] if `config` fails validation.
    pub fn new(
        id: StateId,
        config: MimicConfig,
        library: Arc<MotionLibrary>,
        articulation: Arc<dyn Articulation>,
        policy: Box<dyn Policy>,
        sink: Box<dyn JointCommandSink>,
    ) -> Result<Self, MimicError> {
        config.validate()?;
        Ok(Self {
            component: format!("policy_worker:{}", id.label),
            id,
            config,
            library,
            articulation,
            policy: Arc::new(Mutex::new(policy)),
            sink,
            watchdog: Arc::new(Watchdog::new()),
            faults: Arc::new(FaultLog::new()),
            status: Arc::new(Mutex::new(PlaybackStatus::default())),
            phase: LifecyclePhase::Idle,
            worker: None,
            clip: None,
            world_to_init: None,
            time_end: 0.0,
            stall_reported: false,
        })
    }

    pub fn config(&self) -> &MimicConfig {
        &self.config
    }

    /// Clip used by the current or most recent activation.
    pub fn clip(&self) -> Option<&Arc<MotionClip>> {
        self.clip.as_ref()
    }

    /// Heading alignment computed by the most recent `enter()`.
    pub fn world_to_init(&self) -> Option<&Rotation3<f32>> {
        self.world_to_init.as_ref()
    }

    pub fn status(&self) -> PlaybackStatus {
        lock(&self.status).clone()
    }

    pub fn faults(&self) -> Vec<FaultReport> {
        self.faults.reports()
    }

    /// `true` while a worker thread is alive.
    pub fn worker_running(&self) -> bool {
        self.worker.as_ref().is_some_and(PolicyWorker::is_running)
    }

    /// Load (or reuse) the clip, align it, and start the control loop.
    ///
    /// # Errors
    ///
    /// - [`MimicError::AlreadyActive`] if called while active.
    /// - [`MimicError::Load`] if the clip cannot be loaded.
    /// - [`MimicError::HardwareFault`] if gains cannot be applied or the
    ///   worker thread cannot be spawned.
    ///
    /// On error no worker is started and the phase is unchanged.  Gains are
    /// applied before the spawn and stay applied if the spawn fails.
    #[instrument(skip(self), fields(state = %self.id))]
    pub fn enter(&mut self) -> Result<(), MimicError> {
        if self.phase == LifecyclePhase::Active {
            return Err(MimicError::AlreadyActive(self.id.label.clone()));
        }

        let clip = self
            .library
            .get_or_load(&self.config.motion_file, self.config.clip_dt)?;
        if !self.config.kp.is_empty() {
            self.sink.set_gains(&self.config.kp, &self.config.kd)?;
        }

        let mut cursor = PlaybackCursor::new(Arc::clone(&clip));
        let mut anchor = AnchorAligner::new();
        let robot_orientation = self.articulation.root_orientation();
        let world_to_init = *anchor.reset(&mut cursor, &robot_orientation, self.config.time_start);
        let time_end = self.config.time_end.unwrap_or_else(|| clip.duration());

        // Fresh per activation: a detached worker from an earlier activation
        // can only ever write into its own, orphaned copies.
        let status = Arc::new(Mutex::new(PlaybackStatus {
            motion_time: self.config.time_start,
            frame: cursor.frame(),
            ..PlaybackStatus::default()
        }));
        let watchdog = Arc::new(Watchdog::new());
        watchdog.register(&self.component, self.config.watchdog_timeout());

        let mut tick = PlaybackTick {
            last_action: Action::zeros(clip.num_dof()),
            cursor,
            anchor,
            articulation: Arc::clone(&self.articulation),
            policy: Arc::clone(&self.policy),
            status: Arc::clone(&status),
            watchdog: Arc::clone(&watchdog),
            component: self.component.clone(),
            time_start: self.config.time_start,
            step_dt: self.config.step_dt,
        };
        let worker = PolicyWorker::spawn(
            &self.component,
            self.config.step_period(),
            Arc::clone(&self.faults),
            move |n| tick.run(n),
        )?;

        info!(
            frames = clip.num_frames(),
            dof = clip.num_dof(),
            time_start = self.config.time_start,
            time_end,
            yaw_offset_rad = world_to_init.angle(),
            "mimic state entered"
        );
        self.status = status;
        self.watchdog = watchdog;
        self.clip = Some(clip);
        self.world_to_init = Some(world_to_init);
        self.time_end = time_end;
        self.stall_reported = false;
        self.worker = Some(worker);
        self.phase = LifecyclePhase::Active;
        Ok(())
    }

    /// Forward the latest action to the joints and check worker liveness.
    ///
    /// # Errors
    ///
    /// Propagates [`JointCommandSink::command`] failures.
    pub fn run(&mut self) -> Result<(), MimicError> {
        if self.phase != LifecyclePhase::Active {
            return Ok(());
        }

        match self.watchdog.health(&self.component) {
            ComponentHealth::Healthy => self.stall_reported = false,
            ComponentHealth::TimedOut if !self.stall_reported => {
                let silence_ms = self
                    .watchdog
                    .silence(&self.component)
                    .map_or(0, |d| d.as_millis());
                self.faults.report(
                    &self.component,
                    format!("no tick completed for {silence_ms} ms"),
                );
                self.stall_reported = true;
            }
            ComponentHealth::TimedOut => {}
        }

        let action = lock(&self.status).last_action.clone();
        if let Some(action) = action {
            self.sink.command(&action.joint_targets)?;
        }
        Ok(())
    }

    /// Request the passive state on a fall, the velocity state once the
    /// configured playback window has elapsed.
    pub fn check_transition(&self) -> Option<String> {
        if self.phase != LifecyclePhase::Active {
            return None;
        }
        let gravity = self.articulation.projected_gravity();
        let tilt = (-gravity.z).clamp(-1.0, 1.0).acos();
        if tilt > self.config.max_tilt_rad {
            warn!(state = %self.id, tilt_rad = tilt, "bad orientation");
            return Some(PASSIVE_LABEL.to_string());
        }
        if lock(&self.status).motion_time > self.time_end {
            return Some(VELOCITY_LABEL.to_string());
        }
        None
    }

    /// Cancel the control loop and wait for it to finish.
    ///
    /// A no-op unless active.  After `Ok(())` no worker thread is running.
    ///
    /// # Errors
    ///
    /// [`MimicError::WorkerStalled`] if the worker missed `join_timeout_ms`;
    /// it has then been detached and a fault recorded.  The state is
    /// `Stopped` either way.
    #[instrument(skip(self), fields(state = %self.id))]
    pub fn exit(&mut self) -> Result<(), MimicError> {
        let Some(worker) = self.worker.take() else {
            if self.phase == LifecyclePhase::Active {
                self.phase = LifecyclePhase::Stopped;
            }
            return Ok(());
        };
        let result = worker.stop(self.config.join_timeout());
        self.watchdog.deregister(&self.component);
        self.phase = LifecyclePhase::Stopped;
        let ticks = result?;
        info!(ticks, "mimic state exited");
        Ok(())
    }
}

/// Everything one worker tick needs.  Owns the cursor and the alignment for
/// the lifetime of one activation.
struct PlaybackTick {
    cursor: PlaybackCursor,
    anchor: AnchorAligner,
    articulation: Arc<dyn Articulation>,
    policy: Arc<Mutex<Box<dyn Policy>>>,
    status: Arc<Mutex<PlaybackStatus>>,
    watchdog: Arc<Watchdog>,
    component: String,
    time_start: f32,
    step_dt: f32,
    last_action: Action,
}

impl PlaybackTick {
    fn run(&mut self, n: u64) -> Result<(), MimicError> {
        let motion_time = self.time_start + n as f32 * self.step_dt;
        let frame = self.cursor.advance(motion_time);
        let robot_orientation = self.articulation.root_orientation();
        let observation = build_observation(
            &self.cursor,
            &self.anchor,
            self.articulation.as_ref(),
            &robot_orientation,
            &self.last_action,
        );

        let action = lock(&self.policy).act(&observation)?;
        let dof = self.cursor.clip().num_dof();
        if action.joint_targets.len() != dof {
            return Err(MimicError::PolicyFailed(format!(
                "policy returned {} targets for {dof} joints",
                action.joint_targets.len()
            )));
        }
        self.last_action.clone_from(&action);

        {
            let mut status = lock(&self.status);
            status.ticks = n + 1;
            status.motion_time = motion_time;
            status.frame = frame;
            status.last_action = Some(action);
        }
        self.watchdog.heartbeat(&self.component);
        Ok(())
    }
}

impl FsmState for MimicState {
    fn id(&self) -> &StateId {
        &self.id
    }

    fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    fn enter(&mut self) -> Result<(), MimicError> {
        MimicState::enter(self)
    }

    fn run(&mut self) -> Result<(), MimicError> {
        MimicState::run(self)
    }

    fn exit(&mut self) -> Result<(), MimicError> {
        MimicState::exit(self)
    }

    fn check_transition(&self) -> Option<String> {
        MimicState::check_transition(self)
    }
}

impl Drop for MimicState {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take()
            && let Err(e) = worker.stop(self.config.join_timeout())
        {
            warn!(state = %self.id, error = %e, "worker not cleanly stopped on drop");
        }
    }
}

/// Assemble one policy observation (see the module docs for the layout).
pub fn build_observation(
    cursor: &PlaybackCursor,
    anchor: &AnchorAligner,
    articulation: &dyn Articulation,
    robot_orientation: &UnitQuaternion<f32>,
    last_action: &Action,
) -> Observation {
    let dof = cursor.clip().num_dof();
    let mut observation = Observation::with_capacity(5 * dof + 6);
    observation.push_term(&motion_command(cursor));
    observation.push_term(&motion_anchor_ori_b(cursor, anchor, robot_orientation));
    observation.push_term(&articulation.joint_positions());
    observation.push_term(&articulation.joint_velocities());
    observation.push_term(&last_action.joint_targets);
    observation
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

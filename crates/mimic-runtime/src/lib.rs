//! `mimic-runtime` – the mimic behavior state and its control loop.
//!
//! # Modules
//!
//! - [`mimic`] – [`MimicState`][mimic::MimicState]: the behavior that tracks a
//!   reference clip.  `enter()` aligns the clip to the robot and starts the
//!   policy worker, `run()` forwards actions to the joints, `exit()` stops the
//!   worker within a bounded timeout.
//! - [`worker`] – [`PolicyWorker`][worker::PolicyWorker]: a fixed-period
//!   background thread with cooperative cancellation and a bounded join.
//! - [`state`] – the [`FsmState`][state::FsmState] contract with the outer
//!   dispatcher.
//! - [`registry`] – [`FsmRegistry`][registry::FsmRegistry]: explicit
//!   `(mode, label) → factory` table built at startup.
//! - [`robot`] – the [`Articulation`][robot::Articulation],
//!   [`Policy`][robot::Policy] and [`JointCommandSink`][robot::JointCommandSink]
//!   collaborator traits.
//! - [`sim`] – in-process implementations of those traits.
//! - [`watchdog`] – heartbeat tracking and the [`FaultLog`][watchdog::FaultLog].
//! - [`config`] – [`MimicConfig`][config::MimicConfig].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console and
//!   optional OTLP tracing.

pub mod config;
pub mod mimic;
pub mod registry;
pub mod robot;
pub mod sim;
pub mod state;
pub mod telemetry;
pub mod watchdog;
pub mod worker;

pub use config::MimicConfig;
pub use mimic::{MimicState, PASSIVE_LABEL, PlaybackStatus, VELOCITY_LABEL, build_observation};
pub use registry::{FsmRegistry, StateFactory};
pub use robot::{Articulation, JointCommandSink, Policy};
pub use state::{FsmState, LifecyclePhase};
pub use telemetry::{TracerProviderGuard, init_tracing};
pub use watchdog::{ComponentHealth, FaultLog, Watchdog};
pub use worker::PolicyWorker;

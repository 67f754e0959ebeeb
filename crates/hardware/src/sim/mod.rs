//! Trace-driven simulation.
//!
//! Provides the trace format and the simulator that runs a trace against the scheduler
//! and the reference backends.

/// Trace-driven simulator.
pub mod simulator;

/// Trace format and loading.
pub mod trace;

pub use simulator::{SimError, SimReport, Simulator};
pub use trace::{Trace, TraceError, TraceOp};

//! # Unit Components
//!
//! This module organizes the unit tests by component: the scheduler stages, the
//! reference backends, configuration, statistics and the trace-driven simulator.

/// Per-lane arbitration and the age-priority encoder.
pub mod scheduler;



/// Oldest-fault selection across lanes and its suppression.
pub mod exception;


/// Commit marking, in-order store release and fences.
pub mod commit;






/// Statistics counters and report rendering.
pub mod stats;

/// Trace loading and end-to-end simulation.
pub mod sim;

//! Cycle model of a unified load/store scheduler.
//!
//! This crate implements the control logic that sits between an out-of-order pipeline and
//! a single-port memory subsystem, with the following:
//! 1. **Core:** The unified operation buffer, per-lane resource arbitration, the translation
//!    retry protocol, oldest-fault selection, branch squash and in-order retirement.
//! 2. **Collaborators:** Translator and memory-backend interfaces plus reference
//!    implementations (page-map translator with a TLB, latency-modelled memory).
//! 3. **Simulation:** A trace-driven pipeline model, configuration and statistics.

/// Common types and constants (addresses, access widths, faults).
pub mod common;
/// Model configuration (defaults and hierarchical config structures).
pub mod config;
/// The scheduler and its micro-operation descriptors.
pub mod core;
/// Trace format and the trace-driven simulator.
pub mod sim;
/// Collaborator interfaces and reference backends.
pub mod soc;
/// Scheduler statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or `Config::from_json`.
pub use crate::config::Config;
/// The scheduler; advance it with `Lsu::tick`.
pub use crate::core::Lsu;
/// Trace-driven simulator wiring the scheduler to the reference backends.
pub use crate::sim::Simulator;

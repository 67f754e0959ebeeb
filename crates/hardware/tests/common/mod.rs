//! Shared test infrastructure.

/// Cycle-by-cycle driver around the scheduler.
pub mod harness;

/// Scripted collaborator doubles.
pub mod mocks;

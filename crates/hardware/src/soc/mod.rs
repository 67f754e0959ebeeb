//! Scheduler Collaborators.
//!
//! This module organizes the agents the scheduler talks to: the interface traits and the
//! reference memory and translation backends used by the simulator and the tests.

/// Reference memory backend.
pub mod memory;

/// Collaborator interface definitions.
pub mod traits;

/// Reference address translator.
pub mod translate;

pub use memory::MemorySystem;
pub use traits::{MemoryBackend, Translator};
pub use translate::PageTranslator;

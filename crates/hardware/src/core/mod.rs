//! Core-side memory pipeline.
//!
//! This module contains the load/store scheduler and the micro-operation descriptors
//! it exchanges with the rest of the out-of-order pipeline.

/// Unified load/store scheduler.
pub mod lsu;

/// Micro-operation descriptors and branch bookkeeping.
pub mod uop;

pub use self::lsu::Lsu;
pub use self::uop::{BranchMask, BranchUpdate, MicroOp};

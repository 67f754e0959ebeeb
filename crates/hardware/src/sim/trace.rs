//! Trace Format and Loading.
//!
//! A trace is a JSON document describing one program run against the scheduler. It
//! contains:
//! 1. **Operations:** The program in order (loads, stores, fences, branches, address-space
//!    fences) with the execute timing of each.
//! 2. **Memory Image:** Values preloaded into the backing store.
//! 3. **Side Traffic:** Secondary-client requests and line releases injected at given cycles.
//!
//! ```json
//! {
//!   "memory": [{ "addr": 4096, "data": 7 }],
//!   "ops": [
//!     { "kind": "store", "addr": 4096, "data": 42 },
//!     { "kind": "branch", "mispredict": true, "resolve_after": 3, "wrong_path": 1 },
//!     { "kind": "load", "addr": 8192 },
//!     { "kind": "load", "addr": 4096, "dst": { "reg": 5, "fp": false } }
//!   ],
//!   "secondary": [{ "cycle": 4, "addr": 4096 }]
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::common::data::{MemWidth, Privilege};
use crate::core::uop::Dest;

/// Error returned when a trace cannot be loaded.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace file could not be read.
    #[error("cannot read trace {path}: {source}")]
    Io {
        /// Path of the trace.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The JSON document does not describe a trace.
    #[error("invalid trace JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// An operation is internally inconsistent.
    #[error("operation {index}: {reason}")]
    Invalid {
        /// Position of the operation in the program.
        index: usize,
        /// What is wrong with it.
        reason: &'static str,
    },
}

const fn one() -> u64 {
    1
}

/// One program operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TraceOp {
    /// A load.
    Load {
        /// Virtual address.
        addr: u64,
        /// Access width.
        #[serde(default)]
        width: MemWidth,
        /// Destination register.
        #[serde(default)]
        dst: Dest,
        /// Cycles after dispatch before the address is computed.
        #[serde(default = "one")]
        delay: u64,
        /// The address computation faults.
        #[serde(default)]
        addr_fault: bool,
        /// The operation arrives with an exception already attached.
        #[serde(default)]
        exception: bool,
    },
    /// A store.
    Store {
        /// Virtual address.
        addr: u64,
        /// Access width.
        #[serde(default)]
        width: MemWidth,
        /// Value stored.
        data: u64,
        /// Cycles after dispatch before the address is computed.
        #[serde(default = "one")]
        delay: u64,
        /// Cycles after dispatch before the data is ready; absent sends it with the address.
        #[serde(default)]
        data_delay: Option<u64>,
        /// The address computation faults.
        #[serde(default)]
        addr_fault: bool,
        /// The operation arrives with an exception already attached.
        #[serde(default)]
        exception: bool,
    },
    /// An ordering fence.
    Fence,
    /// A conditional branch.
    Branch {
        /// The prediction was wrong.
        #[serde(default)]
        mispredict: bool,
        /// Cycles after dispatch before the branch resolves.
        #[serde(default = "one")]
        resolve_after: u64,
        /// Operations following the branch that lie on the wrong path.
        #[serde(default)]
        wrong_path: usize,
    },
    /// An address-space fence.
    Sfence {
        /// Restrict the flush to this address.
        #[serde(default)]
        addr: Option<u64>,
        /// Cycles after dispatch before the fence executes.
        #[serde(default = "one")]
        delay: u64,
    },
}

impl TraceOp {
    /// True for operations that occupy an operation-buffer slot.
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Store { .. } | Self::Fence)
    }
}

/// A value preloaded into memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MemInit {
    /// Physical address.
    pub addr: u64,
    /// Width of the value.
    #[serde(default)]
    pub width: MemWidth,
    /// Value.
    pub data: u64,
}

/// A secondary-client request injected from a given cycle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SecondaryEvent {
    /// First cycle the request is offered.
    pub cycle: u64,
    /// Virtual address.
    pub addr: u64,
    /// Write instead of read.
    #[serde(default)]
    pub write: bool,
    /// Access width.
    #[serde(default)]
    pub width: MemWidth,
    /// Write data.
    #[serde(default)]
    pub data: u64,
}

/// A line release raised by the memory backend from a given cycle on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReleaseEvent {
    /// First cycle the release is raised.
    pub cycle: u64,
    /// Any address within the line.
    pub addr: u64,
}

/// A complete trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Trace {
    /// Privilege context of every translation.
    pub privilege: Privilege,
    /// Initial memory image.
    pub memory: Vec<MemInit>,
    /// The program, in order.
    pub ops: Vec<TraceOp>,
    /// Secondary-client requests, ordered by cycle.
    pub secondary: Vec<SecondaryEvent>,
    /// Line releases, ordered by cycle.
    pub releases: Vec<ReleaseEvent>,
}

impl Trace {
    /// Parses and checks a trace.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Parse`] for malformed JSON and [`TraceError::Invalid`] for an
    /// inconsistent operation.
    pub fn from_json(json: &str) -> Result<Self, TraceError> {
        let mut trace: Self = serde_json::from_str(json)?;
        trace.secondary.sort_by_key(|e| e.cycle);
        trace.releases.sort_by_key(|e| e.cycle);
        trace.validate()?;
        Ok(trace)
    }

    /// Reads a trace from a file.
    ///
    /// # Errors
    ///
    /// Returns [`TraceError::Io`] if the file cannot be read, otherwise as [`Self::from_json`].
    pub fn load(path: &Path) -> Result<Self, TraceError> {
        let json = fs::read_to_string(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    fn validate(&self) -> Result<(), TraceError> {
        for (index, op) in self.ops.iter().enumerate() {
            match op {
                TraceOp::Branch {
                    mispredict,
                    resolve_after,
                    wrong_path,
                } => {
                    if *resolve_after == 0 {
                        return Err(TraceError::Invalid {
                            index,
                            reason: "a branch cannot resolve in its dispatch cycle",
                        });
                    }
                    if !mispredict && *wrong_path != 0 {
                        return Err(TraceError::Invalid {
                            index,
                            reason: "a correctly predicted branch has no wrong path",
                        });
                    }
                    if index + wrong_path >= self.ops.len() {
                        return Err(TraceError::Invalid {
                            index,
                            reason: "wrong path runs past the end of the program",
                        });
                    }
                }
                TraceOp::Store {
                    delay,
                    data_delay: Some(data_delay),
                    ..
                } if *delay == 0 || *data_delay == 0 => {
                    return Err(TraceError::Invalid {
                        index,
                        reason: "execution cannot start in the dispatch cycle",
                    });
                }
                TraceOp::Load { delay: 0, .. }
                | TraceOp::Store { delay: 0, .. }
                | TraceOp::Sfence { delay: 0, .. } => {
                    return Err(TraceError::Invalid {
                        index,
                        reason: "execution cannot start in the dispatch cycle",
                    });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

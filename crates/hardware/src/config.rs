//! Configuration system for the load/store scheduler model.
//!
//! This module defines all configuration structures used to parameterize the model.
//! It provides:
//! 1. **Defaults:** Baseline structure sizes and backend timings.
//! 2. **Structures:** Hierarchical config for the scheduler, the memory backend and the translator.
//! 3. **Validation:** Rejection of configurations the hardware cannot realise.
//!
//! Configuration is supplied as JSON (`Config::from_json`) or built with `Config::default()`.

use serde::Deserialize;

use crate::common::constants::MAX_LANES;
use crate::common::error::ConfigError;

/// Default configuration constants for the model.
mod defaults {
    /// Number of parallel memory lanes.
    pub const LANES: usize = 1;

    /// Slots in the unified operation buffer.
    ///
    /// One slot is always kept free to distinguish full from empty.
    pub const BUFFER_ENTRIES: usize = 16;

    /// Maximum live loads.
    pub const LDQ_ENTRIES: usize = 8;

    /// Maximum live stores (including fences).
    pub const STQ_ENTRIES: usize = 8;

    /// Operations dispatch may offer per cycle.
    pub const DISPATCH_WIDTH: usize = 2;

    /// Operations the pipeline may commit per cycle.
    pub const COMMIT_WIDTH: usize = 2;

    /// Reorder buffer size used to compute program-order age.
    pub const ROB_ENTRIES: usize = 32;

    /// Memory backend response latency in cycles.
    pub const MEM_LATENCY: u64 = 2;

    /// TLB entry count.
    pub const TLB_ENTRIES: usize = 32;

    /// Cycles for a page walk to fill the TLB after a miss.
    pub const MISS_LATENCY: u64 = 4;

    /// Outstanding page walks the translator can track.
    pub const MISS_QUEUE_ENTRIES: usize = 2;
}

/// Root configuration structure containing all model settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use lsqsim_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.lsu.lanes, 1);
/// assert!(config.validate().is_ok());
/// ```
///
/// Deserializing from JSON:
///
/// ```
/// use lsqsim_core::config::Config;
///
/// let json = r#"{
///     "lsu": { "lanes": 2, "buffer_entries": 8, "ldq_entries": 4, "stq_entries": 4 },
///     "memory": { "latency": 3, "nack_every": 5 },
///     "translator": { "bare": false, "miss_latency": 6 }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.lsu.lanes, 2);
/// assert_eq!(config.lsu.commit_width, 2);
/// assert_eq!(config.memory.nack_every, 5);
/// assert!(!config.translator.bare);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Scheduler structure sizes and widths.
    pub lsu: LsuConfig,
    /// Reference memory backend behaviour.
    pub memory: MemoryConfig,
    /// Reference translator behaviour.
    pub translator: TranslatorConfig,
}

impl Config {
    /// Parses and validates a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and the matching
    /// validation error for unrealisable parameters.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes realisable hardware.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.lsu.validate()?;
        if self.translator.tlb_entries == 0 {
            return Err(ConfigError::Zero("translator.tlb_entries"));
        }
        if self.translator.miss_queue_entries == 0 {
            return Err(ConfigError::Zero("translator.miss_queue_entries"));
        }
        Ok(())
    }
}

/// Load/store scheduler parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LsuConfig {
    /// Number of parallel lanes (1 or 2).
    pub lanes: usize,
    /// Slots in the unified circular operation buffer.
    pub buffer_entries: usize,
    /// Maximum number of live loads (load window).
    pub ldq_entries: usize,
    /// Maximum number of live stores and fences (store window).
    pub stq_entries: usize,
    /// Operations dispatch may offer per cycle.
    pub dispatch_width: usize,
    /// Operations the pipeline may commit per cycle.
    pub commit_width: usize,
    /// Reorder buffer size; program-order indices are taken modulo this value.
    pub rob_entries: usize,
}

impl Default for LsuConfig {
    fn default() -> Self {
        Self {
            lanes: defaults::LANES,
            buffer_entries: defaults::BUFFER_ENTRIES,
            ldq_entries: defaults::LDQ_ENTRIES,
            stq_entries: defaults::STQ_ENTRIES,
            dispatch_width: defaults::DISPATCH_WIDTH,
            commit_width: defaults::COMMIT_WIDTH,
            rob_entries: defaults::ROB_ENTRIES,
        }
    }
}

impl LsuConfig {
    /// Checks the scheduler parameters.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lanes == 0 || self.lanes > MAX_LANES {
            return Err(ConfigError::Lanes(self.lanes));
        }
        if self.buffer_entries < 2 {
            return Err(ConfigError::BufferTooSmall(self.buffer_entries));
        }
        let usable = self.buffer_entries - 1;
        if self.ldq_entries == 0 || self.ldq_entries > usable {
            return Err(ConfigError::Window {
                name: "load",
                entries: self.ldq_entries,
                capacity: self.buffer_entries,
            });
        }
        if self.stq_entries == 0 || self.stq_entries > usable {
            return Err(ConfigError::Window {
                name: "store",
                entries: self.stq_entries,
                capacity: self.buffer_entries,
            });
        }
        if self.dispatch_width == 0 {
            return Err(ConfigError::Zero("lsu.dispatch_width"));
        }
        if self.commit_width == 0 {
            return Err(ConfigError::Zero("lsu.commit_width"));
        }
        if self.rob_entries == 0 {
            return Err(ConfigError::Zero("lsu.rob_entries"));
        }
        Ok(())
    }
}

/// Reference memory backend parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Cycles between accepting a request and responding to it (minimum 1).
    pub latency: u64,
    /// Nack every Nth accepted request (0 disables nack injection).
    pub nack_every: u64,
    /// Add a deterministic per-request jitter so responses return out of issue order.
    pub reorder: bool,
    /// Report the request channel busy every Nth cycle (0 keeps it always ready).
    pub busy_every: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            latency: defaults::MEM_LATENCY,
            nack_every: 0,
            reorder: false,
            busy_every: 0,
        }
    }
}

/// Inclusive-exclusive physical address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AddrRange {
    /// First byte of the range.
    pub base: u64,
    /// Size in bytes.
    pub size: u64,
}

impl AddrRange {
    /// Returns true if `addr` lies inside the range.
    pub const fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr - self.base < self.size
    }
}

/// One virtual-to-physical page mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageMapping {
    /// Virtual page number.
    pub vpn: u64,
    /// Physical page number.
    pub ppn: u64,
    /// Loads permitted.
    #[serde(default = "PageMapping::yes")]
    pub readable: bool,
    /// Stores permitted.
    #[serde(default = "PageMapping::yes")]
    pub writable: bool,
    /// Accessible from user mode.
    #[serde(default = "PageMapping::yes")]
    pub user: bool,
}

impl PageMapping {
    const fn yes() -> bool {
        true
    }
}

/// Reference translator parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Bare mode: every address translates to itself and never misses.
    pub bare: bool,
    /// TLB entry count (rounded up to a power of two).
    pub tlb_entries: usize,
    /// Cycles a page walk takes before the TLB is filled.
    pub miss_latency: u64,
    /// Outstanding walks the miss queue can hold.
    pub miss_queue_entries: usize,
    /// Page table used when not in bare mode.
    pub pages: Vec<PageMapping>,
    /// Physical ranges that are uncacheable (device memory).
    pub uncacheable: Vec<AddrRange>,
    /// Physical ranges that raise access faults.
    pub inaccessible: Vec<AddrRange>,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            bare: true,
            tlb_entries: defaults::TLB_ENTRIES,
            miss_latency: defaults::MISS_LATENCY,
            miss_queue_entries: defaults::MISS_QUEUE_ENTRIES,
            pages: Vec::new(),
            uncacheable: Vec::new(),
            inaccessible: Vec::new(),
        }
    }
}

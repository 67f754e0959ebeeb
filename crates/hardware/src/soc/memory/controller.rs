//! Memory controller implementations for latency modeling.
//!
//! This module provides:
//! 1. **SimpleController:** Fixed latency per access.
//! 2. **JitterController:** Fixed latency plus a deterministic per-access jitter, so that
//!    back-to-back requests can complete out of issue order.

/// Trait for memory controller implementations that report access latency in cycles.
pub trait MemoryController: std::fmt::Debug {
    /// Returns the number of cycles required for an access to the given address.
    ///
    /// # Arguments
    ///
    /// * `addr` - Physical address being accessed.
    ///
    /// # Returns
    ///
    /// Latency in simulation cycles (at least 1).
    fn access_latency(&mut self, addr: u64) -> u64;
}

/// Fixed-latency memory controller; every access takes the same number of cycles.
#[derive(Clone, Copy, Debug)]
pub struct SimpleController {
    latency: u64,
}

impl SimpleController {
    /// Creates a simple controller with the given fixed latency in cycles.
    ///
    /// # Arguments
    ///
    /// * `latency` - Cycles per access; clamped to at least 1.
    pub fn new(latency: u64) -> Self {
        Self {
            latency: latency.max(1),
        }
    }
}

impl MemoryController for SimpleController {
    fn access_latency(&mut self, _addr: u64) -> u64 {
        self.latency
    }
}

/// Fixed latency plus a pseudo-random jitter of up to `spread` cycles.
///
/// The jitter sequence is a xorshift stream seeded at construction, so runs are
/// reproducible.
#[derive(Clone, Copy, Debug)]
pub struct JitterController {
    base: u64,
    spread: u64,
    state: u64,
}

impl JitterController {
    /// Default xorshift seed.
    pub const SEED: u64 = 0x9E37_79B9_7F4A_7C15;

    /// Creates a jittering controller.
    ///
    /// # Arguments
    ///
    /// * `base` - Minimum latency; clamped to at least 1.
    /// * `spread` - Largest extra delay added to an access.
    pub fn new(base: u64, spread: u64) -> Self {
        Self {
            base: base.max(1),
            spread,
            state: Self::SEED,
        }
    }

    fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

impl MemoryController for JitterController {
    fn access_latency(&mut self, addr: u64) -> u64 {
        let jitter = (self.next() ^ (addr >> 3)) % (self.spread + 1);
        self.base + jitter
    }
}

//! Scheduler statistics collection and reporting.
//!
//! This module tracks performance metrics of the load/store scheduler. It provides:
//! 1. **Arbitration:** Fire counts per candidate class.
//! 2. **Translation:** Requests, misses and faults.
//! 3. **Memory:** Requests, nacks by kind, kills and stale responses.
//! 4. **Occupancy:** Dispatch stalls, full cycles, squashes, flushes and retirements.

use std::fmt::Write as _;
use std::time::Instant;

use crate::core::lsu::scheduler::FireClass;

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"arbiter"`, `"translation"`, `"memory"`, `"buffer"`.
/// Pass an empty slice to `print_sections` to print all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "arbiter", "translation", "memory", "buffer"];

/// Scheduler statistics.
#[derive(Clone, Debug)]
pub struct LsuStats {
    start_time: Instant,
    /// Cycles ticked.
    pub cycles: u64,
    fires: [u64; FireClass::PRIORITY.len()],

    /// Loads accepted by dispatch.
    pub dispatched_loads: u64,
    /// Stores and fences accepted by dispatch.
    pub dispatched_stores: u64,
    /// Operations refused because the buffer or a window was full.
    pub dispatch_stalls: u64,
    /// Operations skipped because they already carried an exception.
    pub dispatch_skipped: u64,
    /// Cycles that ended with the buffer full.
    pub full_cycles: u64,

    /// Translation requests issued.
    pub translations: u64,
    /// Translations that missed.
    pub tlb_misses: u64,
    /// Faults latched from translation or alignment checks.
    pub faults_latched: u64,
    /// Faults exposed to the pipeline.
    pub faults_exposed: u64,

    /// Requests sent to the memory backend.
    pub mem_requests: u64,
    /// Incoming loads that could not be sent because the port was busy.
    pub mem_port_busy: u64,
    /// Load results delivered.
    pub load_results: u64,
    /// Nacked loads.
    pub load_nacks: u64,
    /// Nacked stores.
    pub store_nacks: u64,
    /// Nacked secondary requests.
    pub secondary_nacks: u64,
    /// Kill lines asserted.
    pub kills: u64,
    /// Responses or nacks that no longer matched their slot.
    pub stale_responses: u64,
    /// Completed secondary transactions.
    pub secondary_completed: u64,

    /// Loads removed at commit.
    pub loads_retired: u64,
    /// Stores released after acknowledgement.
    pub stores_released: u64,
    /// Fences released after the backend reported ordering.
    pub fences_released: u64,
    /// Entries removed by branch squash.
    pub squashed: u64,
    /// Entries removed by exception flushes.
    pub flushed: u64,
}

impl Default for LsuStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            fires: [0; FireClass::PRIORITY.len()],
            dispatched_loads: 0,
            dispatched_stores: 0,
            dispatch_stalls: 0,
            dispatch_skipped: 0,
            full_cycles: 0,
            translations: 0,
            tlb_misses: 0,
            faults_latched: 0,
            faults_exposed: 0,
            mem_requests: 0,
            mem_port_busy: 0,
            load_results: 0,
            load_nacks: 0,
            store_nacks: 0,
            secondary_nacks: 0,
            kills: 0,
            stale_responses: 0,
            secondary_completed: 0,
            loads_retired: 0,
            stores_released: 0,
            fences_released: 0,
            squashed: 0,
            flushed: 0,
        }
    }
}

impl LsuStats {
    /// Counts one firing of `class`.
    pub const fn record_fire(&mut self, class: FireClass) {
        self.fires[class as usize] += 1;
    }

    /// Number of times `class` fired.
    pub const fn fires(&self, class: FireClass) -> u64 {
        self.fires[class as usize]
    }

    /// Total firings across all classes.
    pub fn total_fires(&self) -> u64 {
        self.fires.iter().sum()
    }

    /// Renders the requested sections as text.
    ///
    /// # Arguments
    ///
    /// * `sections` - Section names to include, or empty for all.
    ///
    /// # Returns
    ///
    /// The formatted report.
    pub fn render_sections(&self, sections: &[String]) -> String {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let cyc = self.cycles.max(1) as f64;
        let pct = |n: u64, d: u64| {
            if d == 0 {
                0.0
            } else {
                100.0 * n as f64 / d as f64
            }
        };
        let mut out = String::new();
        let rule = "----------------------------------------------------------";

        // Writing into a String cannot fail.
        let _ = writeln!(out, "\n==========================================================");
        let _ = writeln!(out, "LOAD/STORE SCHEDULER STATISTICS");
        let _ = writeln!(out, "==========================================================");
        if want("summary") {
            let seconds = self.start_time.elapsed().as_secs_f64();
            let _ = writeln!(out, "host_seconds             {seconds:.4} s");
            let _ = writeln!(out, "sim_cycles               {}", self.cycles);
            let _ = writeln!(out, "loads_retired            {}", self.loads_retired);
            let _ = writeln!(out, "stores_released          {}", self.stores_released);
            let _ = writeln!(
                out,
                "mem_ops_per_cycle        {:.4}",
                (self.loads_retired + self.stores_released) as f64 / cyc
            );
            let _ = writeln!(out, "{rule}");
        }
        if want("arbiter") {
            let total = self.total_fires();
            let _ = writeln!(out, "ARBITER");
            for class in FireClass::PRIORITY {
                let n = self.fires(class);
                let _ = writeln!(
                    out,
                    "  fire.{:<20} {} ({:.2}%)",
                    class.name(),
                    n,
                    pct(n, total)
                );
            }
            let _ = writeln!(out, "{rule}");
        }
        if want("translation") {
            let _ = writeln!(out, "TRANSLATION");
            let _ = writeln!(out, "  tlb.requests           {}", self.translations);
            let _ = writeln!(
                out,
                "  tlb.misses             {} ({:.2}%)",
                self.tlb_misses,
                pct(self.tlb_misses, self.translations)
            );
            let _ = writeln!(out, "  faults.latched         {}", self.faults_latched);
            let _ = writeln!(out, "  faults.exposed         {}", self.faults_exposed);
            let _ = writeln!(out, "{rule}");
        }
        if want("memory") {
            let nacks = self.load_nacks + self.store_nacks + self.secondary_nacks;
            let _ = writeln!(out, "MEMORY PORT");
            let _ = writeln!(out, "  mem.requests           {}", self.mem_requests);
            let _ = writeln!(
                out,
                "  mem.nacks              {} ({:.2}%)",
                nacks,
                pct(nacks, self.mem_requests)
            );
            let _ = writeln!(out, "    nack.load            {}", self.load_nacks);
            let _ = writeln!(out, "    nack.store           {}", self.store_nacks);
            let _ = writeln!(out, "    nack.secondary       {}", self.secondary_nacks);
            let _ = writeln!(out, "  mem.port_busy          {}", self.mem_port_busy);
            let _ = writeln!(out, "  mem.kills              {}", self.kills);
            let _ = writeln!(out, "  mem.stale_responses    {}", self.stale_responses);
            let _ = writeln!(out, "  load.results           {}", self.load_results);
            let _ = writeln!(out, "  secondary.completed    {}", self.secondary_completed);
            let _ = writeln!(out, "{rule}");
        }
        if want("buffer") {
            let _ = writeln!(out, "OPERATION BUFFER");
            let _ = writeln!(out, "  dispatch.loads         {}", self.dispatched_loads);
            let _ = writeln!(out, "  dispatch.stores        {}", self.dispatched_stores);
            let _ = writeln!(out, "  dispatch.stalls        {}", self.dispatch_stalls);
            let _ = writeln!(out, "  dispatch.skipped       {}", self.dispatch_skipped);
            let _ = writeln!(
                out,
                "  cycles.full            {} ({:.2}%)",
                self.full_cycles,
                100.0 * self.full_cycles as f64 / cyc
            );
            let _ = writeln!(out, "  squashed               {}", self.squashed);
            let _ = writeln!(out, "  flushed                {}", self.flushed);
            let _ = writeln!(out, "  fences_released        {}", self.fences_released);
        }
        let _ = writeln!(out, "==========================================================");
        out
    }

    /// Prints only the requested statistics sections to stdout.
    ///
    /// # Arguments
    ///
    /// * `sections` - Slice of section names to print, or empty for all.
    pub fn print_sections(&self, sections: &[String]) {
        print!("{}", self.render_sections(sections));
    }

    /// Prints all statistics sections to stdout.
    pub fn print(&self) {
        self.print_sections(&[]);
    }
}

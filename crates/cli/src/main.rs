//! Load/store scheduler simulator CLI.
//!
//! This binary runs traces against the scheduler model. It performs:
//! 1. **Trace run:** Load a JSON trace and an optional JSON configuration, simulate until the
//!    program drains, and print the outcome and the selected statistics sections.
//! 2. **Config check:** Parse and validate a configuration file and print the result.
//!
//! Logging goes through `tracing`; set `RUST_LOG` (e.g. `RUST_LOG=lsqsim_core=debug`) to
//! see per-cycle scheduler activity.

use std::path::{Path, PathBuf};
use std::{fs, process};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use lsqsim_core::config::Config;
use lsqsim_core::sim::{Simulator, Trace};
use lsqsim_core::stats::STATS_SECTIONS;

#[derive(Parser, Debug)]
#[command(
    name = "lsqsim",
    author,
    version,
    about = "Cycle model of a unified load/store scheduler",
    long_about = "Run a JSON trace against the load/store scheduler and the reference memory and translation backends.\n\nExamples:\n  lsqsim run --trace trace.json\n  lsqsim run --trace trace.json --config two_lanes.json --stats summary,arbiter\n  lsqsim check-config two_lanes.json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a trace until it drains.
    Run {
        /// Trace to execute.
        #[arg(short, long)]
        trace: PathBuf,

        /// JSON configuration (defaults are used when absent).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Comma-separated statistics sections to print (empty prints all).
        #[arg(long, value_delimiter = ',')]
        stats: Vec<String>,

        /// Give up after this many cycles.
        #[arg(long, default_value_t = 1_000_000)]
        max_cycles: u64,
    },

    /// Validate a configuration file.
    CheckConfig {
        /// Configuration to check.
        path: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            trace,
            config,
            stats,
            max_cycles,
        } => cmd_run(&trace, config.as_deref(), &stats, max_cycles),
        Commands::CheckConfig { path } => {
            let config = load_config(Some(&path));
            println!("{}: ok ({:?})", path.display(), config.lsu);
        }
    }
}

/// Loads a configuration file, or the defaults when `path` is `None`.
///
/// Exits the process with an error message if the file cannot be read or is rejected.
fn load_config(path: Option<&Path>) -> Config {
    let Some(path) = path else {
        return Config::default();
    };
    let json = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("\n[!] FATAL: Could not read config '{}': {}", path.display(), e);
        process::exit(1);
    });
    let config = Config::from_json(&json).unwrap_or_else(|e| {
        eprintln!("\n[!] FATAL: {}: {}", path.display(), e);
        process::exit(1);
    });
    info!(path = %path.display(), "configuration loaded");
    config
}

/// Runs a trace to completion and prints the outcome and statistics.
fn cmd_run(trace_path: &Path, config_path: Option<&Path>, sections: &[String], max_cycles: u64) {
    if let Some(bad) = sections
        .iter()
        .find(|s| !STATS_SECTIONS.contains(&s.as_str()))
    {
        eprintln!(
            "Error: unknown stats section '{}' (expected one of: {})",
            bad,
            STATS_SECTIONS.join(", ")
        );
        process::exit(2);
    }

    let config = load_config(config_path);
    let trace = Trace::load(trace_path).unwrap_or_else(|e| {
        eprintln!("\n[!] FATAL: {}", e);
        process::exit(1);
    });
    println!(
        "[*] Trace: {}  ops: {}  lanes: {}  buffer: {}",
        trace_path.display(),
        trace.ops.len(),
        config.lsu.lanes,
        config.lsu.buffer_entries
    );

    let mut sim = Simulator::new(&config, trace).unwrap_or_else(|e| {
        eprintln!("\n[!] FATAL: {}", e);
        process::exit(1);
    });

    let code = match sim.run(max_cycles) {
        Ok(report) => {
            println!(
                "\n[*] Finished in {} cycles: {} committed, {} mispredicts, {} exceptions",
                report.cycles,
                report.committed,
                report.mispredicts,
                report.faults.len()
            );
            for load in &report.loads {
                println!("    load #{:<4} = {:#x}", load.op, load.data);
            }
            for fault in &report.faults {
                println!("    exception: {}", fault);
            }
            for resp in &report.secondary {
                println!("    secondary {:#x} = {:#x}", resp.addr.val(), resp.data);
            }
            0
        }
        Err(e) => {
            eprintln!("\n[!] {}", e);
            1
        }
    };
    sim.lsu().stats().print_sections(sections);
    process::exit(code);
}

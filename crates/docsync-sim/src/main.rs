//! Multi-peer scenario runner (native).
//!
//! Replays a JSON scenario against in-memory stores and a message bus, then
//! prints every store and each peer's final view as JSON.

mod scenario;

use clap::Parser;
use scenario::Scenario;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(author, version, about)]
struct Args {
    /// Scenario file to replay.
    scenario: PathBuf,
    /// Flush and poll every peer after each step instead of only on `sync`.
    #[arg(long)]
    sync_every_step: bool,
    /// Print only the stores, not the peers.
    #[arg(long)]
    stores_only: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();
    log::info!("Replaying {}", args.scenario.display());

    let result = Scenario::load(&args.scenario)
        .and_then(|scenario| pollster::block_on(scenario::run(scenario, args.sync_every_step)));
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let output = if args.stores_only {
        serde_json::to_string_pretty(&report.stores)
    } else {
        serde_json::to_string_pretty(&report)
    };
    match output {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to encode report: {e}");
            ExitCode::FAILURE
        }
    }
}

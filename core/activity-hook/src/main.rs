//! activity-hook: records agent tool and subagent events for the host.
//!
//! The host spawns one process per event and pipes the event JSON to stdin.
//! `handle` always exits 0: it is instrumentation, never a gate.
//!
//! ## Subcommands
//!
//! - `handle`: Main hook handler, reads JSON from stdin
//! - `list`: Print the active-session registry
//! - `prune`: Drop registry entries whose stop event never arrived

mod handle;
mod logging;
mod sessions;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "activity-hook")]
#[command(about = "Agent activity recorder")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Handle a hook event (reads JSON from stdin)
    Handle,

    /// Print currently active background sessions
    List {
        /// Print the raw registry document
        #[arg(long)]
        json: bool,
    },

    /// Remove orphaned sessions that started too long ago
    Prune {
        /// Age in minutes beyond which an entry is considered orphaned
        #[arg(long, value_name = "MINUTES")]
        older_than: u32,
    },
}

fn main() {
    let _logging_guard = logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Handle => match handle::run() {
            Ok(outcome) => tracing::debug!(outcome = ?outcome, "activity-hook handle done"),
            // Never surface failures to the host; the log is advisory.
            Err(e) => tracing::warn!(error = %e, "activity-hook handle failed"),
        },
        Commands::List { json } => {
            if let Err(e) = sessions::list(json) {
                tracing::error!(error = %e, "activity-hook list failed");
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        Commands::Prune { older_than } => {
            if let Err(e) = sessions::prune(older_than) {
                tracing::error!(error = %e, "activity-hook prune failed");
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

//! # tether - Host Shell
//!
//! The main binary for tethered store-backed mappings.
//!
//! Commands are read from a script file, a `-c` string, or stdin, and run
//! against one in-process namespace:
//!
//! ```text
//! bind -d db/redb -f /tmp/t.db store
//! store[a]=1
//! store[a]
//! keys store
//! unbind store
//! ```
//!
//! The process exits 0 when the final command succeeded, 1 otherwise;
//! failed commands report on stderr and processing continues.

mod cli;
mod config;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Initialize tracing. TETHER_LOG_FORMAT=json enables machine-parseable
    // output.
    let log_format = std::env::var("TETHER_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tether=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    match cli::execute(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

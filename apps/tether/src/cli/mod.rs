//! # Tether CLI Module
//!
//! Binary arguments plus the dispatch into the command interpreter.
//!
//! ## Host commands
//!
//! - `bind -d <backend> -f <path> [-r] <name>` - bind a mapping to a store
//! - `unbind [-u] <name>...` - unbind one or more mappings
//! - `<name>[<key>]` / `<name>[<key>]=<value>` - per-key access
//! - `unset <name>[<key>]` - delete one key
//! - `keys <name>` - enumerate a mapping
//! - `replace <name> [<key>=<value>]...` - bulk replace
//! - `vars` - list variables

mod commands;

use crate::config::HostConfig;
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use tether_core::TetherError;

pub use commands::Interpreter;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// tether - host shell for store-backed mappings.
///
/// Reads host commands from SCRIPT, from `-c`, or from stdin.
#[derive(Parser, Debug)]
#[command(name = "tether")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long)]
    pub json: bool,

    /// Path to a TOML config file
    #[arg(short = 'C', long)]
    pub config: Option<PathBuf>,

    /// Run a single command string and exit
    #[arg(short = 'c', long)]
    pub command: Option<String>,

    /// Script file of commands, one per line
    pub script: Option<PathBuf>,
}

// =============================================================================
// EXECUTION
// =============================================================================

/// Run the host. Returns whether the final command succeeded; `Err` is
/// reserved for setup failures (config, unreadable script).
pub fn execute(cli: Cli) -> Result<bool, TetherError> {
    let config = match &cli.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::default(),
    };

    let mut interp = Interpreter::new(cli.json, config.default_backend.clone());

    if let Some(command) = &cli.command {
        return Ok(report(&mut interp, command));
    }

    if let Some(script) = &cli.script {
        let text = std::fs::read_to_string(script).map_err(|e| {
            TetherError::Usage(format!("cannot read script {}: {e}", script.display()))
        })?;
        let mut last_ok = true;
        for line in text.lines() {
            last_ok = report(&mut interp, line);
        }
        return Ok(last_ok);
    }

    // Interactive: read commands from stdin.
    if !cli.quiet && !config.quiet {
        print_banner();
    }
    let stdin = std::io::stdin();
    let mut last_ok = true;
    for line in stdin.lock().lines() {
        let line = line.map_err(|e| TetherError::Usage(format!("cannot read stdin: {e}")))?;
        last_ok = report(&mut interp, &line);
    }
    Ok(last_ok)
}

/// Run one line, reporting failure on stderr. Returns success.
fn report(interp: &mut Interpreter, line: &str) -> bool {
    match interp.run_line(line) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("tether: {e}");
            false
        }
    }
}

/// Print the tether startup banner.
fn print_banner() {
    println!(
        "tether v{} (type `bind -d db/redb -f FILE NAME` to start)",
        env!("CARGO_PKG_VERSION")
    );
}

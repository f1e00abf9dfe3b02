//! # Host Command Interpreter
//!
//! Executes one command line at a time against a single namespace. The
//! `bind`/`unbind` surfaces parse their flags with clap, so `bind --help`
//! works inside a script the same way it does on a normal command line.

use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tether_core::{AccessMode, Namespace, REDB_BACKEND, TetherError};

// =============================================================================
// COMMAND ARGUMENTS
// =============================================================================

/// Bind a mapping to a store resource.
#[derive(Parser, Debug)]
#[command(name = "bind")]
struct BindArgs {
    /// Backend type identifier
    #[arg(short = 'd', value_name = "BACKEND")]
    backend: Option<String>,

    /// Path to the store resource
    #[arg(short = 'f', value_name = "PATH")]
    file: Option<PathBuf>,

    /// Open read-only (the binding refuses writes)
    #[arg(short = 'r')]
    read_only: bool,

    /// Name for the bound mapping
    name: String,
}

/// Unbind one or more mappings.
#[derive(Parser, Debug)]
#[command(name = "unbind")]
struct UnbindArgs {
    /// Clear read-only protection before unbinding
    #[arg(short = 'u')]
    unprotect: bool,

    /// Names to unbind
    #[arg(required = true)]
    names: Vec<String>,
}

// =============================================================================
// INTERPRETER
// =============================================================================

/// Line-at-a-time command interpreter over one namespace.
pub struct Interpreter {
    namespace: Namespace,
    json: bool,
    default_backend: Option<String>,
}

impl Interpreter {
    /// New interpreter with an empty namespace.
    #[must_use]
    pub fn new(json: bool, default_backend: Option<String>) -> Self {
        Self {
            namespace: Namespace::new(),
            json,
            default_backend,
        }
    }

    /// Execute one command line. Blank lines and `#` comments are ignored.
    pub fn run_line(&mut self, line: &str) -> Result<(), TetherError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0] {
            "bind" => self.cmd_bind(&tokens),
            "unbind" => self.cmd_unbind(&tokens),
            "unset" => self.cmd_unset(&tokens),
            "keys" => self.cmd_keys(&tokens),
            "replace" => self.cmd_replace(&tokens),
            "vars" => self.cmd_vars(),
            _ => self.cmd_access(line),
        }
    }

    // =========================================================================
    // BIND / UNBIND
    // =========================================================================

    fn cmd_bind(&mut self, tokens: &[&str]) -> Result<(), TetherError> {
        let args =
            BindArgs::try_parse_from(tokens).map_err(|e| TetherError::Usage(e.to_string()))?;

        let backend = match args.backend.or_else(|| self.default_backend.clone()) {
            Some(backend) => backend,
            None => {
                return Err(TetherError::Usage(format!(
                    "you must pass `-d {REDB_BACKEND}'"
                )));
            }
        };
        let Some(file) = args.file else {
            return Err(TetherError::Usage(
                "you must pass `-f' with a filename".to_string(),
            ));
        };
        let mode = if args.read_only {
            AccessMode::ReadOnly
        } else {
            AccessMode::ReadWriteCreate
        };

        self.namespace.bind(&backend, &file, mode, &args.name)
    }

    fn cmd_unbind(&mut self, tokens: &[&str]) -> Result<(), TetherError> {
        let args =
            UnbindArgs::try_parse_from(tokens).map_err(|e| TetherError::Usage(e.to_string()))?;
        let names: Vec<&str> = args.names.iter().map(String::as_str).collect();

        let outcome = self.namespace.unbind(&names, args.unprotect);
        for (name, error) in outcome.failures() {
            eprintln!("tether: unbind {name}: {error}");
        }
        match outcome.into_failures().into_iter().next() {
            None => Ok(()),
            Some((_, error)) => Err(error),
        }
    }

    // =========================================================================
    // PER-KEY ACCESS
    // =========================================================================

    /// `name[key]` reads, `name[key]=value` writes. The value extends to
    /// the end of the line, so it may contain spaces.
    fn cmd_access(&mut self, line: &str) -> Result<(), TetherError> {
        let (name, key, tail) = split_subscript(line)?;
        if tail.is_empty() {
            let value = self.namespace.get(name, key)?;
            if self.json {
                println!("{}", serde_json::json!({ "key": key, "value": value }));
            } else {
                println!("{value}");
            }
            Ok(())
        } else if let Some(value) = tail.strip_prefix('=') {
            self.namespace.set(name, key, Some(value))
        } else {
            Err(TetherError::Usage(format!("unrecognized command: {line}")))
        }
    }

    fn cmd_unset(&mut self, tokens: &[&str]) -> Result<(), TetherError> {
        let [_, subscript] = tokens else {
            return Err(TetherError::Usage(
                "usage: unset <name>[<key>]".to_string(),
            ));
        };
        let (name, key, tail) = split_subscript(subscript)?;
        if !tail.is_empty() {
            return Err(TetherError::Usage(
                "usage: unset <name>[<key>]".to_string(),
            ));
        }
        self.namespace.set(name, key, None)
    }

    // =========================================================================
    // ENUMERATION / BULK REPLACE / LISTING
    // =========================================================================

    fn cmd_keys(&mut self, tokens: &[&str]) -> Result<(), TetherError> {
        let [_, name] = tokens else {
            return Err(TetherError::Usage("usage: keys <name>".to_string()));
        };
        let mut entries = BTreeMap::new();
        self.namespace.enumerate(name, |key, value| {
            entries.insert(key.to_string(), value.to_string());
        })?;
        if self.json {
            println!(
                "{}",
                serde_json::to_string(&entries)
                    .map_err(|e| TetherError::Usage(e.to_string()))?
            );
        } else {
            for (key, value) in &entries {
                println!("{key}={value}");
            }
        }
        Ok(())
    }

    fn cmd_replace(&mut self, tokens: &[&str]) -> Result<(), TetherError> {
        let [_, name, pairs @ ..] = tokens else {
            return Err(TetherError::Usage(
                "usage: replace <name> [<key>=<value>]...".to_string(),
            ));
        };
        let mut entries = BTreeMap::new();
        for pair in pairs {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(TetherError::Usage(format!(
                    "replace: `{pair}' is not <key>=<value>"
                )));
            };
            entries.insert(key.to_string(), value.to_string());
        }
        self.namespace.replace(name, entries)
    }

    fn cmd_vars(&mut self) -> Result<(), TetherError> {
        if self.json {
            let listing: BTreeMap<&str, &str> = self
                .namespace
                .variables()
                .map(|(name, var)| (name, var.kind()))
                .collect();
            println!(
                "{}",
                serde_json::to_string(&listing)
                    .map_err(|e| TetherError::Usage(e.to_string()))?
            );
        } else {
            for (name, var) in self.namespace.variables() {
                println!("{name}\t{}", var.kind());
            }
        }
        Ok(())
    }
}

/// Split `name[key]` into name, key, and whatever follows the `]`.
fn split_subscript(input: &str) -> Result<(&str, &str, &str), TetherError> {
    let Some(open) = input.find('[') else {
        return Err(TetherError::Usage(format!(
            "unrecognized command: {input}"
        )));
    };
    let Some(close) = input[open..].find(']').map(|i| open + i) else {
        return Err(TetherError::Usage(format!("missing `]': {input}")));
    };
    let name = &input[..open];
    if name.is_empty() {
        return Err(TetherError::Usage(format!(
            "unrecognized command: {input}"
        )));
    }
    Ok((name, &input[open + 1..close], &input[close + 1..]))
}

// =============================================================================
// TESTS
// =============================================================================

//! RuneDB CLI
//!
//! Command-line tools for RuneDB database files.
//!
//! # Commands
//!
//! - `inspect` - Display stores, counts, and file metadata
//! - `export` - Write the root document as JSON
//! - `import` - Load a JSON document into a database
//! - `genkey` - Derive an encryption key from a secret
//! - `rekey` - Re-encrypt a database with another key, or decrypt it

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// RuneDB command-line database tools.
#[derive(Parser)]
#[command(name = "runedb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the database files
    #[arg(global = true, short, long, default_value = ".")]
    dir: PathBuf,

    /// Database name (the file is `<dir>/<name>.runedb`)
    #[arg(global = true, short, long)]
    name: Option<String>,

    /// Encryption key as 64 hex digits
    #[arg(global = true, short, long)]
    key: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display stores, counts, and file metadata
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Write the root document as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Replace reference markers with the values they point to
        #[arg(short, long)]
        evaluate: bool,
    },

    /// Load a JSON document into a database, creating it if needed
    Import {
        /// JSON file holding a root document
        input: PathBuf,

        /// Replace the whole root instead of overwriting top-level stores
        #[arg(short, long)]
        replace: bool,
    },

    /// Derive an encryption key from a secret
    Genkey {
        /// The secret to derive from
        secret: String,
    },

    /// Re-encrypt with a new key, or write plaintext
    Rekey {
        /// New key as 64 hex digits
        #[arg(long, conflicts_with = "plaintext", required_unless_present = "plaintext")]
        new_key: Option<String>,

        /// Store the database unencrypted
        #[arg(long)]
        plaintext: bool,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let target = commands::Target {
        dir: cli.dir,
        name: cli.name,
        key: cli.key,
    };

    match cli.command {
        Commands::Inspect { format } => commands::inspect::run(&target, &format)?,
        Commands::Export { output, evaluate } => {
            commands::export::run(&target, output.as_deref(), evaluate)?;
        }
        Commands::Import { input, replace } => commands::import::run(&target, &input, replace)?,
        Commands::Genkey { secret } => commands::keys::genkey(&secret)?,
        Commands::Rekey { new_key, plaintext } => {
            let new_key = if plaintext { None } else { new_key };
            commands::keys::rekey(&target, new_key.as_deref())?;
        }
        Commands::Version => {
            println!("RuneDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("RuneDB Core v{}", runedb_core::VERSION);
        }
    }

    Ok(())
}

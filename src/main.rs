//! Rowsmith CLI - persist JSON documents into SQLite through a declared schema

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "rowsmith")]
#[command(version)]
#[command(about = "Persist nested JSON documents into SQLite through a declared schema")]
#[command(long_about = r#"
Rowsmith maps JSON documents onto relational rows:
  • Upsert by identity, generated identities when absent
  • Nested objects persisted and referenced by identity
  • One-to-many and many-to-many relations kept in sync
  • One transaction per import, rolled back on any failure

Example usage:
  rowsmith init-config
  rowsmith init --schema schema.toml --database app.db
  rowsmith import --entity User users.json
  rowsmith import --entity User --path data.users response.json
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    json: bool,

    /// Config file (defaults to ./rowsmith.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Persist a JSON object or array of objects
    Import {
        /// JSON document to import
        file: PathBuf,

        /// Entity type of the top-level object(s)
        #[arg(short, long)]
        entity: String,

        /// Schema file (TOML)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,

        /// Dotted path to the payload inside the document, e.g. `data.users`
        #[arg(short, long)]
        path: Option<String>,

        /// Keep one-to-many members that are no longer listed
        #[arg(long)]
        no_cleanup: bool,

        /// Don't warn about keys without a matching field
        #[arg(long)]
        quiet_unmapped: bool,
    },

    /// Create tables for every mapped entity in the schema
    Init {
        /// Schema file (TOML)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Show the resolved fields of an entity
    Describe {
        /// Entity type to describe
        #[arg(short, long)]
        entity: String,

        /// Schema file (TOML)
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Show row counts for every mapped entity
    Stats {
        /// Schema file (TOML)
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Path to the database file
        #[arg(short, long)]
        database: Option<PathBuf>,
    },

    /// Write a starter rowsmith.toml
    InitConfig {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn is_human(self) -> bool {
        self == OutputMode::Human
    }
}

/// Print a `{"ok": true, ...}` envelope for JSON output
pub fn emit_success(mode: OutputMode, command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}

fn emit_failure(mode: OutputMode, err: &anyhow::Error) {
    match mode {
        OutputMode::Human => rowsmith::ui::error(&format!("{:#}", err)),
        OutputMode::Json => {
            let envelope = serde_json::json!({ "ok": false, "error": format!("{:#}", err) });
            println!("{}", envelope);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output stays parseable
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };

    if let Err(err) = run(cli, mode) {
        emit_failure(mode, &err);
        std::process::exit(1);
    }
}

fn run(cli: Cli, mode: OutputMode) -> anyhow::Result<()> {
    if let Commands::InitConfig { force } = cli.command {
        return commands::run_init_config(mode, cli.config.as_deref(), force);
    }
    let settings = commands::Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Import { file, entity, schema, database, path, no_cleanup, quiet_unmapped } => {
            let mut options = settings.options();
            if no_cleanup {
                options = options.disable_foreign_collection_cleanup();
            }
            if quiet_unmapped {
                options = options.disable_unmapped_key_warnings();
            }
            let request = commands::ImportRequest {
                file,
                entity,
                path,
                schema: settings.schema(schema)?,
                database: settings.database(database),
                options,
            };
            commands::run_import(mode, &request)
        }
        Commands::Init { schema, database } => {
            commands::run_init(mode, &settings.schema(schema)?, &settings.database(database))
        }
        Commands::Describe { entity, schema } => {
            commands::run_describe(mode, &settings.schema(schema)?, &entity)
        }
        Commands::Stats { schema, database } => {
            commands::run_stats(mode, &settings.schema(schema)?, &settings.database(database))
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

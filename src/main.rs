//! # Intake Harness CLI (`intake`)
//!
//! The `intake` binary is the primary interface for Intake Harness. It
//! provides commands for database initialization, content submission,
//! status inspection, extractor listing, and starting the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! intake --config ./config/intake.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `intake init` | Create the SQLite database and run schema migrations |
//! | `intake submit <file>` | Run one file through the intake pipeline |
//! | `intake status <id>` | Show an ingestion's status snapshot |
//! | `intake extractors` | List registered content extractors |
//! | `intake serve` | Start the intake HTTP server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use intake_harness::{config, db, extractor, pipeline, server, status};

/// Intake Harness — a local-first content intake pipeline for AI note
/// vaults.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/intake.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "intake",
    about = "Intake Harness — a local-first content intake pipeline for AI note vaults",
    version,
    long_about = "Intake Harness carries raw incoming content (messages, uploaded files, vault \
    notes) through a fixed pipeline — store, extract, normalize, anchor — tracking each \
    submission's lifecycle and notifying registered hooks as stages complete."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/intake.toml`. Database, object store,
    /// extractor, and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/intake.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and object store directory.
    ///
    /// Creates the SQLite database file and all required tables
    /// (ingestions, notes). Idempotent — running it multiple times is safe.
    Init,

    /// Submit a file to the intake pipeline.
    ///
    /// Creates an ingestion record, runs the stage sequence to completion,
    /// and prints the record id and terminal status. Exits nonzero when the
    /// ingestion fails; the failed record remains queryable via `status`.
    Submit {
        /// Path to the file to ingest.
        file: PathBuf,

        /// Origin tag recorded on the ingestion (e.g. a channel name).
        #[arg(long, default_value = "upload")]
        source_type: String,

        /// Optional provenance URI recorded on the ingestion.
        #[arg(long)]
        source_uri: Option<String>,

        /// Optional submitting actor recorded on the ingestion.
        #[arg(long)]
        source_actor: Option<String>,

        /// Content mime type. Inferred from the file extension when omitted.
        #[arg(long)]
        mime_type: Option<String>,
    },

    /// Show an ingestion's status snapshot.
    ///
    /// Prints the record's status and, for failed ingestions, the captured
    /// error. Exits nonzero when no record with that id exists.
    Status {
        /// Ingestion id (UUID).
        id: String,
    },

    /// List registered content extractors.
    ///
    /// Shows each built-in extractor enabled in the config with its
    /// description, in registration (dispatch) order.
    Extractors,

    /// Start the intake HTTP server.
    ///
    /// Binds to the address configured in `[server].bind` and exposes
    /// `POST /ingestions`, `GET /ingestions/{id}`, and `GET /health`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            db::run_migrations(&pool).await?;
            pool.close().await;
            std::fs::create_dir_all(&cfg.objects.root)?;
            println!("Database initialized successfully.");
        }
        Commands::Submit {
            file,
            source_type,
            source_uri,
            source_actor,
            mime_type,
        } => {
            let payload = std::fs::read(&file)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
            let mime_type = mime_type
                .or_else(|| extractor::mime_for_path(&file).map(|m| m.to_string()));

            let submission = pipeline::Submission {
                source_type,
                source_uri,
                source_actor,
                mime_type,
                payload,
            };
            pipeline::run_submit(&cfg, submission).await?;
        }
        Commands::Status { id } => {
            status::run_status(&cfg, &id).await?;
        }
        Commands::Extractors => {
            let registry = extractor::ExtractorRegistry::from_config(&cfg);
            if registry.is_empty() {
                println!("No extractors enabled.");
            } else {
                println!("Extractors ({}):", registry.len());
                for e in registry.extractors() {
                    println!("  {} — {}", e.id(), e.description());
                }
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

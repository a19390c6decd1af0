//! # paperchunk CLI
//!
//! ## Usage
//!
//! ```bash
//! paperchunk --config ./config/paperchunk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `paperchunk init` | Create the SQLite database and stage folders |
//! | `paperchunk process <file>` | Run one file through the full pipeline |
//! | `paperchunk process-dir <dir>` | Run every matching file in a directory |
//! | `paperchunk chunk <file>` | Chunk a file straight to Parquet (no database) |
//! | `paperchunk inspect <parquet>` | Print a Parquet file's schema and first row |
//! | `paperchunk documents` | List tracked documents |
//! | `paperchunk status <id>` | Show a document's stage |
//! | `paperchunk get <id>` | Show a document's full record |
//! | `paperchunk serve` | Start the REST API |
//!
//! Logs go to stderr and are filtered with `RUST_LOG`
//! (default `paperchunk=info,tower_http=info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use paperchunk::{commands, config, server};

/// paperchunk: word-window chunking of PDF and text documents into Parquet.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. `chunk` and `inspect` also run without one.
#[derive(Parser)]
#[command(
    name = "paperchunk",
    about = "Chunk PDF and text documents into overlapping word windows and write them as Parquet",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/paperchunk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and stage folders.
    ///
    /// Idempotent; running it again is safe.
    Init,

    /// Process one file through upload, staging, chunking and Parquet output.
    Process {
        /// Path to a `.pdf` or `.txt` file.
        file: PathBuf,

        /// Record the document under this name instead of the file's own.
        #[arg(long)]
        name: Option<String>,
    },

    /// Process every matching file under a directory.
    ///
    /// Files that fail are reported and skipped.
    ProcessDir {
        dir: PathBuf,

        /// Include glob, relative to `dir`. Repeatable.
        /// Defaults to `**/*.pdf` and `**/*.txt`.
        #[arg(long = "glob")]
        globs: Vec<String>,
    },

    /// Chunk a file and write Parquet directly, without the database.
    Chunk {
        file: PathBuf,

        /// Output path. Defaults to the input path with a `.parquet` extension.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Words per chunk (overrides `[chunking].chunk_size`).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Words shared by consecutive chunks (overrides `[chunking].overlap`).
        #[arg(long)]
        overlap: Option<usize>,
    },

    /// Print a Parquet file's row count, columns and first row as JSON.
    Inspect { path: PathBuf },

    /// List tracked documents, newest first.
    Documents {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Show the current stage of a document.
    Status { id: i64 },

    /// Show the full record of a document.
    Get { id: i64 },

    /// Start the REST API on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paperchunk=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Chunk {
            file,
            output,
            chunk_size,
            overlap,
        } => {
            // Defaults only stand in for a missing file, never a broken one
            let cfg = if cli.config.exists() {
                config::load_config(&cli.config)?
            } else {
                config::Config::minimal()
            };
            commands::run_chunk(&cfg, file, output.as_deref(), *chunk_size, *overlap)?;
            return Ok(());
        }
        Commands::Inspect { path } => {
            commands::run_inspect(path)?;
            return Ok(());
        }
        _ => {}
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::run_init(&cfg).await?,
        Commands::Process { file, name } => {
            commands::run_process(&cfg, &file, name.as_deref()).await?
        }
        Commands::ProcessDir { dir, globs } => {
            commands::run_process_dir(&cfg, &dir, &globs).await?
        }
        Commands::Documents { limit } => commands::run_documents(&cfg, limit).await?,
        Commands::Status { id } => commands::run_status(&cfg, id).await?,
        Commands::Get { id } => commands::run_get(&cfg, id).await?,
        Commands::Serve => server::run_server(&cfg).await?,
        // Handled above (before config loading)
        Commands::Chunk { .. } | Commands::Inspect { .. } => unreachable!(),
    }

    Ok(())
}

//! # kitdb
//!
//! Builds the kit database from a project directory.
//!
//! ```bash
//! # Build from ./queries and ./kits into ./kits.db
//! kitdb
//!
//! # Custom layout
//! kitdb --root /srv/library --database dist/kits.db --release 2024.06.01
//!
//! # Roll everything back if any document fails
//! kitdb --atomic
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kitdb::build::{build, readable_size};
use kitdb::{BuildConfig, CommitPolicy, KitDbError};

/// Build the kit database from kit.json and info.json documents
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Project root holding queries/ and kits/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Directory of table definitions [default: <root>/queries]
    #[arg(long)]
    queries: Option<PathBuf>,

    /// Directory scanned for documents [default: <root>/kits]
    #[arg(long)]
    kits: Option<PathBuf>,

    /// Output database file [default: <root>/kits.db]
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Manifest file [default: <root>/manifest.json]
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Release string recorded in the manifest [default: build date]
    #[arg(long)]
    release: Option<String>,

    /// Roll back every loaded document if one fails
    #[arg(long)]
    atomic: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> BuildConfig {
        let mut config = BuildConfig::from_root(&self.root).apply_env();
        if let Some(queries) = self.queries {
            config.queries_dir = queries;
        }
        if let Some(kits) = self.kits {
            config.kit_root = kits;
        }
        if let Some(database) = self.database {
            config.artifact_path = database;
        }
        if let Some(manifest) = self.manifest {
            config.manifest_path = manifest;
        }
        if let Some(release) = self.release {
            config.release = Some(release);
        }
        if self.atomic {
            config.commit_policy = CommitPolicy::Atomic;
        }
        config
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn run(args: Args) -> Result<()> {
    let config = args.into_config();
    info!("Building {}", config.artifact_path.display());

    let report = build(&config)?;
    println!(
        "Built {} with {} kits and {} authors ({}), version {}",
        report.artifact_path.display(),
        report.kits,
        report.authors,
        readable_size(report.artifact_size, 2),
        report.manifest.version
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<KitDbError>() {
                Some(kit_err) => eprintln!("kitdb error [{}]: {}", kit_err.error_code(), kit_err),
                None => eprintln!("kitdb error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

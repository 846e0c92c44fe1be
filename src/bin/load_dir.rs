use anyhow::{Context, Result};
use clap::Parser;
use microbiome_store::{
    duck::Store,
    ingest::{IngestOutcome, TableMaterializer, Upload},
    view::{ViewRefresher, TASK_TABLE},
};
use std::{fs, path::PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Ingest every `.csv` file in a directory, one table per file stem.
#[derive(Parser, Debug)]
#[command(name = "load_dir", about = "Bulk-load a directory of CSV files into the store")]
struct Args {
    /// Directory holding the CSV files
    dir: PathBuf,

    /// DuckDB file, or `:memory:`
    #[arg(long, env = "DATABASE_PATH", default_value = "microbiome.duckdb")]
    database: String,

    /// Refresh `task_table` once everything is loaded
    #[arg(long)]
    refresh: bool,
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let args = Args::parse();
    let store = Store::open_location(&args.database)
        .with_context(|| format!("opening database {}", args.database))?;
    let materializer = TableMaterializer::new(store.clone());

    let mut paths: Vec<PathBuf> = fs::read_dir(&args.dir)
        .with_context(|| format!("reading directory {}", args.dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    paths.sort();

    let (mut loaded, mut failed) = (0usize, 0usize);
    for path in paths {
        let Some(filename) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;

        match materializer.ingest_from_upload(&Upload { filename, bytes }) {
            Ok(IngestOutcome::Materialized(done)) => {
                let total = store.count_rows(&done.table)?;
                info!(table = %done.table, rows = done.rows, total, created = done.created, "loaded");
                loaded += 1;
            }
            Ok(IngestOutcome::Rejected(r)) => {
                warn!(file = %path.display(), "skipped: {}", r.message());
            }
            Err(e) => {
                error!(file = %path.display(), error_type = e.category(), "failed: {}", e);
                failed += 1;
            }
        }
    }

    if args.refresh {
        let rows = ViewRefresher::new(store).refresh(TASK_TABLE)?;
        info!(view = TASK_TABLE, rows, "refreshed");
    }

    info!(loaded, failed, "all done");
    if failed > 0 {
        anyhow::bail!("{} file(s) failed to load", failed);
    }
    Ok(())
}

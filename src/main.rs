use anyhow::{Context, Result};
use clap::Parser;
use microbiome_store::{
    config::{Args, Settings},
    duck::Store,
    server::{self, AppState},
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) settings: file → env/CLI ─────────────────────────────────
    let args = Args::parse();
    let settings = Settings::load(&args)?;

    // ─── 2) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    std::panic::set_hook(Box::new(|info| {
        eprintln!("panic: {:?}", info);
    }));

    // ─── 3) open the shared store ────────────────────────────────────
    let location = settings.database.path.clone();
    let store = tokio::task::spawn_blocking(move || Store::open_location(&location))
        .await?
        .with_context(|| format!("opening database {}", settings.database.path))?;
    info!(database = %store.path().display(), "store ready");

    // ─── 4) serve ────────────────────────────────────────────────────
    let state = AppState::new(store, settings.server.max_upload_bytes);
    let routes = server::routes(state);
    let addr = settings.bind_addr();

    info!("Server starting on {}", addr);
    info!("Upload endpoint: POST http://{}/add/csv", addr);
    info!("Aggregate endpoint: GET http://{}/get-all", addr);

    warp::serve(routes).run(addr).await;

    Ok(())
}

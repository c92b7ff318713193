//! medley-web - personal media tracking service
//!
//! Catalogs books, movies, TV and games from external providers, tracks
//! per-pass progress and ratings, and keeps item, series, and dashboard
//! state consistent through a synchronous status cascade.

use anyhow::Result;
use clap::Parser;
use medley_web::AppState;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "medley-web", about = "Personal media tracking service")]
struct Args {
    /// Data directory holding medley.db (overrides env and TOML config)
    #[arg(long)]
    root_folder: Option<String>,

    /// Listen port
    #[arg(long, env = "MEDLEY_PORT", default_value_t = 5750)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification first, before any database delays
    info!(
        "Starting medley-web v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root_folder = medley_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "MEDLEY_ROOT_FOLDER",
    );
    let db_path = medley_common::config::database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let db_pool = medley_common::db::init_database(&db_path).await?;
    info!("Database connection established");

    let toml_config = medley_common::config::load_toml_config().unwrap_or_default();
    let app_config = medley_web::AppConfig::from_toml(&toml_config);
    let providers = medley_web::config::build_providers(&db_pool, &toml_config).await?;

    let state = AppState::new(db_pool, app_config, providers);
    let app = medley_web::build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    info!("Listening on http://127.0.0.1:{}", args.port);
    info!("Health check: http://127.0.0.1:{}/health", args.port);

    axum::serve(listener, app).await?;

    Ok(())
}

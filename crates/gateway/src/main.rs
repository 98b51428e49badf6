use std::sync::Arc;

use anyhow::Context;
use billboard_gateway::{
    app,
    config::Config,
    services::AdminBootstrap,
    store::Stores,
    AppState,
};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "billboard-gateway",
    version,
    about = "Billboard violation reports API"
)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API (default)
    Serve,
    /// Create the first admin account if none exists
    CreateAdmin {
        #[arg(long, default_value = "admin")]
        username: String,

        #[arg(long, default_value = "admin123")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,billboard_gateway=debug")),
        )
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;
    let stores = Stores::connect(&config).await?;
    info!("Using {} store", stores.backend);

    let state = Arc::new(AppState::new(config, stores));

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(state).await,
        Commands::CreateAdmin { username, password } => create_admin(&state, &username, &password).await,
    }
}

async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    state
        .reports
        .uploads()
        .ensure_dir()
        .await
        .context("failed to create upload directory")?;

    log_report_summary(&state).await?;

    let addr = state.config.bind_addr()?;
    let router = app(Arc::clone(&state));

    info!("Billboard Reports API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

async fn log_report_summary(state: &AppState) -> anyhow::Result<()> {
    let page = state.reports.list(Default::default()).await?;
    info!("Total reports in database: {}", page.total);

    if let Some(latest) = page.reports.first() {
        let preview: String = latest
            .description
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(50)
            .collect();
        info!("Latest report: {} - {}...", latest.id, preview);
    }
    Ok(())
}

async fn create_admin(state: &AppState, username: &str, password: &str) -> anyhow::Result<()> {
    match state.auth.bootstrap_admin(username, password).await? {
        AdminBootstrap::AlreadyPresent(admin) => {
            info!("Admin user already exists: {}", admin.username);
        }
        AdminBootstrap::Created(admin) => {
            info!("Admin user created: {}", admin.username);
            warn!("Change the default admin password after first login");
        }
    }
    Ok(())
}

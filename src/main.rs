use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use release_panel::{
    api,
    config::AppConfig,
    db,
    engine::{Collaborators, ReleaseEngine},
};

#[derive(Parser)]
#[command(name = "rpanel")]
#[command(about = "Release control panel: which tickets ship in which release")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
    /// Print the upcoming releases report as JSON
    Upcoming,
    /// Create a tracker filter for a release range and print its URL
    Filter {
        /// First release of the range
        #[arg(long)]
        start: String,

        /// Last release of the range
        #[arg(long)]
        end: String,
    },
    /// Print the valid manifests as JSON
    Manifests,
}

/// Initialize tracing with output to stderr (for report commands) or stdout
fn init_tracing(use_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "release_panel=debug,tower_http=debug".into()),
    );

    if use_stderr {
        // Report commands print JSON on stdout
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_engine() -> anyhow::Result<ReleaseEngine> {
    let config = AppConfig::from_env();

    let db = match &config.db_path {
        Some(path) => db::Database::open(path.clone())?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;

    let collaborators = Collaborators::from_config(&config, db);
    Ok(ReleaseEngine::new(config, collaborators))
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting release panel server on port {}", port);

    let app = api::create_router(build_engine()?);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!("Release panel listening on http://127.0.0.1:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let use_stderr = !matches!(cli.command, None | Some(Commands::Serve { .. }));
    init_tracing(use_stderr);

    match cli.command {
        Some(Commands::Serve { port }) => serve(port).await?,
        Some(Commands::Upcoming) => {
            let report = build_engine()?.upcoming_releases().await?;
            print_json(&report)?;
        }
        Some(Commands::Filter { start, end }) => {
            let result = build_engine()?.create_release_filter(&start, &end).await?;
            print_json(&result)?;
        }
        Some(Commands::Manifests) => {
            let manifests = build_engine()?.list_manifests().await?;
            print_json(&manifests)?;
        }
        None => serve(3000).await?,
    }

    Ok(())
}

//! recall - conversational memory server

mod config;
mod routes;
mod store;

use anyhow::Context;
use clap::Parser;
use recall_ai::OpenAICompatClient;
use recall_engine::Engine;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// recall - streams chat completions and remembers conversations
#[derive(Parser, Debug)]
#[command(name = "recall")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Model identifier sent to the backend
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible backend
    #[arg(long)]
    base_url: Option<String>,

    /// Messages kept verbatim before older ones are summarized
    #[arg(short, long)]
    window_size: Option<usize>,

    /// Address to listen on
    #[arg(short, long)]
    listen: Option<String>,

    /// Directory for conversation logs
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

impl Args {
    fn apply(self, cfg: &mut config::Config) {
        if let Some(model) = self.model {
            cfg.model = model;
        }
        if let Some(base_url) = self.base_url {
            cfg.base_url = base_url;
        }
        if let Some(window_size) = self.window_size {
            cfg.window_size = window_size;
        }
        if let Some(listen) = self.listen {
            cfg.listen = listen;
        }
        if let Some(data_dir) = self.data_dir {
            cfg.data_dir = Some(data_dir);
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("recall=debug,tower_http=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("recall=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        let path = config::Config::init().context("creating config file")?;
        println!("Config file created at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    // File, then environment, then flags
    let mut cfg = config::Config::load();
    cfg.apply_env();
    args.apply(&mut cfg);

    let backend = Arc::new(OpenAICompatClient::new(cfg.backend_config()?)?);
    let data_dir = cfg.data_dir();
    let log = Arc::new(
        store::JsonlMessageLog::open(&data_dir)
            .with_context(|| format!("opening data dir {}", data_dir.display()))?,
    );
    let engine = Arc::new(Engine::new(cfg.engine_config(), backend, log));

    let app = routes::router(routes::AppState { engine });
    let listener = tokio::net::TcpListener::bind(&cfg.listen)
        .await
        .with_context(|| format!("binding {}", cfg.listen))?;

    info!(
        listen = %cfg.listen,
        model = %cfg.model,
        backend = %cfg.base_url,
        window_size = cfg.window_size,
        "recall listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

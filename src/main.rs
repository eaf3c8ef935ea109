//! hakidgen - Pre-generated media pool served over HTTP
//!
//! Keeps a pool of synthesized audio artifacts ready and hands one out per
//! `GET /pick`.

use anyhow::{Context, Result};
use clap::{builder::FalseyValueParser, Parser, Subcommand};
use hakidgen::{
    config::ServiceConfig,
    generator::{Generator, GoogleGenerator},
    maintenance::{MaintenanceLoop, MaintenanceSettings},
    pool::PoolManager,
    server,
    store::ArtifactStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Parser)]
#[command(name = "hakidgen")]
#[command(author = "A3S Lab Team")]
#[command(version)]
#[command(about = "Pre-generated media pool served over HTTP")]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "HAKIDGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the maintenance loop and the HTTP service (default)
    Serve,

    /// Show the effective configuration with credentials masked
    Config,
}

/// Values that override the configuration file
#[derive(clap::Args, Default)]
struct Overrides {
    /// Number of generative items kept available
    #[arg(long, env = "POOL_GENAI_ITEMS")]
    pool_size: Option<usize>,

    /// Prompt definitions file
    #[arg(long, env = "PROMPTS_FILE")]
    prompts_file: Option<PathBuf>,

    /// Address to bind to
    #[arg(long, env = "LISTEN_ADDR")]
    host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "LISTEN_PORT")]
    port: Option<u16>,

    /// Produce video artifacts instead of audio
    #[arg(
        long,
        env = "GENERATE_VIDEO",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = FalseyValueParser::new()
    )]
    generate_video: Option<bool>,

    /// Root directory for generated artifacts
    #[arg(long, env = "DMS_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Public URL prefix for artifact paths
    #[arg(long, env = "DMS_URL_BASE")]
    url_base: Option<String>,

    /// Seconds a picked generative item is kept before deletion
    #[arg(long, env = "GRACE_PERIOD_SECS")]
    grace_period_secs: Option<u64>,

    /// Seconds between maintenance cycles
    #[arg(long, env = "MAINTENANCE_INTERVAL_SECS")]
    maintenance_interval_secs: Option<u64>,

    /// API key for text generation (and synthesis unless overridden)
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API key for speech synthesis
    #[arg(long, env = "GOOGLE_TTS_API_KEY", hide_env_values = true)]
    tts_api_key: Option<String>,

    /// Project billed for speech synthesis
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT")]
    project: Option<String>,

    /// Speech synthesis endpoint
    #[arg(long, env = "TTS_ENDPOINT")]
    tts_endpoint: Option<String>,

    /// Text generation API base URL
    #[arg(long, env = "GENAI_ENDPOINT")]
    genai_endpoint: Option<String>,

    /// Text generation model
    #[arg(long, env = "GENAI_MODEL")]
    genai_model: Option<String>,
}

impl Overrides {
    fn apply(self, config: &mut ServiceConfig) {
        if let Some(v) = self.pool_size {
            config.pool.target_size = v;
        }
        if let Some(v) = self.prompts_file {
            config.prompts_file = v;
        }
        if let Some(v) = self.host {
            config.server.host = v;
        }
        if let Some(v) = self.port {
            config.server.port = v;
        }
        if let Some(v) = self.generate_video {
            config.storage.generate_video = v;
        }
        if let Some(v) = self.output_dir {
            config.storage.output_dir = v;
        }
        if let Some(v) = self.url_base {
            config.storage.url_base = v;
        }
        if let Some(v) = self.grace_period_secs {
            config.pool.grace_period_secs = v;
        }
        if let Some(v) = self.maintenance_interval_secs {
            config.pool.maintenance_interval_secs = v;
        }
        if let Some(v) = self.api_key {
            config.upstream.api_key = v;
        }
        if self.tts_api_key.is_some() {
            config.upstream.tts_api_key = self.tts_api_key;
        }
        if self.project.is_some() {
            config.upstream.project = self.project;
        }
        if let Some(v) = self.tts_endpoint {
            config.upstream.tts_endpoint = v;
        }
        if let Some(v) = self.genai_endpoint {
            config.upstream.genai_endpoint = v;
        }
        if let Some(v) = self.genai_model {
            config.upstream.genai_model = v;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let fmt_layer = if cli.json_logs {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hakidgen={},tower_http={}", log_level, log_level).into()),
        )
        .with(fmt_layer)
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_toml_file(path)?,
        None => ServiceConfig::default(),
    };
    cli.overrides.apply(&mut config);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_serve(config).await?,
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}

async fn run_serve(config: ServiceConfig) -> Result<()> {
    config.validate()?;
    tracing::info!(
        output_dir = %config.storage.output_dir.display(),
        prompts_file = %config.prompts_file.display(),
        target_size = config.pool.target_size,
        format = ?config.storage.media_format(),
        "Starting hakidgen"
    );

    let store = Arc::new(ArtifactStore::new(
        &config.storage.output_dir,
        config.storage.media_format(),
    ));
    let generator: Arc<dyn Generator> = Arc::new(GoogleGenerator::new(config.upstream.clone()));
    let pool = Arc::new(PoolManager::new(
        store,
        generator,
        config.storage.url_base.clone(),
    ));

    let shutdown = CancellationToken::new();
    let maintenance = Arc::new(MaintenanceLoop::new(
        pool.clone(),
        MaintenanceSettings::from(&config),
    ));
    let maintenance_handle = maintenance.spawn(shutdown.child_token());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Listening on {}", addr);

    // Wait for shutdown signal
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down...");
                signal.cancel();
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    server::serve(listener, server::build_app(pool), shutdown.clone()).await?;

    shutdown.cancel();
    maintenance_handle.await?;
    tracing::info!("hakidgen stopped");

    Ok(())
}

fn show_config(config: &ServiceConfig) -> Result<()> {
    let toml = toml::to_string_pretty(&config.redacted())?;
    println!("{}", toml);
    Ok(())
}

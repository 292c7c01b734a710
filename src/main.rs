//! Guo Runtime
//!
//! The entry point for the philosopher bot. Handles CLI args,
//! configuration and credentials, publisher login, and orchestrating
//! the forever run loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use guo::agent::{run_loop, RunLoopOptions};
use guo::config::{
    get_bot_dir, get_config_path, load_config, load_credentials, write_default_config,
};
use guo::generator::ContentGenerator;
use guo::history::History;
use guo::inference::OllamaClient;
use guo::publisher::WebDriverPublisher;
use guo::types::{BotConfig, Publisher};

const VERSION: &str = "0.1.0";

/// Environment file template written by `--init`.
const ENV_TEMPLATE: &str = "TWITTER_USERNAME=\nTWITTER_PASSWORD=\n";

/// Guo -- Autonomous Philosopher Bot
#[derive(Parser, Debug)]
#[command(
    name = "guo",
    version = VERSION,
    about = "Guo -- Autonomous Philosopher Bot",
    long_about = "An AI philosopher that tweets on a one-to-two-hour cadence and replies to its mentions."
)]
struct Cli {
    /// Start the bot
    #[arg(long)]
    run: bool,

    /// Write a default config.yaml and .env template
    #[arg(long)]
    init: bool,

    /// Show the resolved configuration
    #[arg(long)]
    status: bool,

    /// Path to the config file (defaults to ~/.guo/config.yaml)
    #[arg(long)]
    config: Option<PathBuf>,
}

// ---- Init Command -----------------------------------------------------------

/// Write the default config and credentials template, never overwriting.
fn init_files(config_path: &Path) -> Result<()> {
    write_default_config(config_path)?;

    let env_path = get_bot_dir().join(".env");
    if env_path.exists() {
        println!("Credentials file already exists: {}", env_path.display());
    } else {
        std::fs::write(&env_path, ENV_TEMPLATE)
            .with_context(|| format!("Failed to write {}", env_path.display()))?;
        println!("Wrote credentials template: {}", env_path.display());
    }

    println!("Config: {}", config_path.display());
    println!("Fill in TWITTER_USERNAME and TWITTER_PASSWORD, then run: guo --run");
    Ok(())
}

// ---- Status Command ---------------------------------------------------------

/// Display the resolved configuration.
fn show_status(config_path: &Path) {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            return;
        }
    };

    println!(
        r#"
=== GUO STATUS ===
Config:     {}
Engine:     {}
Temp:       {}
Inference:  {}
WebDriver:  {}
Platform:   {}
Topics:     {}
History:    {} entries max
Version:    {}
==================
"#,
        config_path.display(),
        config.engine,
        config.temperature,
        config.api_url,
        config.webdriver_url,
        config.base_url,
        config.topics.len(),
        config.history_limit,
        VERSION,
    );
}

// ---- Main Run ---------------------------------------------------------------

fn init_tracing(config: &BotConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load everything, log in, and run the loop until a shutdown signal.
async fn run(config_path: &Path) -> Result<()> {
    // Credentials may live in ~/.guo/.env or a local .env; both are optional.
    let _ = dotenvy::from_path(get_bot_dir().join(".env"));
    let _ = dotenvy::dotenv();

    let config = load_config(config_path)?;
    init_tracing(&config);

    info!("Guo v{} starting", VERSION);

    let credentials = load_credentials()?;

    let inference = Arc::new(OllamaClient::new(
        config.api_url.clone(),
        config.engine.clone(),
        config.max_tokens,
    ));
    let generator = ContentGenerator::new(inference, &config);

    let publisher: Arc<dyn Publisher> = Arc::new(
        WebDriverPublisher::connect(
            config.webdriver_url.clone(),
            config.base_url.clone(),
            credentials,
        )
        .await
        .context("Failed to start WebDriver session")?,
    );

    // Login failure at startup is fatal; it is not retried.
    if !publisher.login().await {
        publisher.shutdown().await;
        anyhow::bail!("Failed to log in to the platform");
    }

    let history = History::with_limit(config.history_limit);
    let options = RunLoopOptions {
        generator,
        publisher: Arc::clone(&publisher),
        history,
    };

    // Handle graceful shutdown
    let shutdown = async {
        let ctrl_c = signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to register SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received SIGINT, shutting down");
                }
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down");
                }
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("Failed to register Ctrl+C handler");
            info!("Received shutdown signal");
        }
    };

    tokio::select! {
        _ = shutdown => {
            publisher.shutdown().await;
        }
        result = run_loop(options) => {
            // The loop runs forever; reaching this arm means it errored out.
            publisher.shutdown().await;
            result?;
        }
    }

    Ok(())
}

// ---- Entry Point -----------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(get_config_path);

    if cli.init {
        if let Err(e) = init_files(&config_path) {
            eprintln!("Init failed: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    if cli.status {
        show_status(&config_path);
        return;
    }

    if cli.run {
        if let Err(e) = run(&config_path).await {
            eprintln!("Fatal: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Default: show usage hint
    println!("Run \"guo --help\" for usage information.");
    println!("Run \"guo --run\" to start the bot.");
}

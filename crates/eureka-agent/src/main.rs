//! Eureka registration agent
//!
//! Keeps the current process registered with a Eureka-style registry until
//! interrupted, or prints the registry's current application list.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use eureka_client::{
    ClientConfig, ClientState, EurekaClient, HttpMethod, HttpRequest, RegistrySnapshot,
    ReqwestTransport, RetryingTransport, TokioSpawner, Transport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info, warn};

#[derive(Parser)]
#[command(name = "eureka-agent")]
#[command(about = "Register this process with a Eureka registry and keep it alive")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register, renew until Ctrl-C, then deregister
    Run {
        /// Path to the client configuration (YAML or JSON)
        #[arg(long, short, value_name = "PATH")]
        config: PathBuf,
    },

    /// Print the registry's application list once
    Apps {
        /// Path to the client configuration (YAML or JSON)
        #[arg(long, short, value_name = "PATH")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Run { config } => run(config).await,
        Commands::Apps { config } => print_apps(config).await,
    }
}

async fn load_config(path: &Path) -> Result<ClientConfig> {
    ClientConfig::from_file(path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

async fn run(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path).await?;
    let client = EurekaClient::with_reqwest(config, Arc::new(TokioSpawner))
        .context("Failed to create Eureka client")?;

    let updates = client.cache().subscribe();
    tokio::spawn(async move {
        while let Ok(view) = updates.recv().await {
            let instances: usize = view.values().map(Vec::len).sum();
            info!(
                "Registry view refreshed: {} applications, {} instances",
                view.len(),
                instances
            );
        }
    });

    match client.register().await {
        ClientState::Up => info!("Registered, renewing until interrupted"),
        ClientState::OutOfService if client.config().is_standalone() => {
            info!("No registry configured, running standalone until interrupted")
        }
        state => warn!("Registration did not succeed (state {}), waiting for interrupt", state),
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    info!("Interrupted, deregistering");
    client.shutdown().await;
    info!("Final state: {}", client.state());
    Ok(())
}

async fn print_apps(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path).await?;
    if config.is_standalone() {
        bail!("No registry configured in {}", config_path.display());
    }

    let transport = RetryingTransport::new(ReqwestTransport::new()?, &config.transport);
    let response = transport
        .send(HttpRequest::new(HttpMethod::Get, config.apps_url(&[])))
        .await
        .context("Failed to reach the registry")?;
    if response.status != 200 {
        bail!("Registry answered {}: {}", response.status, response.body);
    }

    let snapshot =
        RegistrySnapshot::from_json(&response.body).context("Failed to decode application list")?;
    for app in &snapshot.applications {
        println!("{}", app.name.to_lowercase());
        for instance in &app.instances {
            println!("  {} ({})", instance.endpoint, instance.status);
        }
    }
    Ok(())
}

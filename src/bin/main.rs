//! k8s-nameserver binary entry point.

use clap::Parser;
use k8s_nameserver::{
    telemetry, Config, ConfigWatcher, FileConfigReader, Nameserver, Resolver, Shutdown, UdpServer,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Authoritative nameserver for tailnet hosts in a Kubernetes cluster.
#[derive(Parser, Debug)]
#[command(name = "k8s-nameserver")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML). Optional.
    #[arg(short, long, default_value = "k8s-nameserver.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize telemetry
    telemetry::init(&config.telemetry).map_err(|e| e as Box<dyn std::error::Error>)?;

    let hosts_path = config.hosts.path();
    info!(
        config_file = %args.config.display(),
        listen_addr = %config.dns.listen_addr,
        hosts_file = %hosts_path.display(),
        address_mode = ?config.hosts.address_mode,
        on_reload_error = ?config.hosts.on_reload_error,
        "Starting k8s-nameserver"
    );

    let shutdown = Shutdown::new();
    shutdown.spawn_signal_listener();

    let resolver = Resolver::new(config.dns.clone());
    let nameserver = Arc::new(Nameserver::new(
        FileConfigReader::new(hosts_path),
        resolver,
        &config.hosts,
    ));

    // Watch before the first read so a swap in between still signals.
    let (watcher, updates) = ConfigWatcher::start(config.hosts.config_dir.clone())?;

    // The first load must succeed before anything listens.
    if let Err(e) = nameserver.initialize() {
        error!("error initializing nameserver: {}", e);
        return Err(e.into());
    }

    let watch_handle = nameserver.start_watching(updates, shutdown.clone());

    let server = UdpServer::bind(config.dns.listen_addr).await?;
    let served = server
        .run(Arc::clone(&nameserver), &config.dns, shutdown.clone())
        .await;

    drop(watcher);
    let watched = watch_handle.await?;

    if let Err(e) = served {
        error!("DNS server error: {}", e);
        return Err(e.into());
    }
    if let Err(e) = watched {
        error!("config watch error: {}", e);
        return Err(e.into());
    }

    info!("k8s-nameserver shutdown complete");
    Ok(())
}

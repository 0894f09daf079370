//! k8s-nameserver - An authoritative DNS nameserver for tailnet hosts.
//!
//! This crate serves A and AAAA records from a JSON hosts file mounted into
//! the Pod from a Kubernetes ConfigMap. The file is re-read whenever the
//! kubelet swaps the mount, and the new host table replaces the old one
//! atomically while queries keep being answered.
//!
//! ## Features
//!
//! - Hot reload driven by the ConfigMap `..data` symlink
//! - Atomic snapshot replacement; queries never see a partial table
//! - Authoritative answers for `ts.net.`, REFUSED for everything else
//! - Graceful shutdown on SIGINT/SIGTERM
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        k8s-nameserver                           │
//! │                                                                 │
//! │  ┌──────────────────┐ signal ┌──────────────────┐               │
//! │  │  ConfigWatcher   │───────▶│    Nameserver    │               │
//! │  │  (<dir>/..data)  │        │   (controller)   │               │
//! │  └──────────────────┘        └───┬─────────▲────┘               │
//! │                       read_config│         │ set_config         │
//! │  ┌──────────────────┐            │   ┌─────┴────────────┐       │
//! │  │ FileConfigReader │◀───────────┘   │ Resolver         │       │
//! │  │ (<dir>/dns.json) │                │ HostTable+Catalog│       │
//! │  └──────────────────┘                └─────▲────────────┘       │
//! │                                            │ query              │
//! │                                      ┌─────┴────────────┐       │
//! │                                      │    UdpServer     │◀── UDP│
//! │                                      │                  │  :1053│
//! │                                      └──────────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use k8s_nameserver::{
//!     Config, ConfigWatcher, FileConfigReader, Nameserver, Resolver, Shutdown, UdpServer,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let shutdown = Shutdown::new();
//!     shutdown.spawn_signal_listener();
//!
//!     let nameserver = Arc::new(Nameserver::new(
//!         FileConfigReader::new(config.hosts.path()),
//!         Resolver::new(config.dns.clone()),
//!         &config.hosts,
//!     ));
//!     let (_watcher, updates) = ConfigWatcher::start(config.hosts.config_dir.clone())?;
//!     nameserver.initialize()?;
//!
//!     let watch = nameserver.start_watching(updates, shutdown.clone());
//!
//!     let server = UdpServer::bind(config.dns.listen_addr).await?;
//!     server.run(nameserver, &config.dns, shutdown).await?;
//!     watch.await??;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod config;
pub mod error;
pub mod hosts;
pub mod metrics;
pub mod nameserver;
pub mod resolver;
pub mod server;
pub mod shutdown;
pub mod source;
pub mod state;
pub mod telemetry;
pub mod watcher;

// Re-export main types
pub use config::{Config, DnsConfig, HostsConfig, ReloadErrorPolicy, SoaConfig, TelemetryConfig};
pub use error::{DnsError, QueryError};
pub use hosts::{AddressMode, ResolverConfig};
pub use nameserver::{Nameserver, ReloadOutcome};
pub use resolver::Resolver;
pub use server::UdpServer;
pub use shutdown::Shutdown;
pub use source::{ConfigReader, FileConfigReader};
pub use state::HostTable;
pub use watcher::ConfigWatcher;

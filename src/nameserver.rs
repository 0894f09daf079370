//! Nameserver controller.
//!
//! Owns the host table and is the only writer to it: the startup load and
//! every change-triggered reload go through [`Nameserver::reload`]. Queries
//! from the serving loop enter through [`Nameserver::query`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{HostsConfig, ReloadErrorPolicy};
use crate::error::{DnsError, QueryError};
use crate::hosts::{AddressMode, ResolverConfig};
use crate::metrics::{self, ReloadResult};
use crate::resolver::Resolver;
use crate::shutdown::Shutdown;
use crate::source::ConfigReader;

/// Result of a successful reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new host table was published.
    Applied {
        /// Hostnames now served.
        hosts: usize,
        /// Serial of the new table.
        serial: u32,
    },
    /// The config matched the active table; nothing was published.
    Unchanged,
}

/// Startup load, reloads and query dispatch over one host table.
pub struct Nameserver {
    reader: Box<dyn ConfigReader>,
    resolver: Resolver,
    address_mode: AddressMode,
    on_reload_error: ReloadErrorPolicy,
}

impl Nameserver {
    /// Create a controller reading from `reader` and publishing into
    /// `resolver`'s table.
    pub fn new(reader: impl ConfigReader, resolver: Resolver, options: &HostsConfig) -> Self {
        Self {
            reader: Box::new(reader),
            resolver,
            address_mode: options.address_mode,
            on_reload_error: options.on_reload_error,
        }
    }

    /// The resolver queries are answered from.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Load the initial host table.
    ///
    /// Must succeed before the server starts listening.
    pub fn initialize(&self) -> Result<ReloadOutcome, DnsError> {
        let outcome = self.reload()?;
        if let ReloadOutcome::Applied { hosts, serial } = outcome {
            info!(hosts, serial, "initial host table loaded");
        }
        Ok(outcome)
    }

    /// Re-read the config and publish it if it changed.
    ///
    /// Nothing is applied when reading, parsing or validation fails.
    pub fn reload(&self) -> Result<ReloadOutcome, DnsError> {
        let raw = match self.reader.read_config() {
            Ok(raw) => raw,
            Err(e) => {
                metrics::record_reload(ReloadResult::ReadError);
                return Err(e.into());
            }
        };
        if raw.is_none() {
            debug!("no DNS config present");
        }

        let config = match ResolverConfig::parse(raw.as_deref(), self.address_mode) {
            Ok(config) => config,
            Err(e) => {
                metrics::record_reload(ReloadResult::Invalid);
                return Err(e);
            }
        };

        let hosts = config.len();
        let table = self.resolver.table();
        if !self.resolver.set_config(config) {
            metrics::record_reload(ReloadResult::Unchanged);
            return Ok(ReloadOutcome::Unchanged);
        }

        metrics::record_reload(ReloadResult::Applied);
        table.emit_metrics();
        Ok(ReloadOutcome::Applied {
            hosts,
            serial: table.serial(),
        })
    }

    /// [`Nameserver::reload`] on the blocking pool, off the async workers.
    async fn reload_blocking(self: &Arc<Self>) -> Result<ReloadOutcome, DnsError> {
        let nameserver = Arc::clone(self);
        tokio::task::spawn_blocking(move || nameserver.reload())
            .await
            .map_err(|e| DnsError::Io(io::Error::new(io::ErrorKind::Other, e)))?
    }

    /// Spawn the task that reloads on every change signal.
    ///
    /// The task ends with `Ok(())` once `shutdown` fires. A reload failure
    /// under [`ReloadErrorPolicy::Exit`] or a closed `updates` channel
    /// triggers `shutdown` and ends it with the error.
    pub fn start_watching(
        self: &Arc<Self>,
        mut updates: mpsc::Receiver<String>,
        shutdown: Shutdown,
    ) -> JoinHandle<Result<(), DnsError>> {
        let nameserver = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                let signal = tokio::select! {
                    biased;
                    _ = shutdown.triggered() => {
                        debug!("config watch shutting down");
                        return Ok(());
                    }
                    signal = updates.recv() => signal,
                };

                let Some(signal) = signal else {
                    error!("config watcher finished");
                    shutdown.trigger();
                    return Err(DnsError::WatcherClosed);
                };

                info!("{}", signal);
                match nameserver.reload_blocking().await {
                    Ok(ReloadOutcome::Applied { hosts, serial }) => {
                        info!(hosts, serial, "host table updated");
                    }
                    Ok(ReloadOutcome::Unchanged) => {
                        info!("config unchanged, keeping current host table");
                    }
                    Err(e) => match nameserver.on_reload_error {
                        ReloadErrorPolicy::Exit => {
                            error!("error reloading DNS config: {}", e);
                            shutdown.trigger();
                            return Err(e);
                        }
                        ReloadErrorPolicy::KeepLast => {
                            warn!(
                                serial = nameserver.resolver.table().serial(),
                                "error reloading DNS config, keeping previous host table: {}", e
                            );
                        }
                    },
                }
            }
        })
    }

    /// Answer one wire-format query.
    pub async fn query(&self, payload: &[u8], src: SocketAddr) -> Result<Vec<u8>, QueryError> {
        self.resolver.query(payload, src).await
    }
}

//! UDP serving loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, trace, warn};

use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::metrics::{self, ServerErrorKind};
use crate::nameserver::Nameserver;
use crate::shutdown::Shutdown;
use crate::state::HostTable;

/// Interval for emitting state metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically emit state metrics.
async fn metrics_loop(table: HostTable, shutdown: Shutdown) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                table.emit_metrics();
                debug!(
                    hosts = table.hosts_count(),
                    serial = table.serial(),
                    "emitted state metrics"
                );
            }
            _ = shutdown.triggered() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Receives DNS queries over UDP and answers each one in its own task.
pub struct UdpServer {
    socket: Arc<UdpSocket>,
}

impl UdpServer {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self, DnsError> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, DnsError> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve until `shutdown` fires.
    ///
    /// Queries already dispatched finish on their own. A receive error ends
    /// the loop.
    pub async fn run(
        self,
        nameserver: Arc<Nameserver>,
        config: &DnsConfig,
        shutdown: Shutdown,
    ) -> Result<(), DnsError> {
        let addr = self.local_addr()?;
        info!(%addr, max_inflight = ?config.max_inflight, "DNS UDP listening");

        let metrics_handle = tokio::spawn(metrics_loop(
            nameserver.resolver().table().clone(),
            shutdown.clone(),
        ));
        let result = self.serve(nameserver, config, &shutdown).await;

        shutdown.trigger();
        let _ = metrics_handle.await;
        info!(%addr, "DNS server stopped");
        result
    }

    async fn serve(
        &self,
        nameserver: Arc<Nameserver>,
        config: &DnsConfig,
        shutdown: &Shutdown,
    ) -> Result<(), DnsError> {
        let limiter = config.max_inflight.map(|n| Arc::new(Semaphore::new(n)));
        let mut buf = vec![0u8; config.max_payload];

        loop {
            let (n, src) = tokio::select! {
                _ = shutdown.triggered() => {
                    info!("DNS server shutdown requested");
                    return Ok(());
                }
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        error!("error reading from UDP socket: {}", e);
                        return Err(e.into());
                    }
                },
            };

            metrics::record_datagram();
            trace!(%src, len = n, "received datagram");

            let permit = match &limiter {
                Some(limiter) => tokio::select! {
                    _ = shutdown.triggered() => return Ok(()),
                    permit = Arc::clone(limiter).acquire_owned() => match permit {
                        Ok(permit) => Some(permit),
                        Err(_) => return Ok(()),
                    },
                },
                None => None,
            };

            let payload = buf[..n].to_vec();
            let socket = Arc::clone(&self.socket);
            let nameserver = Arc::clone(&nameserver);
            tokio::spawn(async move {
                let _permit = permit;
                let response = match nameserver.query(&payload, src).await {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(%src, "error responding to query: {}", e);
                        metrics::record_server_error(ServerErrorKind::Query);
                        e.response
                    }
                };
                if response.is_empty() {
                    return;
                }
                if let Err(e) = socket.send_to(&response, src).await {
                    warn!(%src, "error writing response: {}", e);
                    metrics::record_server_error(ServerErrorKind::Send);
                }
            });
        }
    }
}

//! In-memory host table shared between the config watcher and query tasks.
//!
//! The active [`ResolverConfig`] is an immutable snapshot behind an `Arc`.
//! Reloads build a complete new snapshot and swap it in under a short write
//! lock; queries clone the `Arc` and resolve against it without holding the
//! lock, so they never see a half-replaced table.

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

use crate::hosts::ResolverConfig;
use crate::metrics;

/// Thread-safe handle to the active host table.
#[derive(Debug, Clone)]
pub struct HostTable {
    inner: Arc<RwLock<HostTableInner>>,
}

#[derive(Debug)]
struct HostTableInner {
    /// Current snapshot.
    config: Arc<ResolverConfig>,

    /// Serial number for SOA (incremented on changes)
    serial: u32,
}

impl Default for HostTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HostTable {
    /// Create a table with no host records.
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::empty())
    }

    /// Create a table starting from the given config.
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HostTableInner {
                config: Arc::new(config),
                serial: 0,
            })),
        }
    }

    /// Replace the active config. Returns false, and leaves the serial
    /// alone, when the new config is identical to the active one.
    pub fn set_config(&self, config: ResolverConfig) -> bool {
        let mut inner = self.inner.write();
        if *inner.config == config {
            debug!(hosts = config.len(), "host table unchanged");
            return false;
        }

        let previous = std::mem::replace(&mut inner.config, Arc::new(config));
        inner.serial = inner.serial.wrapping_add(1);
        debug!(
            previous_hosts = previous.len(),
            hosts = inner.config.len(),
            serial = inner.serial,
            "replaced host table"
        );
        true
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Arc<ResolverConfig> {
        Arc::clone(&self.inner.read().config)
    }

    /// Get current SOA serial.
    pub fn serial(&self) -> u32 {
        self.inner.read().serial
    }

    /// Number of hostnames in the active snapshot.
    pub fn hosts_count(&self) -> usize {
        self.inner.read().config.len()
    }

    /// Emit current state metrics.
    pub fn emit_metrics(&self) {
        let inner = self.inner.read();
        metrics::record_hosts_count(inner.config.len());
        metrics::record_serial(inner.serial);
    }
}

//! Configuration types for k8s-nameserver.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::DnsError;
use crate::hosts::AddressMode;

/// Prefix for environment overrides, e.g. `K8S_NAMESERVER__DNS__TTL=30`.
pub const ENV_PREFIX: &str = "K8S_NAMESERVER";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// DNS server configuration.
    #[serde(default)]
    pub dns: DnsConfig,

    /// Hosts file source configuration.
    #[serde(default)]
    pub hosts: HostsConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load settings from an optional TOML file, overlaid with environment
    /// variables.
    pub fn load(path: &Path) -> Result<Self, DnsError> {
        ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|settings| settings.try_deserialize())
            .map_err(|e| DnsError::Config(e.to_string()))
    }
}

/// DNS server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Address for the DNS server to listen on (UDP only).
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// TTL for A/AAAA records in seconds.
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Size of the receive buffer for a single query datagram.
    #[serde(default = "default_max_payload")]
    pub max_payload: usize,

    /// Upper bound on queries being answered at once. Unbounded when unset.
    #[serde(default)]
    pub max_inflight: Option<usize>,

    /// SOA record configuration.
    #[serde(default)]
    pub soa: SoaConfig,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            ttl: default_ttl(),
            max_payload: default_max_payload(),
            max_inflight: None,
            soa: SoaConfig::default(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 1053))
}

fn default_ttl() -> u32 {
    600
}

// 4096 bytes is the recommended EDNS max payload size (RFC 6891 6.2.5).
fn default_max_payload() -> usize {
    4096
}

/// Where the hosts file lives and how it is applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostsConfig {
    /// Directory the ConfigMap is mounted at.
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Name of the hosts file inside `config_dir`.
    #[serde(default = "default_config_file")]
    pub config_file: String,

    /// How multiple addresses for one hostname are kept.
    #[serde(default)]
    pub address_mode: AddressMode,

    /// What to do when a reload after startup fails.
    #[serde(default)]
    pub on_reload_error: ReloadErrorPolicy,
}

impl HostsConfig {
    /// Full path of the hosts file.
    pub fn path(&self) -> PathBuf {
        self.config_dir.join(&self.config_file)
    }
}

impl Default for HostsConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            config_file: default_config_file(),
            address_mode: AddressMode::default(),
            on_reload_error: ReloadErrorPolicy::default(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    PathBuf::from("/config")
}

fn default_config_file() -> String {
    "dns.json".to_string()
}

/// Behaviour when a reload triggered by a config change fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadErrorPolicy {
    /// Stop the whole nameserver.
    #[default]
    Exit,
    /// Log the error and keep serving the last good host table.
    KeepLast,
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level filter (e.g., "info", "debug", "k8s_nameserver=debug,warn").
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Prometheus metrics exporter address.
    #[serde(default)]
    pub prometheus_addr: Option<SocketAddr>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            prometheus_addr: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SOA (Start of Authority) record configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoaConfig {
    /// Primary nameserver hostname.
    #[serde(default = "default_mname")]
    pub mname: String,

    /// Admin email in DNS format (e.g., "admin.ts.net" for admin@ts.net).
    #[serde(default = "default_rname")]
    pub rname: String,

    /// Refresh interval in seconds.
    #[serde(default = "default_refresh")]
    pub refresh: u32,

    /// Retry interval in seconds.
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// Expire time in seconds.
    #[serde(default = "default_expire")]
    pub expire: u32,

    /// Minimum TTL in seconds.
    #[serde(default = "default_minimum")]
    pub minimum: u32,
}

fn default_mname() -> String {
    "ns1.ts.net".to_string()
}

fn default_rname() -> String {
    "admin.ts.net".to_string()
}

fn default_refresh() -> u32 {
    3600
}

fn default_retry() -> u32 {
    600
}

fn default_expire() -> u32 {
    604800
}

fn default_minimum() -> u32 {
    60
}

impl Default for SoaConfig {
    fn default() -> Self {
        Self {
            mname: default_mname(),
            rname: default_rname(),
            refresh: default_refresh(),
            retry: default_retry(),
            expire: default_expire(),
            minimum: default_minimum(),
        }
    }
}

//! Hosts file parsing and validation.
//!
//! The hosts file is the JSON document mounted from the ConfigMap:
//!
//! ```json
//! {"hosts": {"foo.bar.ts.net.": ["10.20.30.40"]}}
//! ```
//!
//! It is turned into a [`ResolverConfig`] in one pass. Any invalid entry
//! rejects the whole document, so a bad file is never partially applied.

use hickory_proto::rr::{LowerName, Name};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use tracing::{info, warn};

use crate::error::DnsError;

/// Zones this server is authoritative for. Queries under them are never
/// forwarded anywhere.
pub const LOCAL_DOMAINS: &[&str] = &["ts.net", "ts.net."];

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 253;

/// On-disk representation of the hosts file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostsFile {
    /// Hostname (not necessarily fully qualified) to address literals.
    #[serde(default)]
    pub hosts: Option<BTreeMap<String, Vec<String>>>,
}

/// How several addresses listed for one hostname are retained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressMode {
    /// Only the last listed address is served.
    #[default]
    KeepLast,
    /// Every listed address is served, in order, without duplicates.
    KeepAll,
}

/// Validated host table, ready to be handed to the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    local_domains: Vec<LowerName>,
    hosts: HashMap<LowerName, Vec<IpAddr>>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::empty()
    }
}

impl ResolverConfig {
    /// A config with no host records. Local domains are still set.
    pub fn empty() -> Self {
        Self {
            local_domains: local_domains(),
            hosts: HashMap::new(),
        }
    }

    /// Parse raw hosts file contents. `None` or blank input is an empty
    /// table, not an error.
    pub fn parse(raw: Option<&[u8]>, mode: AddressMode) -> Result<Self, DnsError> {
        let raw = match raw {
            Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => bytes,
            _ => {
                info!("no DNS config provided");
                return Ok(Self::empty());
            }
        };

        let file: HostsFile = serde_json::from_slice(raw)?;
        Self::from_hosts_file(file, mode)
    }

    /// Validate an already deserialized hosts file.
    pub fn from_hosts_file(file: HostsFile, mode: AddressMode) -> Result<Self, DnsError> {
        let entries = file.hosts.unwrap_or_default();
        if entries.is_empty() {
            info!("no host records found");
        }

        let mut hosts: HashMap<LowerName, Vec<IpAddr>> = HashMap::with_capacity(entries.len());
        for (hostname, addrs) in entries {
            let fqdn = LowerName::from(to_fqdn(&hostname)?);
            let parsed = addrs
                .iter()
                .map(|addr| parse_addr(addr))
                .collect::<Result<Vec<_>, _>>()?;

            if parsed.is_empty() {
                warn!(%hostname, "host has no addresses, skipping");
                continue;
            }

            let slot = hosts.entry(fqdn).or_default();
            match mode {
                AddressMode::KeepLast => {
                    slot.clear();
                    slot.extend(parsed.last().copied());
                }
                AddressMode::KeepAll => {
                    for ip in parsed {
                        if !slot.contains(&ip) {
                            slot.push(ip);
                        }
                    }
                }
            }
        }

        Ok(Self {
            local_domains: local_domains(),
            hosts,
        })
    }

    /// Zones served authoritatively.
    pub fn local_domains(&self) -> &[LowerName] {
        &self.local_domains
    }

    /// All host records.
    pub fn hosts(&self) -> &HashMap<LowerName, Vec<IpAddr>> {
        &self.hosts
    }

    /// Addresses for an exact name.
    pub fn lookup(&self, name: &LowerName) -> Option<&[IpAddr]> {
        self.hosts.get(name).map(Vec::as_slice)
    }

    /// True if `name` is inside one of the local domains.
    pub fn is_local(&self, name: &LowerName) -> bool {
        self.local_domains.iter().any(|zone| zone.zone_of(name))
    }

    /// True if `name` is the apex of a local domain.
    pub fn is_local_apex(&self, name: &LowerName) -> bool {
        self.local_domains.contains(name)
    }

    /// Number of hostnames.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// True when there are no host records.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Normalize a hostname to an FQDN with a trailing dot.
pub fn to_fqdn(hostname: &str) -> Result<Name, DnsError> {
    let invalid = || DnsError::InvalidFqdn(hostname.to_string());

    let trimmed = hostname.strip_suffix('.').unwrap_or(hostname);
    if trimmed.is_empty() || trimmed.len() > MAX_NAME_LEN {
        return Err(invalid());
    }
    if !trimmed.split('.').all(is_valid_label) {
        return Err(invalid());
    }

    Name::from_ascii(format!("{trimmed}.")).map_err(|_| invalid())
}

/// Letters, digits and inner hyphens; must start and end alphanumeric.
fn is_valid_label(label: &str) -> bool {
    let bytes = label.as_bytes();
    match (bytes.first(), bytes.last()) {
        (Some(first), Some(last)) if bytes.len() <= MAX_LABEL_LEN => {
            first.is_ascii_alphanumeric()
                && last.is_ascii_alphanumeric()
                && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-')
        }
        _ => false,
    }
}

fn parse_addr(addr: &str) -> Result<IpAddr, DnsError> {
    addr.parse()
        .map_err(|_| DnsError::InvalidAddress(addr.to_string()))
}

fn local_domains() -> Vec<LowerName> {
    let mut zones: Vec<LowerName> = Vec::with_capacity(LOCAL_DOMAINS.len());
    for domain in LOCAL_DOMAINS {
        if let Ok(name) = to_fqdn(domain) {
            let zone = LowerName::from(name);
            if !zones.contains(&zone) {
                zones.push(zone);
            }
        }
    }
    zones
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower(name: &str) -> LowerName {
        LowerName::from(Name::from_ascii(name).unwrap())
    }

    fn ip(addr: &str) -> IpAddr {
        addr.parse().unwrap()
    }

    fn parse(raw: &str, mode: AddressMode) -> Result<ResolverConfig, DnsError> {
        ResolverConfig::parse(Some(raw.as_bytes()), mode)
    }

    #[test]
    fn test_parse_single_host() {
        let raw = r#"{"hosts":{"foo.bar.ts.net.": ["10.20.30.40"]}}"#;
        let config = parse(raw, AddressMode::KeepLast).unwrap();

        assert_eq!(config.len(), 1);
        assert_eq!(
            config.lookup(&lower("foo.bar.ts.net.")),
            Some(&[ip("10.20.30.40")][..])
        );
    }

    #[test]
    fn test_hostname_without_trailing_dot_is_normalized() {
        let raw = r#"{"hosts":{"foo.bar.ts.net": ["10.20.30.40"]}}"#;
        let config = parse(raw, AddressMode::KeepLast).unwrap();

        assert!(config.lookup(&lower("foo.bar.ts.net.")).is_some());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let raw = r#"{"hosts":{"Foo.Bar.ts.net.": ["10.20.30.40"]}}"#;
        let config = parse(raw, AddressMode::KeepLast).unwrap();

        assert!(config.lookup(&lower("foo.bar.ts.net.")).is_some());
    }

    #[test]
    fn test_absent_config_is_empty_with_local_domains() {
        let config = ResolverConfig::parse(None, AddressMode::KeepLast).unwrap();
        assert!(config.is_empty());
        assert!(!config.local_domains().is_empty());

        let config = parse("", AddressMode::KeepLast).unwrap();
        assert!(config.is_empty());
        assert!(!config.local_domains().is_empty());

        let config = parse(" \n", AddressMode::KeepLast).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_empty_hosts_map_is_valid() {
        for raw in [r#"{"hosts":{}}"#, "{}", r#"{"hosts":null}"#] {
            let config = parse(raw, AddressMode::KeepLast).unwrap();
            assert!(config.is_empty());
            assert!(!config.local_domains().is_empty());
        }
    }

    #[test]
    fn test_local_domains_are_fixed() {
        let raw = r#"{"hosts":{"foo.example.com.": ["10.0.0.1"]}}"#;
        let config = parse(raw, AddressMode::KeepLast).unwrap();

        assert_eq!(config.local_domains(), &[lower("ts.net.")]);
        assert!(config.is_local(&lower("anything.ts.net.")));
        assert!(config.is_local(&lower("ts.net.")));
        assert!(!config.is_local(&lower("foo.example.com.")));
        assert!(config.is_local_apex(&lower("ts.net.")));
        assert!(!config.is_local_apex(&lower("foo.ts.net.")));
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let err = parse(r#"{"hosts":"#, AddressMode::KeepLast).unwrap_err();
        assert!(matches!(err, DnsError::Json(_)));
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_address_rejects_whole_config() {
        let raw = r#"{"hosts":{"a.ts.net.": ["10.0.0.1"], "b.ts.net.": ["not-an-ip"]}}"#;
        let err = parse(raw, AddressMode::KeepLast).unwrap_err();

        match err {
            DnsError::InvalidAddress(value) => assert_eq!(value, "not-an-ip"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_fqdn_rejected() {
        let long_label = format!("{}.ts.net", "a".repeat(64));
        for bad in [
            "",
            ".",
            "foo..ts.net",
            long_label.as_str(),
            "foo-.ts.net",
            "-foo.ts.net",
            "foo_bar.ts.net",
            "*.ts.net",
            "foo bar.ts.net",
        ] {
            let file = HostsFile {
                hosts: Some(BTreeMap::from([(bad.to_string(), vec!["10.0.0.1".to_string()])])),
            };
            let err = ResolverConfig::from_hosts_file(file, AddressMode::KeepLast).unwrap_err();
            assert!(matches!(err, DnsError::InvalidFqdn(_)), "{bad:?} accepted");
        }
    }

    #[test]
    fn test_keep_last_retains_only_last_address() {
        let raw = r#"{"hosts":{"foo.ts.net.": ["10.0.0.1", "10.0.0.2", "fd7a::1"]}}"#;
        let config = parse(raw, AddressMode::KeepLast).unwrap();

        assert_eq!(config.lookup(&lower("foo.ts.net.")), Some(&[ip("fd7a::1")][..]));
    }

    #[test]
    fn test_keep_all_retains_every_address() {
        let raw = r#"{"hosts":{"foo.ts.net.": ["10.0.0.1", "10.0.0.2", "10.0.0.1"]}}"#;
        let config = parse(raw, AddressMode::KeepAll).unwrap();

        assert_eq!(
            config.lookup(&lower("foo.ts.net.")),
            Some(&[ip("10.0.0.1"), ip("10.0.0.2")][..])
        );
    }

    #[test]
    fn test_host_without_addresses_is_skipped() {
        let raw = r#"{"hosts":{"foo.ts.net.": [], "bar.ts.net.": ["10.0.0.1"]}}"#;
        let config = parse(raw, AddressMode::KeepLast).unwrap();

        assert_eq!(config.len(), 1);
        assert!(config.lookup(&lower("foo.ts.net.")).is_none());
    }

    #[test]
    fn test_reparse_is_equal() {
        let raw = r#"{"hosts":{"foo.ts.net.": ["10.0.0.1"], "bar.ts.net": ["10.0.0.2"]}}"#;
        let a = parse(raw, AddressMode::KeepLast).unwrap();
        let b = parse(raw, AddressMode::KeepLast).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_to_fqdn() {
        assert_eq!(to_fqdn("foo.ts.net").unwrap().to_string(), "foo.ts.net.");
        assert_eq!(to_fqdn("foo.ts.net.").unwrap().to_string(), "foo.ts.net.");
        assert!(to_fqdn("foo.ts.net").unwrap().is_fqdn());
    }

    #[test]
    fn test_to_fqdn_accepts_hyphens_and_digits() {
        assert_eq!(
            to_fqdn("my-host-01.tail-net.ts.net").unwrap().to_string(),
            "my-host-01.tail-net.ts.net."
        );
        assert!(to_fqdn("1.ts.net").is_ok());
        assert!(to_fqdn(&format!("{}.ts.net", "a".repeat(63))).is_ok());
    }
}

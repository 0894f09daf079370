//! Metrics instrumentation for k8s-nameserver.
//!
//! All metrics are prefixed with `k8s_ns.`

use metrics::{counter, gauge, histogram};
use std::time::Instant;

/// Record a DNS lookup answered by the hosts authority.
pub fn record_query(record_type: &str, result: QueryResult, duration: std::time::Duration) {
    let result_str = match result {
        QueryResult::Success => "success",
        QueryResult::NoData => "nodata",
        QueryResult::NxDomain => "nxdomain",
        QueryResult::Refused => "refused",
    };

    counter!("k8s_ns.query.count", "type" => record_type.to_string(), "result" => result_str)
        .increment(1);
    histogram!("k8s_ns.query.duration.seconds", "type" => record_type.to_string())
        .record(duration.as_secs_f64());
}

/// Query result type for metrics.
#[derive(Debug, Clone, Copy)]
pub enum QueryResult {
    /// Query returned records successfully.
    Success,
    /// Name exists but has no records of the requested type.
    NoData,
    /// Name not found in a local domain.
    NxDomain,
    /// Name outside every zone we serve.
    Refused,
}

/// Record IPs returned for a successful A/AAAA lookup.
pub fn record_ips_returned(count: usize) {
    histogram!("k8s_ns.query.ips_returned").record(count as f64);
}

/// Record a host table reload attempt.
pub fn record_reload(result: ReloadResult) {
    let result_str = match result {
        ReloadResult::Applied => "applied",
        ReloadResult::Unchanged => "unchanged",
        ReloadResult::ReadError => "read_error",
        ReloadResult::Invalid => "invalid",
    };

    counter!("k8s_ns.reload.count", "result" => result_str).increment(1);
}

/// Reload outcomes.
#[derive(Debug, Clone, Copy)]
pub enum ReloadResult {
    /// New host table published.
    Applied,
    /// Config identical to the active table.
    Unchanged,
    /// Config source could not be read.
    ReadError,
    /// Config could not be parsed or validated.
    Invalid,
}

/// Record the number of hostnames being served.
pub fn record_hosts_count(hosts: usize) {
    gauge!("k8s_ns.state.hosts.count").set(hosts as f64);
}

/// Record the SOA serial number.
pub fn record_serial(serial: u32) {
    gauge!("k8s_ns.state.serial").set(serial as f64);
}

/// Record a datagram received by the UDP server.
pub fn record_datagram() {
    counter!("k8s_ns.server.datagram.count").increment(1);
}

/// Record a failure in the serving path.
pub fn record_server_error(kind: ServerErrorKind) {
    let kind_str = match kind {
        ServerErrorKind::Query => "query",
        ServerErrorKind::Send => "send",
    };

    counter!("k8s_ns.server.error.count", "kind" => kind_str).increment(1);
}

/// Serving path failures.
#[derive(Debug, Clone, Copy)]
pub enum ServerErrorKind {
    /// The resolver reported an error (best-effort response still sent).
    Query,
    /// Writing the response back to the client failed.
    Send,
}

/// Helper for timing operations.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

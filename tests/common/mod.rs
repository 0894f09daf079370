//! Shared test infrastructure for nameserver integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, RecordType};

use k8s_nameserver::config::{DnsConfig, HostsConfig, ReloadErrorPolicy};
use k8s_nameserver::{ConfigReader, Nameserver, Resolver};

// --- Constants ---

pub const FOO_CONFIG: &str = r#"{"hosts":{"foo.bar.ts.net.": ["10.20.30.40"]}}"#;
pub const BAZ_CONFIG: &str = r#"{"hosts":{"baz.bar.ts.net.": ["10.40.30.20"]}}"#;

// --- Swappable config source ---

/// In-memory config source whose contents tests can replace at will.
#[derive(Clone, Default)]
pub struct SharedReader {
    raw: Arc<Mutex<Option<Vec<u8>>>>,
}

impl SharedReader {
    pub fn with(raw: &str) -> Self {
        let reader = Self::default();
        reader.set(raw);
        reader
    }

    pub fn set(&self, raw: &str) {
        *self.raw.lock().unwrap() = Some(raw.as_bytes().to_vec());
    }

    pub fn clear(&self) {
        *self.raw.lock().unwrap() = None;
    }
}

impl ConfigReader for SharedReader {
    fn read_config(&self) -> io::Result<Option<Vec<u8>>> {
        Ok(self.raw.lock().unwrap().clone())
    }
}

// --- Builders ---

pub fn test_hosts_config(policy: ReloadErrorPolicy) -> HostsConfig {
    HostsConfig {
        on_reload_error: policy,
        ..HostsConfig::default()
    }
}

pub fn build_nameserver(reader: SharedReader, policy: ReloadErrorPolicy) -> Arc<Nameserver> {
    Arc::new(Nameserver::new(
        reader,
        Resolver::new(DnsConfig::default()),
        &test_hosts_config(policy),
    ))
}

pub fn test_src() -> SocketAddr {
    "10.40.30.20:12345".parse().unwrap()
}

// --- Query construction ---

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Run a query through the nameserver and parse the response.
pub async fn execute_query(
    nameserver: &Nameserver,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    let bytes = build_query_bytes(name, record_type, id);
    let response = match nameserver.query(&bytes, test_src()).await {
        Ok(response) => response,
        Err(e) => e.response,
    };
    Message::from_vec(&response).expect("failed to parse DNS response")
}

// --- Response helpers ---

/// Extract A addresses from a response.
pub fn extract_a_ips(msg: &Message) -> Vec<Ipv4Addr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(Ipv4Addr::from(*a)),
            _ => None,
        })
        .collect()
}

/// Extract every A and AAAA address from a response.
pub fn extract_ips(msg: &Message) -> Vec<IpAddr> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(IpAddr::V4(Ipv4Addr::from(*a))),
            RData::AAAA(aaaa) => Some(IpAddr::V6((*aaaa).into())),
            _ => None,
        })
        .collect()
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}

/// Assert response is successful with exactly the expected IPv4 addresses.
pub fn assert_a_response(msg: &Message, expected_ips: &[Ipv4Addr]) {
    assert_response_code(msg, ResponseCode::NoError);
    let mut actual = extract_a_ips(msg);
    actual.sort();
    let mut expected: Vec<Ipv4Addr> = expected_ips.to_vec();
    expected.sort();
    assert_eq!(
        actual, expected,
        "A records mismatch.\nactual:   {:?}\nexpected: {:?}",
        actual, expected
    );
}

// --- Timing ---

/// Poll `check` until it holds, panicking after `timeout`.
pub async fn wait_for<F, Fut>(timeout: Duration, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {:?}",
            timeout
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

//! Real UDP loopback tests: a `UdpServer` bound to an ephemeral port on
//! 127.0.0.1, queried with plain UDP sockets.

mod common;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::RecordType;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use k8s_nameserver::config::{DnsConfig, ReloadErrorPolicy};
use k8s_nameserver::{DnsError, Nameserver, Shutdown, UdpServer};

use common::*;

/// A nameserver listening on a random loopback port.
struct TestServer {
    addr: SocketAddr,
    shutdown: Shutdown,
    handle: JoinHandle<Result<(), DnsError>>,
}

impl TestServer {
    async fn start(nameserver: Arc<Nameserver>, config: DnsConfig) -> Self {
        let server = UdpServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .expect("failed to bind UDP socket");
        let addr = server.local_addr().unwrap();
        let shutdown = Shutdown::new();

        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move { server.run(nameserver, &config, shutdown).await })
        };

        Self {
            addr,
            shutdown,
            handle,
        }
    }

    async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap();
    }
}

async fn exchange(server: SocketAddr, payload: &[u8]) -> Message {
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(payload, server).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let (n, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
        .await
        .expect("no response from server")
        .unwrap();
    Message::from_vec(&buf[..n]).expect("failed to parse DNS response")
}

fn ready_nameserver(raw: &str) -> Arc<Nameserver> {
    let ns = build_nameserver(SharedReader::with(raw), ReloadErrorPolicy::Exit);
    ns.initialize().unwrap();
    ns
}

#[tokio::test]
async fn test_udp_query_round_trip() {
    let server = TestServer::start(ready_nameserver(FOO_CONFIG), DnsConfig::default()).await;

    let msg = exchange(
        server.addr,
        &build_query_bytes("foo.bar.ts.net.", RecordType::A, 4242),
    )
    .await;
    assert_eq!(msg.id(), 4242);
    assert!(msg.authoritative());
    assert_a_response(&msg, &[Ipv4Addr::new(10, 20, 30, 40)]);

    server.stop().await;
}

#[tokio::test]
async fn test_udp_unknown_name_is_nxdomain() {
    let server = TestServer::start(ready_nameserver(FOO_CONFIG), DnsConfig::default()).await;

    let msg = exchange(
        server.addr,
        &build_query_bytes("nope.bar.ts.net.", RecordType::A, 7),
    )
    .await;
    assert_response_code(&msg, ResponseCode::NXDomain);

    server.stop().await;
}

#[tokio::test]
async fn test_udp_garbage_gets_formerr() {
    let server = TestServer::start(ready_nameserver(FOO_CONFIG), DnsConfig::default()).await;

    let msg = exchange(server.addr, &[0xbe, 0xef, 0x01]).await;
    assert_eq!(msg.id(), 0xbeef);
    assert_response_code(&msg, ResponseCode::FormErr);

    // The loop keeps serving after a bad datagram.
    let msg = exchange(
        server.addr,
        &build_query_bytes("foo.bar.ts.net.", RecordType::A, 8),
    )
    .await;
    assert_a_response(&msg, &[Ipv4Addr::new(10, 20, 30, 40)]);

    server.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_udp_concurrent_queries_with_inflight_limit() {
    let config = DnsConfig {
        max_inflight: Some(2),
        ..DnsConfig::default()
    };
    let server = TestServer::start(ready_nameserver(FOO_CONFIG), config).await;

    let mut clients = Vec::new();
    for id in 0..16u16 {
        let addr = server.addr;
        clients.push(tokio::spawn(async move {
            let msg = exchange(addr, &build_query_bytes("foo.bar.ts.net.", RecordType::A, id)).await;
            assert_eq!(msg.id(), id);
            assert_a_response(&msg, &[Ipv4Addr::new(10, 20, 30, 40)]);
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_releases_socket() {
    let server = TestServer::start(ready_nameserver(FOO_CONFIG), DnsConfig::default()).await;
    let addr = server.addr;
    server.stop().await;

    // The listening socket is gone once the loop returns.
    UdpSocket::bind(addr)
        .await
        .expect("port still held after shutdown");
}

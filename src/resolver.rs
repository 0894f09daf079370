//! Query entry point: raw query bytes in, raw response bytes out.
//!
//! Wraps a Hickory `Catalog` holding a single [`HostsAuthority`] and runs
//! each decoded request through it with a [`BufferResponseHandler`] that
//! captures the serialized answer instead of writing to a socket.

use async_trait::async_trait;
use hickory_proto::op::{Message, OpCode, ResponseCode};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{AuthorityObject, Catalog, MessageRequest, MessageResponse};
use hickory_server::proto::rr::Record;
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::authority::HostsAuthority;
use crate::config::DnsConfig;
use crate::error::{DnsError, QueryError};
use crate::hosts::ResolverConfig;
use crate::state::HostTable;

/// Captures the serialized DNS response for the caller.
///
/// Implements `ResponseHandler` so it can be passed to `Catalog::handle_request()`.
#[derive(Clone, Default)]
pub struct BufferResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl BufferResponseHandler {
    /// Create an empty handler.
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Take the captured wire bytes. Empty if nothing was sent.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut *self.buf.lock())
    }
}

#[async_trait]
impl ResponseHandler for BufferResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

/// Resolution engine over the shared host table.
#[derive(Clone)]
pub struct Resolver {
    table: HostTable,
    catalog: Arc<Catalog>,
}

impl Resolver {
    /// Create a resolver serving an empty host table.
    pub fn new(config: DnsConfig) -> Self {
        Self::with_table(config, HostTable::new())
    }

    /// Create a resolver over an existing table.
    pub fn with_table(config: DnsConfig, table: HostTable) -> Self {
        let authority = HostsAuthority::new(config, table.clone());
        let origin = authority.origin().clone();
        let authority: Arc<dyn AuthorityObject> = Arc::new(authority);

        let mut catalog = Catalog::new();
        catalog.upsert(origin, vec![authority]);

        Self {
            table,
            catalog: Arc::new(catalog),
        }
    }

    /// The host table this resolver reads from.
    pub fn table(&self) -> &HostTable {
        &self.table
    }

    /// Atomically replace the host table. Safe to call while queries run.
    pub fn set_config(&self, config: ResolverConfig) -> bool {
        self.table.set_config(config)
    }

    /// Answer one wire-format query.
    ///
    /// On failure the error still carries a response (FORMERR or SERVFAIL)
    /// that should be sent to the client.
    pub async fn query(&self, payload: &[u8], src: SocketAddr) -> Result<Vec<u8>, QueryError> {
        let mut decoder = BinDecoder::new(payload);
        let message = match MessageRequest::read(&mut decoder) {
            Ok(message) => message,
            Err(e) => {
                debug!(%src, len = payload.len(), "failed to parse DNS query: {}", e);
                let response = error_response(query_id(payload), ResponseCode::FormErr)?;
                return Err(QueryError::new(response, e));
            }
        };

        let id = message.id();
        let op_code = message.op_code();
        let request = Request::new(message, src, Protocol::Udp);
        let handler = BufferResponseHandler::new();
        let info = self.catalog.handle_request(&request, handler.clone()).await;

        let response = handler.take();
        if response.is_empty() {
            let fallback = error_response_with(id, op_code, ResponseCode::ServFail)?;
            return Err(QueryError::new(
                fallback,
                DnsError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    "resolver produced no response",
                )),
            ));
        }

        trace!(%src, id, rcode = ?info.response_code(), len = response.len(), "answered query");
        Ok(response)
    }
}

/// Message id of a query, if at least the id was received.
fn query_id(payload: &[u8]) -> u16 {
    match payload {
        [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
        _ => 0,
    }
}

fn error_response(id: u16, code: ResponseCode) -> Result<Vec<u8>, QueryError> {
    error_response_with(id, OpCode::Query, code)
}

fn error_response_with(id: u16, op_code: OpCode, code: ResponseCode) -> Result<Vec<u8>, QueryError> {
    Message::error_msg(id, op_code, code)
        .to_vec()
        .map_err(|e| QueryError::new(Vec::new(), e))
}

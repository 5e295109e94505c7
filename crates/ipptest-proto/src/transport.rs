// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request transport: IPP over HTTP/1.1 POST (RFC 8010 SS3, RFC 7230).
//
// `HttpTransport` posts through reqwest, keeping one keep-alive connection
// to the target and retrying once when a kept-alive connection turned stale.
// `MockTransport` replays scripted replies for tests.

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream;
use reqwest::header::{ACCEPT_ENCODING, CONTENT_TYPE, DATE, HeaderMap, HeaderName};
use reqwest::{StatusCode, Version};
use tracing::{debug, instrument, warn};

use ipptest_core::error::{IppTestError, Result};
use ipptest_core::types::AddressFamily;

use crate::codec::{self, Decoded};
use crate::message::Message;
use crate::tags::STATUS_INTERNAL_ERROR;
use crate::uri::UriParts;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum bytes accepted for a single HTTP response body.
const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024; // 64 MiB

/// Size of each chunk when streaming a document with chunked framing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Time allowed for establishing a TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Media type of IPP message bodies.
pub const IPP_MIME_TYPE: &str = "application/ipp";

// ---------------------------------------------------------------------------
// Request / exchange types
// ---------------------------------------------------------------------------

/// One IPP request ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub message: Message,
    /// HTTP request target, e.g. `/ipp/print`.
    pub resource: String,
    /// Document appended after the IPP message.
    pub document: Option<PathBuf>,
    pub chunked: bool,
}

/// What came back for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Exchange {
    pub http_version: (u8, u8),
    pub http_status: u16,
    pub content_type: Option<String>,
    /// Raw `Date` header.
    pub date: Option<String>,
    pub response: Option<Decoded>,
    /// IPP status code and message explaining a missing response.
    pub failure: Option<(u16, String)>,
}

impl Exchange {
    /// A well-formed HTTP 200 exchange carrying `message`.
    pub fn from_message(message: &Message) -> Result<Self> {
        let bytes = codec::encode(message)?;
        Ok(Self {
            http_version: (1, 1),
            http_status: 200,
            content_type: Some(IPP_MIME_TYPE.to_string()),
            date: Some(http_date()),
            response: Some(codec::decode(&bytes)?),
            failure: None,
        })
    }

    /// An exchange that produced no IPP response.
    pub fn failed(status: u16, message: impl Into<String>) -> Self {
        Self {
            http_version: (1, 1),
            failure: Some((status, message.into())),
            ..Default::default()
        }
    }
}

/// Current time as an HTTP date (RFC 7231 SS7.1.1.1).
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// IPP status reported when HTTP itself failed.
fn ipp_status_for_http(status: u16) -> u16 {
    match status {
        400 => 0x0400,
        401 => 0x0402,
        403 => 0x0401,
        404 => 0x0406,
        413 => 0x0408,
        _ => STATUS_INTERNAL_ERROR,
    }
}

/// Sends requests and collects responses.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&mut self, request: &Request) -> Result<Exchange>;
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// IPP-over-HTTP client for `ipp://` and `http://` targets.
///
/// Built on a `reqwest::Client` limited to one idle connection, so the tests
/// of a run share a keep-alive connection to the target.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    host: String,
    port: u16,
    io_timeout: Option<Duration>,
    /// Whether a request has completed, i.e. a pooled connection may exist.
    used: bool,
}

impl HttpTransport {
    /// Create a transport for the target URI. Nothing connects until the
    /// first request.
    pub fn new(uri: &UriParts, family: AddressFamily, io_timeout: Option<Duration>) -> Result<Self> {
        match uri.scheme.to_ascii_lowercase().as_str() {
            "ipp" | "http" => {}
            "ipps" | "https" => {
                return Err(IppTestError::Unsupported(format!(
                    "encrypted connections ({}://) are not supported",
                    uri.scheme
                )));
            }
            other => {
                return Err(IppTestError::Unsupported(format!("URI scheme \"{other}\"")));
            }
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("ipptest/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_max_idle_per_host(1)
            .no_proxy();
        builder = match family {
            AddressFamily::Any => builder,
            AddressFamily::Ipv4 => builder.local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            AddressFamily::Ipv6 => builder.local_address(IpAddr::V6(Ipv6Addr::UNSPECIFIED)),
        };
        if let Some(limit) = io_timeout {
            builder = builder.timeout(limit);
        }
        let client = builder
            .build()
            .map_err(|e| IppTestError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            host: uri.host_without_dot().to_string(),
            port: uri.port,
            io_timeout,
            used: false,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// `http://host:port/resource` for a request target.
    fn url(&self, resource: &str) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        let slash = if resource.starts_with('/') { "" } else { "/" };
        format!("http://{host}:{}{slash}{resource}", self.port)
    }

    fn transport_error(&self, err: &reqwest::Error) -> IppTestError {
        match self.io_timeout {
            Some(limit) if err.is_timeout() => {
                IppTestError::Transport(format!("timed out after {}s", limit.as_secs_f64()))
            }
            _ => IppTestError::Transport(err.to_string()),
        }
    }

    async fn round_trip(&self, url: &str, payload: &[u8], chunked: bool) -> Result<Exchange> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, IPP_MIME_TYPE)
            .header(ACCEPT_ENCODING, "identity")
            .body(request_body(payload, chunked))
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;
        read_response(response).await.map_err(|e| match e {
            ReadError::Http(e) => self.transport_error(&e),
            ReadError::Other(e) => e,
        })
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(resource = %request.resource, request_id = request.message.request_id))]
    async fn send(&mut self, request: &Request) -> Result<Exchange> {
        let mut payload = codec::encode(&request.message)?;
        if let Some(path) = &request.document {
            payload.extend(tokio::fs::read(path).await?);
        }
        let url = self.url(&request.resource);

        let result = match self.round_trip(&url, &payload, request.chunked).await {
            Err(e) if self.used => {
                warn!(error = %e, "request on kept-alive connection failed, retrying");
                self.round_trip(&url, &payload, request.chunked).await
            }
            result => result,
        };
        self.used = result.is_ok();
        result
    }
}

/// Length-framed body, or a chunked one streamed in `CHUNK_SIZE` pieces.
fn request_body(payload: &[u8], chunked: bool) -> reqwest::Body {
    if !chunked {
        return reqwest::Body::from(payload.to_vec());
    }
    let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> =
        payload.chunks(CHUNK_SIZE).map(|c| Ok(c.to_vec())).collect();
    reqwest::Body::wrap_stream(stream::iter(chunks))
}

// ---------------------------------------------------------------------------
// HTTP response handling
// ---------------------------------------------------------------------------

enum ReadError {
    Http(reqwest::Error),
    Other(IppTestError),
}

fn version_numbers(version: Version) -> (u8, u8) {
    [
        (Version::HTTP_09, (0, 9)),
        (Version::HTTP_10, (1, 0)),
        (Version::HTTP_2, (2, 0)),
        (Version::HTTP_3, (3, 0)),
    ]
    .into_iter()
    .find(|(v, _)| *v == version)
    .map_or((1, 1), |(_, numbers)| numbers)
}

fn header_text(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Turn an HTTP response into an exchange, decoding the IPP body of a 200.
async fn read_response(mut response: reqwest::Response) -> std::result::Result<Exchange, ReadError> {
    let status = response.status();
    let mut exchange = Exchange {
        http_version: version_numbers(response.version()),
        http_status: status.as_u16(),
        content_type: header_text(response.headers(), CONTENT_TYPE),
        date: header_text(response.headers(), DATE),
        ..Default::default()
    };

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(ReadError::Http)? {
        if body.len() + chunk.len() > MAX_RESPONSE_BYTES {
            return Err(ReadError::Other(IppTestError::Transport(
                "response exceeds size limit".into(),
            )));
        }
        body.extend_from_slice(&chunk);
    }
    debug!(status = status.as_u16(), bytes = body.len(), "HTTP response received");

    if status != StatusCode::OK {
        let reason = status.canonical_reason().unwrap_or_default();
        exchange.failure = Some((
            ipp_status_for_http(status.as_u16()),
            format!("HTTP {} {reason}", status.as_u16()).trim_end().to_string(),
        ));
        return Ok(exchange);
    }

    match codec::decode(&body) {
        Ok(decoded) => exchange.response = Some(decoded),
        Err(e) => exchange.failure = Some((STATUS_INTERNAL_ERROR, e.to_string())),
    }
    Ok(exchange)
}

// ---------------------------------------------------------------------------
// Mock transport
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum ScriptedReply {
    Message(Message),
    Exchange(Exchange),
    Error(String),
}

/// Transport that replays scripted replies in order and records every
/// request it was asked to send.
#[derive(Debug)]
pub struct MockTransport {
    replies: VecDeque<ScriptedReply>,
    sent: Vec<Request>,
    echo_request_id: bool,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Replies carry the request's request-id unless `keep_request_ids`
    /// is called.
    pub fn new() -> Self {
        Self {
            replies: VecDeque::new(),
            sent: Vec::new(),
            echo_request_id: true,
        }
    }

    pub fn reply(&mut self, message: Message) -> &mut Self {
        self.replies.push_back(ScriptedReply::Message(message));
        self
    }

    pub fn reply_exchange(&mut self, exchange: Exchange) -> &mut Self {
        self.replies.push_back(ScriptedReply::Exchange(exchange));
        self
    }

    /// Fail the next send with a transport error.
    pub fn fail(&mut self, reason: &str) -> &mut Self {
        self.replies.push_back(ScriptedReply::Error(reason.to_string()));
        self
    }

    pub fn keep_request_ids(&mut self) -> &mut Self {
        self.echo_request_id = false;
        self
    }

    pub fn sent(&self) -> &[Request] {
        &self.sent
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl Transport for MockTransport {
    async fn send(&mut self, request: &Request) -> Result<Exchange> {
        self.sent.push(request.clone());
        match self.replies.pop_front() {
            Some(ScriptedReply::Message(mut message)) => {
                if self.echo_request_id {
                    message.request_id = request.message.request_id;
                }
                Exchange::from_message(&message)
            }
            Some(ScriptedReply::Exchange(exchange)) => Ok(exchange),
            Some(ScriptedReply::Error(reason)) => Err(IppTestError::Transport(reason)),
            None => Err(IppTestError::Transport("no scripted reply left".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageBuilder;
    use crate::tags::GroupTag;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn get_printer_attributes(request_id: i32) -> Request {
        Request {
            message: MessageBuilder::new(0x000B, request_id)
                .standard_operation_attrs()
                .uri("printer-uri", "ipp://127.0.0.1/ipp/print")
                .build(),
            resource: "/ipp/print".into(),
            document: None,
            chunked: false,
        }
    }

    /// What the test server saw of one request.
    #[derive(Debug)]
    struct Received {
        head: String,
        body: Vec<u8>,
    }

    fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    async fn read_more(socket: &mut TcpStream, buf: &mut Vec<u8>) {
        let mut chunk = [0u8; 4096];
        let n = socket.read(&mut chunk).await.expect("read");
        assert!(n > 0, "client closed early");
        buf.extend_from_slice(&chunk[..n]);
    }

    /// Read one request, either length-framed or chunked.
    async fn read_request(socket: &mut TcpStream) -> Received {
        let mut buf = Vec::new();
        let header_end = loop {
            if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
                break pos;
            }
            read_more(socket, &mut buf).await;
        };
        let head = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
        let mut rest = buf.split_off(header_end + 4);

        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok());
        let body = match length {
            Some(length) => {
                while rest.len() < length {
                    read_more(socket, &mut rest).await;
                }
                rest.truncate(length);
                rest
            }
            None => {
                while find_subsequence(&rest, b"0\r\n\r\n").is_none() {
                    read_more(socket, &mut rest).await;
                }
                let mut body = Vec::new();
                let mut pos = 0;
                loop {
                    let line_end = pos + find_subsequence(&rest[pos..], b"\r\n").expect("chunk size");
                    let size_text = String::from_utf8_lossy(&rest[pos..line_end]).to_string();
                    let size = usize::from_str_radix(size_text.trim(), 16).expect("hex size");
                    if size == 0 {
                        break body;
                    }
                    body.extend_from_slice(&rest[line_end + 2..line_end + 2 + size]);
                    pos = line_end + 2 + size + 2;
                }
            }
        };
        Received { head, body }
    }

    /// Answer `requests` requests, one per connection, echoing the
    /// request-id. `status` other than 200 sends an HTML error instead.
    async fn serve(listener: TcpListener, requests: usize, status: u16) -> Vec<Received> {
        let mut seen = Vec::new();
        for _ in 0..requests {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let received = read_request(&mut socket).await;
            let request = codec::decode(&received.body).expect("valid request").message;
            seen.push(received);

            let (content_type, body) = if status == 200 {
                let reply = MessageBuilder::new(0x0000, request.request_id)
                    .standard_operation_attrs()
                    .begin_group(GroupTag::PRINTER)
                    .keyword("printer-state-reasons", "none")
                    .build();
                (IPP_MIME_TYPE, codec::encode(&reply).expect("encode"))
            } else {
                ("text/html", b"<h1>no</h1>".to_vec())
            };
            let head = format!(
                "HTTP/1.1 {status} Whatever\r\nContent-Type: {content_type}\r\nDate: {}\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n",
                http_date(),
                body.len()
            );
            socket.write_all(head.as_bytes()).await.expect("write head");
            socket.write_all(&body).await.expect("write body");
            socket.shutdown().await.expect("shutdown");
        }
        seen
    }

    async fn local_server(requests: usize, status: u16) -> (u16, tokio::task::JoinHandle<Vec<Received>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        (port, tokio::spawn(serve(listener, requests, status)))
    }

    #[tokio::test]
    async fn http_round_trips_decode_responses() {
        let (port, server) = local_server(2, 200).await;
        let uri = UriParts::parse(&format!("ipp://127.0.0.1:{port}/ipp/print")).expect("uri");
        let mut transport = HttpTransport::new(&uri, AddressFamily::Any, Some(Duration::from_secs(5)))
            .expect("transport");

        for id in [11, 12] {
            let exchange = transport.send(&get_printer_attributes(id)).await.expect("send");
            assert_eq!(exchange.http_version, (1, 1));
            assert_eq!(exchange.http_status, 200);
            assert_eq!(exchange.content_type.as_deref(), Some(IPP_MIME_TYPE));
            assert!(exchange.date.is_some());
            let decoded = exchange.response.expect("response");
            assert!(decoded.terminated);
            assert_eq!(decoded.message.request_id, id);
        }

        let seen = server.await.expect("server task");
        assert_eq!(seen.len(), 2);
        assert!(seen[0].head.starts_with("post /ipp/print http/1.1"));
        assert!(seen[0].head.contains("content-type: application/ipp"));
        assert!(seen[0].head.contains("content-length:"));
    }

    #[tokio::test]
    async fn chunked_requests_carry_message_and_document() {
        let document = tempfile::NamedTempFile::new().expect("temp file");
        std::fs::write(document.path(), vec![b'x'; CHUNK_SIZE + 10]).expect("write document");

        let (port, server) = local_server(1, 200).await;
        let uri = UriParts::parse(&format!("http://127.0.0.1:{port}/")).expect("uri");
        let mut transport = HttpTransport::new(&uri, AddressFamily::Ipv4, None).expect("transport");

        let mut request = get_printer_attributes(5);
        request.chunked = true;
        request.document = Some(document.path().to_path_buf());
        let exchange = transport.send(&request).await.expect("send");
        let decoded = exchange.response.expect("response");
        assert!(decoded.message.find("printer-state-reasons").is_some());

        let seen = server.await.expect("server task");
        assert!(seen[0].head.contains("transfer-encoding: chunked"));
        let message = codec::encode(&request.message).expect("encode");
        assert_eq!(seen[0].body.len(), message.len() + CHUNK_SIZE + 10);
        assert_eq!(&seen[0].body[..message.len()], message.as_slice());
    }

    #[tokio::test]
    async fn http_errors_map_to_ipp_status() {
        let (port, server) = local_server(1, 404).await;
        let uri = UriParts::parse(&format!("ipp://127.0.0.1:{port}/nope")).expect("uri");
        let mut transport = HttpTransport::new(&uri, AddressFamily::Any, None).expect("transport");

        let exchange = transport.send(&get_printer_attributes(1)).await.expect("send");
        assert_eq!(exchange.http_status, 404);
        assert!(exchange.response.is_none());
        let (status, message) = exchange.failure.expect("failure");
        assert_eq!(status, 0x0406);
        assert_eq!(message, "HTTP 404 Not Found");
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn refused_connections_are_transport_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let uri = UriParts::parse(&format!("ipp://127.0.0.1:{port}/ipp/print")).expect("uri");
        let mut transport = HttpTransport::new(&uri, AddressFamily::Any, None).expect("transport");
        let err = transport.send(&get_printer_attributes(1)).await.expect_err("refused");
        assert!(matches!(err, IppTestError::Transport(_)));
    }

    #[test]
    fn encrypted_schemes_are_rejected() {
        let uri = UriParts::parse("ipps://printer.local/ipp/print").expect("uri");
        let err = HttpTransport::new(&uri, AddressFamily::Any, None).expect_err("ipps");
        assert!(matches!(err, IppTestError::Unsupported(_)));
    }

    #[test]
    fn urls_bracket_ipv6_hosts() {
        let uri = UriParts::parse("ipp://printer.local./ipp/print").expect("uri");
        let transport = HttpTransport::new(&uri, AddressFamily::Any, None).expect("transport");
        assert_eq!(transport.host(), "printer.local");
        assert_eq!(transport.url("/ipp/print"), "http://printer.local:631/ipp/print");
        assert_eq!(transport.url("ipp/print"), "http://printer.local:631/ipp/print");

        let uri = UriParts::parse("ipp://[::1]:8631/ipp/print").expect("uri");
        let transport = HttpTransport::new(&uri, AddressFamily::Ipv6, None).expect("transport");
        assert_eq!(transport.url("/"), "http://[::1]:8631/");
        assert_eq!(version_numbers(Version::HTTP_10), (1, 0));
        assert_eq!(ipp_status_for_http(401), 0x0402);
    }

    #[tokio::test]
    async fn mock_replays_in_order_and_echoes_ids() {
        let mut mock = MockTransport::new();
        mock.reply(MessageBuilder::new(0, 999).standard_operation_attrs().build())
            .fail("connection reset");

        let first = mock.send(&get_printer_attributes(7)).await.expect("first reply");
        assert_eq!(first.response.expect("response").message.request_id, 7);
        let second = mock.send(&get_printer_attributes(8)).await;
        assert!(matches!(second, Err(IppTestError::Transport(_))));
        assert!(mock.send(&get_printer_attributes(9)).await.is_err());
        assert_eq!(mock.sent().len(), 3);
        assert_eq!(mock.remaining(), 0);
    }
}

// Binary framing used over UDP.
//
// Request:  [opcode: u8 = 0][payload_len: u8][payload]
// Response: [opcode: u8][status: u8][payload_len: u8][payload]
//
// One datagram carries exactly one frame, so the codec never has to wait for
// more bytes the way a stream decoder does.

use super::{Reply, Transport};
use crate::{Error, Result};
use atoi::FromRadix10SignedChecked;
use bytes::{BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::udp::UdpFramed;
use tracing::debug;

pub const OPCODE_REQUEST: u8 = 0;
pub const OPCODE_RESPONSE: u8 = 1;
pub const STATUS_OK: u8 = 0;
pub const STATUS_ERROR: u8 = 1;

/// Largest request payload the client will put on the wire.
pub const MAX_PAYLOAD_LEN: usize = 253;

pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

const REQUEST_HEADER_LEN: usize = 2;
const RESPONSE_HEADER_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    payload: Bytes,
}

impl Request {
    /// Build a computation request from one input line. A single trailing
    /// line break is not part of the expression.
    pub fn new(expression: &str) -> Result<Self> {
        let expression = match expression.strip_suffix('\n') {
            Some(s) => s.strip_suffix('\r').unwrap_or(s),
            None => expression,
        };
        Self::from_payload(Bytes::copy_from_slice(expression.as_bytes()))
    }

    fn from_payload(payload: Bytes) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self { payload })
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Server-side view of a request datagram.
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        let [opcode, len, payload @ ..] = datagram else {
            return Err(Error::Other("request shorter than its header".into()));
        };
        if *opcode != OPCODE_REQUEST {
            return Err(Error::Other(format!("unexpected request opcode {opcode}")));
        }
        if payload.len() != *len as usize {
            return Err(Error::Other(format!(
                "request declares {len} payload bytes but carries {}",
                payload.len()
            )));
        }
        Self::from_payload(Bytes::copy_from_slice(payload))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub opcode: u8,
    pub status: u8,
    pub payload: String,
}

/// The printable result of a response.
#[derive(derive_more::Display, Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    #[display("OK:{_0}")]
    Ok(i64),
    #[display("ERR:{_0}")]
    Err(String),
}

impl Response {
    pub fn ok(value: i64) -> Self {
        Self {
            opcode: OPCODE_RESPONSE,
            status: STATUS_OK,
            payload: value.to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            opcode: OPCODE_RESPONSE,
            status: STATUS_ERROR,
            payload: message.into(),
        }
    }

    /// The payload is exactly `payload_len` bytes. Anything after it is
    /// ignored, trailing NULs inside it are dropped.
    pub fn parse(datagram: &[u8]) -> Result<Self> {
        let [opcode, status, len, rest @ ..] = datagram else {
            return Err(Error::MalformedResponse(format!(
                "{} byte datagram is shorter than the {RESPONSE_HEADER_LEN} byte header",
                datagram.len()
            )));
        };
        let len = *len as usize;
        let Some(payload) = rest.get(..len) else {
            return Err(Error::MalformedResponse(format!(
                "declared payload length {len} but only {} bytes present",
                rest.len()
            )));
        };

        Ok(Self {
            opcode: *opcode,
            status: *status,
            payload: String::from_utf8_lossy(payload)
                .trim_end_matches('\0')
                .to_string(),
        })
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        let payload = self.payload.as_bytes();
        let len = u8::try_from(payload.len()).map_err(|_| Error::PayloadTooLarge {
            len: payload.len(),
            max: u8::MAX as usize,
        })?;

        let mut buf = BytesMut::with_capacity(RESPONSE_HEADER_LEN + payload.len());
        buf.put_u8(self.opcode);
        buf.put_u8(self.status);
        buf.put_u8(len);
        buf.put_slice(payload);
        Ok(buf.freeze())
    }

    pub fn outcome(&self) -> Result<Outcome> {
        if self.opcode == OPCODE_RESPONSE && self.status == STATUS_OK {
            parse_decimal(&self.payload).map(Outcome::Ok)
        } else {
            Ok(Outcome::Err(self.payload.clone()))
        }
    }
}

fn parse_decimal(text: &str) -> Result<i64> {
    let digits = text.trim_matches(|c: char| c.is_ascii_whitespace()).as_bytes();
    match i64::from_radix_10_signed_checked(digits) {
        (Some(n), used) if used == digits.len() && digits.iter().any(u8::is_ascii_digit) => Ok(n),
        _ => Err(Error::MalformedResponse(format!(
            "expected a decimal integer, got {text:?}"
        ))),
    }
}

#[derive(Debug, Default)]
pub struct DatagramCodec;

impl Encoder<Request> for DatagramCodec {
    type Error = crate::Error;

    fn encode(&mut self, item: Request, dst: &mut BytesMut) -> Result<()> {
        // the length byte must never wrap
        let len = u8::try_from(item.payload.len()).map_err(|_| Error::PayloadTooLarge {
            len: item.payload.len(),
            max: MAX_PAYLOAD_LEN,
        })?;

        dst.reserve(REQUEST_HEADER_LEN + item.payload.len());
        dst.put_u8(OPCODE_REQUEST);
        dst.put_u8(len);
        dst.put_slice(&item.payload);
        Ok(())
    }
}

impl Decoder for DatagramCodec {
    type Item = Response;
    type Error = crate::Error;

    // UdpFramed hands over one whole datagram at a time.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.is_empty() {
            return Ok(None);
        }
        let datagram = src.split();
        Response::parse(&datagram).map(Some)
    }
}

pub struct DatagramClient {
    framed: UdpFramed<DatagramCodec>,
    server: SocketAddr,
}

impl DatagramClient {
    /// Bind an ephemeral local socket of the server's address family.
    pub async fn bind(server: SocketAddr) -> Result<Self> {
        let local: SocketAddr = if server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(Error::Connection)?;
        Ok(Self::new(socket, server))
    }

    pub fn new(socket: UdpSocket, server: SocketAddr) -> Self {
        Self {
            framed: UdpFramed::new(socket, DatagramCodec),
            server,
        }
    }
}

impl Transport for DatagramClient {
    async fn send(&mut self, line: &str) -> Result<()> {
        let request = Request::new(line)?;
        debug!(server = %self.server, len = request.payload.len(), "sending request");
        self.framed
            .send((request, self.server))
            .await
            .map_err(Error::on_send)
    }

    async fn recv(&mut self) -> Result<Reply> {
        let received = timeout(RESPONSE_TIMEOUT, self.framed.next())
            .await
            .map_err(|_| Error::ResponseTimeout(RESPONSE_TIMEOUT))?;

        let Some(received) = received else {
            return Err(Error::ReceiveFailure(io::ErrorKind::UnexpectedEof.into()));
        };
        let (response, from) = received.map_err(Error::on_receive)?;
        debug!(%from, opcode = response.opcode, status = response.status, "received response");

        Ok(Reply::Line(format!("{}\n", response.outcome()?)))
    }

    // Connectionless: there is nobody to say goodbye to.
    async fn interrupt(&mut self) -> Result<()> {
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

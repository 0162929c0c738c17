// Unframed text over TCP: a request is the raw input line, a reply is
// whatever a single read returns.

use super::{Reply, Transport};
use crate::{Error, Result};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

pub const READ_BUF_LEN: usize = 1024;

/// Sent when the client leaves on its own, and replied by a server that ends
/// the session.
pub const BYE: &str = "BYE";

pub struct StreamClient<S> {
    stream: S,
    buf: [u8; READ_BUF_LEN],
}

impl<S> StreamClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: [0; READ_BUF_LEN],
        }
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await.map_err(Error::SendFailure)?;
        self.stream.flush().await.map_err(Error::SendFailure)
    }
}

/// Text of a reply: everything before the first NUL.
pub fn reply_text(received: &[u8]) -> String {
    let end = received
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(received.len());
    String::from_utf8_lossy(&received[..end]).into_owned()
}

/// The server ends a session by answering `BYE` (padding aside).
pub fn is_terminal(text: &str) -> bool {
    text.trim_end() == BYE
}

impl<S> Transport for StreamClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send(&mut self, line: &str) -> Result<()> {
        debug!(len = line.len(), "sending request");
        self.write(line.as_bytes()).await
    }

    // One read is one reply. A reply split across reads is not reassembled.
    async fn recv(&mut self) -> Result<Reply> {
        let n = self
            .stream
            .read(&mut self.buf)
            .await
            .map_err(Error::ReceiveFailure)?;
        if n == 0 {
            return Err(Error::ReceiveFailure(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            )));
        }

        let text = reply_text(&self.buf[..n]);
        debug!(len = n, "received reply");
        if is_terminal(&text) {
            Ok(Reply::Terminal(text))
        } else {
            Ok(Reply::Line(text))
        }
    }

    async fn interrupt(&mut self) -> Result<()> {
        self.write(BYE.as_bytes()).await
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

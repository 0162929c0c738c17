pub mod datagram;
pub mod stream;

use crate::Result;
use std::future::Future;

/// What the session should do with a decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print the text as-is and wait for the next input line.
    Line(String),
    /// Print the text, then the server is done with us.
    Terminal(String),
}

/// One request/response exchange over a concrete transport.
///
/// The session drives it strictly in order: `send`, then `recv`, then the
/// next line. Nothing is pipelined.
pub trait Transport {
    /// Encode one input line and put it on the wire.
    fn send(&mut self, line: &str) -> impl Future<Output = Result<()>>;

    /// Wait for and decode the reply to the last request.
    fn recv(&mut self) -> impl Future<Output = Result<Reply>>;

    /// Tell the server the client is leaving. Must not wait for a reply.
    fn interrupt(&mut self) -> impl Future<Output = Result<()>>;

    fn close(&mut self) -> impl Future<Output = Result<()>>;
}

use crate::cmd::{Config, Mode};
use crate::protocol::datagram::DatagramClient;
use crate::protocol::stream::{BYE, StreamClient};
use crate::protocol::{Reply, Transport};
use crate::{Error, Result};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// Why a session stopped without an error.
#[derive(derive_more::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    #[display("end of input")]
    EndOfInput,
    #[display("server said BYE")]
    ServerBye,
    #[display("interrupted")]
    Interrupted,
}

/// Connect according to `config` and run one session on stdin/stdout.
pub async fn run(config: Config) -> Result<SessionEnd> {
    let input = BufReader::new(tokio::io::stdin());
    let output = tokio::io::stdout();

    match config.mode {
        Mode::Tcp => {
            let stream = TcpStream::connect(config.server)
                .await
                .map_err(Error::Connection)?;
            info!("connected to {}", config.server);
            let mut client = StreamClient::new(stream);
            run_session(&mut client, input, output, ctrl_c()).await
        }
        Mode::Udp => {
            let mut client = DatagramClient::bind(config.server).await?;
            info!("sending datagrams to {}", config.server);
            // no interrupt hook: SIGINT keeps its default behaviour
            run_session(&mut client, input, output, std::future::pending()).await
        }
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for interrupt: {e}");
        std::future::pending::<()>().await;
    }
}

/// Read lines from `input` and exchange each one over `transport`, writing
/// replies to `output`, until input ends, the server says BYE or
/// `interrupt` resolves.
pub async fn run_session<T, I, O, F>(
    transport: &mut T,
    mut input: I,
    mut output: O,
    interrupt: F,
) -> Result<SessionEnd>
where
    T: Transport,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
    F: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut line = String::new();

    loop {
        line.clear();
        let read = tokio::select! {
            biased;
            _ = &mut interrupt => None,
            read = input.read_line(&mut line) => Some(read?),
        };
        let Some(read) = read else {
            return leave(transport, &mut output).await;
        };
        if read == 0 {
            transport.close().await?;
            return Ok(SessionEnd::EndOfInput);
        }

        transport.send(&line).await?;

        let reply = tokio::select! {
            biased;
            _ = &mut interrupt => None,
            reply = transport.recv() => Some(reply?),
        };
        let Some(reply) = reply else {
            return leave(transport, &mut output).await;
        };

        match reply {
            Reply::Line(text) => {
                output.write_all(text.as_bytes()).await?;
                output.flush().await?;
            }
            Reply::Terminal(text) => {
                output.write_all(text.as_bytes()).await?;
                output.flush().await?;
                debug!("server ended the session");
                transport.close().await?;
                return Ok(SessionEnd::ServerBye);
            }
        }
    }
}

async fn leave<T, O>(transport: &mut T, output: &mut O) -> Result<SessionEnd>
where
    T: Transport,
    O: AsyncWrite + Unpin,
{
    transport.interrupt().await?;
    output.write_all(format!("\n{BYE}\n").as_bytes()).await?;
    output.flush().await?;
    transport.close().await?;
    Ok(SessionEnd::Interrupted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Records what the session asks of it and answers from a script.
    #[derive(Default)]
    struct ScriptedTransport {
        replies: VecDeque<Reply>,
        sent: Vec<String>,
        interrupted: bool,
        closed: bool,
        recv_calls: usize,
    }

    impl ScriptedTransport {
        fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: replies.into_iter().collect(),
                ..Default::default()
            }
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(&mut self, line: &str) -> Result<()> {
            self.sent.push(line.to_string());
            Ok(())
        }

        async fn recv(&mut self) -> Result<Reply> {
            self.recv_calls += 1;
            match self.replies.pop_front() {
                Some(reply) => Ok(reply),
                None => std::future::pending().await,
            }
        }

        async fn interrupt(&mut self) -> Result<()> {
            self.interrupted = true;
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn prints_one_reply_per_line() -> anyhow::Result<()> {
        let mut transport = ScriptedTransport::with_replies([
            Reply::Line("OK:3\n".into()),
            Reply::Line("ERR:division by zero\n".into()),
        ]);
        let mut output = Vec::new();

        let end = run_session(
            &mut transport,
            &b"(+ 1 2)\n(/ 1 0)\n"[..],
            &mut output,
            std::future::pending(),
        )
        .await?;

        assert_eq!(end, SessionEnd::EndOfInput);
        assert_eq!(transport.sent, ["(+ 1 2)\n", "(/ 1 0)\n"]);
        assert_eq!(String::from_utf8(output)?, "OK:3\nERR:division by zero\n");
        assert!(transport.closed);
        Ok(())
    }

    #[tokio::test]
    async fn empty_input_sends_nothing() -> anyhow::Result<()> {
        let mut transport = ScriptedTransport::default();
        let mut output = Vec::new();

        let end = run_session(&mut transport, &b""[..], &mut output, std::future::pending()).await?;

        assert_eq!(end, SessionEnd::EndOfInput);
        assert!(transport.sent.is_empty());
        assert!(output.is_empty());
        assert!(!transport.interrupted);
        Ok(())
    }

    #[tokio::test]
    async fn server_bye_stops_before_remaining_input() -> anyhow::Result<()> {
        let mut transport = ScriptedTransport::with_replies([
            Reply::Line("HELLO\n".into()),
            Reply::Terminal("BYE\n".into()),
        ]);
        let mut output = Vec::new();

        let end = run_session(
            &mut transport,
            &b"HELLO\nBYE\nSOLVE (+ 1 2)\n"[..],
            &mut output,
            std::future::pending(),
        )
        .await?;

        assert_eq!(end, SessionEnd::ServerBye);
        assert_eq!(transport.sent, ["HELLO\n", "BYE\n"]);
        assert_eq!(String::from_utf8(output)?, "HELLO\nBYE\n");
        assert!(transport.closed);
        Ok(())
    }

    #[tokio::test]
    async fn interrupt_while_waiting_for_input() -> anyhow::Result<()> {
        let mut transport = ScriptedTransport::default();
        let mut output = Vec::new();
        // stdin that never produces a line
        let (_writer, reader) = tokio::io::duplex(8);

        let end = run_session(
            &mut transport,
            BufReader::new(reader),
            &mut output,
            std::future::ready(()),
        )
        .await?;

        assert_eq!(end, SessionEnd::Interrupted);
        assert!(transport.interrupted);
        assert!(transport.closed);
        assert!(transport.sent.is_empty());
        assert_eq!(transport.recv_calls, 0);
        assert_eq!(String::from_utf8(output)?, "\nBYE\n");
        Ok(())
    }

    #[tokio::test]
    async fn interrupt_while_waiting_for_reply() -> anyhow::Result<()> {
        let mut transport = ScriptedTransport::default();
        let mut output = Vec::new();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let interrupt = async move {
            let _ = rx.await;
        };

        let end = {
            let session = run_session(&mut transport, &b"(+ 1 2)\n"[..], &mut output, interrupt);
            tokio::pin!(session);

            // let the request go out, then the reply never comes
            tokio::select! {
                biased;
                _ = &mut session => panic!("session ended without a reply"),
                _ = tokio::task::yield_now() => {}
            }
            tx.send(()).unwrap();
            session.await?
        };

        assert_eq!(end, SessionEnd::Interrupted);
        assert_eq!(transport.sent, ["(+ 1 2)\n"]);
        assert!(transport.interrupted);
        assert_eq!(String::from_utf8(output)?, "\nBYE\n");
        Ok(())
    }

    #[tokio::test]
    async fn transport_errors_are_fatal() {
        struct Broken;

        impl Transport for Broken {
            async fn send(&mut self, _line: &str) -> Result<()> {
                Err(Error::SendFailure(std::io::ErrorKind::BrokenPipe.into()))
            }
            async fn recv(&mut self) -> Result<Reply> {
                unreachable!("nothing was sent")
            }
            async fn interrupt(&mut self) -> Result<()> {
                Ok(())
            }
            async fn close(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let result = run_session(
            &mut Broken,
            &b"(+ 1 2)\n(+ 3 4)\n"[..],
            Vec::new(),
            std::future::pending(),
        )
        .await;
        assert!(matches!(result, Err(Error::SendFailure(_))));
    }
}

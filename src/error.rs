use std::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, derive_more::Display)]
pub enum Error {
    #[display("configuration error: {_0}")]
    Configuration(String),
    #[display("connection failed: {_0}")]
    Connection(std::io::Error),
    #[display("send failed: {_0}")]
    SendFailure(std::io::Error),
    #[display("receive failed: {_0}")]
    ReceiveFailure(std::io::Error),
    #[display("no response within {}s", _0.as_secs())]
    ResponseTimeout(Duration),
    #[display("malformed response: {_0}")]
    MalformedResponse(String),
    #[display("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },
    #[display("io error: {_0}")]
    Io(std::io::Error),
    #[display("{_0}")]
    Other(String),
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl Error {
    /// Re-tag a plain io error raised while writing to the server.
    pub fn on_send(self) -> Self {
        match self {
            Self::Io(e) => Self::SendFailure(e),
            other => other,
        }
    }

    /// Re-tag a plain io error raised while reading from the server.
    pub fn on_receive(self) -> Self {
        match self {
            Self::Io(e) => Self::ReceiveFailure(e),
            other => other,
        }
    }
}

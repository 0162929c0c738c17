use crate::{Error, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::net::SocketAddr;

#[derive(Parser, Debug)]
#[clap(version, about, disable_help_flag = true)]
pub struct Args {
    /// Server host (IPv4/IPv6 literal or host name)
    #[arg(short = 'h')]
    pub host: Option<String>,

    /// Server port
    #[arg(short = 'p')]
    pub port: Option<u16>,

    /// Transport mode
    #[arg(short = 'm', value_enum)]
    pub mode: Option<Mode>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    #[value(alias = "stream")]
    Tcp,
    #[value(alias = "datagram")]
    Udp,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Everything the client needs once arguments are validated. Fixed for the
/// lifetime of the process.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: SocketAddr,
    pub mode: Mode,
}

impl Args {
    pub async fn into_config(self) -> Result<Config> {
        let (Some(host), Some(port), Some(mode)) = (self.host, self.port, self.mode) else {
            return Err(Error::Configuration(
                "usage: ipkcpc -h <host> -p <port> -m <mode>".into(),
            ));
        };
        if port == 0 {
            return Err(Error::Configuration("port must be in 1..=65535".into()));
        }

        let server = tokio::net::lookup_host((host.as_str(), port))
            .await
            .map_err(|e| Error::Configuration(format!("cannot resolve {host}: {e}")))?
            .next()
            .ok_or_else(|| Error::Configuration(format!("no address found for {host}")))?;

        Ok(Config { server, mode })
    }
}

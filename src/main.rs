use clap::Parser;
use ipkcpc::cmd::{Args, LogFormat};
use ipkcpc::{session, tracer};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _ = match args.log_format {
        LogFormat::Text => tracer::setup_simple_tracing(),
        LogFormat::Json => tracer::setup_json_tracing(),
    };

    let result = match args.into_config().await {
        Ok(config) => session::run(config).await,
        Err(e) => Err(e),
    };

    // Exit explicitly: a blocking stdin read may still be parked on the
    // runtime's blocking pool and would keep the process alive on return.
    match result {
        Ok(end) => {
            info!("session finished: {end}");
            std::process::exit(0);
        }
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

use std::process;
use std::time::Duration;

use clap::Parser;
use myredis::codec::DEFAULT_MAX_FRAME_SIZE;
use myredis::config::{Config, DEFAULT_LISTEN, DEFAULT_MAX_CONNECTIONS};
use myredis::server;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen to
    #[arg(short, long, env = "MYREDIS_LISTEN", default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Largest request, in bytes, a client may send
    #[arg(long, env = "MYREDIS_MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,

    /// Maximum number of clients served at once
    #[arg(long, env = "MYREDIS_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    max_connections: usize,

    /// Close connections idle for this many seconds
    #[arg(long, env = "MYREDIS_IDLE_TIMEOUT")]
    idle_timeout: Option<u64>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Config {
            listen: args.listen,
            max_frame_size: args.max_frame_size,
            max_connections: args.max_connections,
            idle_timeout: args.idle_timeout.map(Duration::from_secs),
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = server::run(args.into()).await {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

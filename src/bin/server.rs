use clap::Parser;
use rustdis_aof::config::DEFAULT_PORT;
use rustdis_aof::{server, Config, Error};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The port to listen on
    #[arg(short, long, env = "RUSTDIS_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// The address to bind to
    #[arg(short, long, env = "RUSTDIS_BIND", default_value = "127.0.0.1")]
    bind: String,

    /// Path of the append-only file
    #[arg(long, env = "RUSTDIS_AOF_PATH", default_value = "appendonly.aof")]
    aof_path: PathBuf,

    /// Keep data in memory only
    #[arg(long)]
    no_aof: bool,

    /// How often the append-only file is fsynced, in milliseconds
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    sync_interval_ms: u64,

    /// Maximum size of a single request, in bytes
    #[arg(long, env = "MAX_FRAME_SIZE", default_value_t = 512 * 1024 * 1024)]
    max_frame_size: usize,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::builder()
        .bind(args.bind)
        .port(args.port)
        .aof_enabled(!args.no_aof)
        .aof_path(args.aof_path)
        .aof_sync_interval(Duration::from_millis(args.sync_interval_ms))
        .max_frame_size(args.max_frame_size)
        .build();

    server::run(config).await
}

//! ringpipe Server Binary
//!
//! Menjalankan TCP endpoint untuk per-identity pipe registry.
//!
//! Usage:
//!   cargo run --release --bin ringpipe_server -- [OPTIONS]

use std::process;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use ringpipe::network::Server;
use ringpipe::{PipeConfig, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "ringpipe_server")]
#[command(about = "Per-identity ring buffer pipe over TCP")]
struct Args {
    /// Bind address
    #[arg(short = 'b', long = "bind", default_value = "127.0.0.1:9797")]
    bind: String,

    /// Default channel capacity in bytes
    #[arg(short = 'c', long = "capacity", default_value_t = ringpipe::DEFAULT_CAPACITY)]
    capacity: usize,

    /// Stats print interval in seconds (0 = only at shutdown)
    #[arg(long = "stats-interval", default_value_t = 5)]
    stats_interval: u64,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> ringpipe::Result<ServerConfig> {
        Ok(ServerConfig {
            bind_addr: self.bind,
            pipe: PipeConfig::with_capacity(self.capacity)?,
            stats_interval: (self.stats_interval > 0)
                .then(|| Duration::from_secs(self.stats_interval)),
            ..ServerConfig::default()
        })
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {}", e);
            process::exit(2);
        }
    };

    println!("🚀 ringpipe server");
    println!("==================\n");
    println!("🔌 Bind:     {}", config.bind_addr);
    println!("📦 Capacity: {} bytes per identity\n", config.pipe.default_capacity);

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "failed to bind");
            process::exit(1);
        }
    };

    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || shutdown.shutdown()).ok();

    let start_time = Instant::now();
    if let Err(e) = server.run() {
        error!(error = %e, "server error");
        process::exit(1);
    }

    server.stats().print_stats(start_time.elapsed());
    println!("\n✅ Channels registered: {}", server.endpoint().registry().len());
}

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use blockraid::workload;
use blockraid::{Array, ArrayConfig, Scheme, BLOCK_SIZE};

const MIB: u64 = 1024 * 1024;

#[derive(Parser)]
#[command(name = "blockraid")]
#[command(about = "Benchmark striping, mirroring and parity schemes over file-backed disks")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BLOCKRAID_CONFIG")]
    config: Option<PathBuf>,

    /// Schemes to benchmark (default: all of them)
    #[arg(short, long, value_enum)]
    scheme: Vec<Scheme>,

    /// Number of logical blocks to write and read back
    #[arg(short, long, default_value_t = 12800)]
    blocks: usize,

    /// Concurrent worker threads
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    /// Directory for the device files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Number of member devices
    #[arg(long)]
    devices: Option<usize>,

    /// Blocks per device
    #[arg(long)]
    device_blocks: Option<u64>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli) {
        Ok(0) => {}
        Ok(corrupted) => {
            error!(corrupted, "read-back verification failed");
            std::process::exit(1);
        }
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    }
}

/// Runs the benchmark and returns the number of blocks that did not read
/// back intact.
fn run(cli: Cli) -> blockraid::Result<usize> {
    let mut base = match &cli.config {
        Some(path) => ArrayConfig::from_file(path)?,
        None => ArrayConfig::default(),
    };
    if let Some(dir) = cli.data_dir {
        base.data_dir = dir;
    }
    if let Some(devices) = cli.devices {
        base.devices = devices;
    }
    if let Some(blocks) = cli.device_blocks {
        base.device_blocks = blocks;
    }
    let schemes = if cli.scheme.is_empty() {
        Scheme::ALL.to_vec()
    } else {
        cli.scheme
    };

    let mut rng = rand::thread_rng();
    let payloads = workload::generate(cli.blocks, &mut rng);

    let mut corrupted = 0;
    for scheme in &schemes {
        let config = ArrayConfig {
            scheme: *scheme,
            data_dir: base.data_dir.join(format!("{scheme:?}").to_lowercase()),
            ..base.clone()
        };
        let array = Array::create(&config)?;
        let report = workload::run(&array, &payloads, cli.workers)?;
        println!("{report}\n");
        corrupted += report.mismatches;
    }

    info!(devices = base.devices, device_blocks = base.device_blocks, "effective capacity");
    println!("Effective Storage Capacities:");
    for scheme in Scheme::ALL {
        let bytes = scheme.capacity(base.devices, base.device_blocks) * BLOCK_SIZE as u64;
        println!("{scheme}: {} MB", bytes / MIB);
    }
    Ok(corrupted)
}

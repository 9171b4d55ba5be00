use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use hash_spoof::core::observer::{LogObserver, SearchObserver};
use hash_spoof::core::sink::FileSink;
use hash_spoof::crypto::crypto::DigestAlgorithm;
use hash_spoof::formats::png_chunk::ChunkTag;
use hash_spoof::{Container, HashSpoofer, SearchConfig, SearchOutcome};

#[derive(Parser)]
#[command(
    name = "hash_spoof",
    version,
    about = "Rewrite a PNG or JPEG so its digest starts with a chosen hex prefix, without changing how it looks.",
    long_about = None
)]
struct Cli {
    /// Target hex prefix, optionally written as 0x...
    prefix: String,

    /// Input image (.png, .jpg or .jpeg)
    input: PathBuf,

    /// Where to write the altered image
    output: PathBuf,

    /// Worker threads (default: 1)
    #[arg(long, default_value_t = 1)]
    workers: usize,

    /// Random bytes inserted per attempt
    #[arg(long, default_value_t = hash_spoof::config::DEFAULT_PAYLOAD_SIZE)]
    payload_size: usize,

    /// Print progress every N attempts (0 disables)
    #[arg(long, default_value_t = hash_spoof::config::DEFAULT_PROGRESS_INTERVAL)]
    progress_interval: u64,

    /// Ancillary chunk type used for PNG files
    #[arg(long, default_value = "npFX")]
    chunk_type: ChunkTag,

    /// Digest algorithm: sha256 | sha512
    #[arg(long, default_value = "sha256")]
    algorithm: DigestAlgorithm,

    /// Decode input and output and refuse to write if the pixels differ
    #[arg(long, default_value_t = false)]
    verify: bool,

    /// Report through the logger instead of printing to stdout
    #[arg(long, default_value_t = false)]
    log_only: bool,

    /// Give up after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
}

struct ConsoleReporter {
    input: PathBuf,
    output: PathBuf,
}

impl SearchObserver for ConsoleReporter {
    fn on_start(&self, original_digest: &str, _prefix: &str) {
        println!("Original file hash: {}  {}", original_digest, self.input.display());
    }

    fn on_progress(&self, attempts: u64, digest_prefix: &str) {
        println!("Attempt {}: current hash prefix: {:?}", attempts, digest_prefix);
    }

    fn on_found(&self, outcome: &SearchOutcome) {
        println!("Success after {} attempts!", outcome.attempts);
        println!("Resulting hash: {}  {}", outcome.digest, self.output.display());
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let bytes = fs::read(&cli.input)
        .with_context(|| format!("failed to read input file {}", cli.input.display()))?;
    let container = Container::classify(&cli.input, bytes)
        .with_context(|| format!("cannot use {} as a carrier", cli.input.display()))?;

    let config = SearchConfig {
        payload_size: cli.payload_size,
        progress_interval: cli.progress_interval,
        workers: cli.workers,
        chunk_tag: cli.chunk_type,
        algorithm: cli.algorithm,
        verify_render: cli.verify,
    };
    let spoofer = HashSpoofer::new(container, config);

    if let Some(secs) = cli.timeout_secs {
        let stop = spoofer.stop_handle();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            stop.stop();
        });
    }

    let sink = FileSink::new(&cli.output);
    let reporter: Box<dyn SearchObserver> = if cli.log_only {
        Box::new(LogObserver)
    } else {
        Box::new(ConsoleReporter {
            input: cli.input.clone(),
            output: cli.output.clone(),
        })
    };
    spoofer
        .search(&cli.prefix, &sink, reporter.as_ref())
        .context("hash prefix search failed")?;

    Ok(())
}

//! raop-play - stream raw PCM to a RAOP receiver.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use raop_client::{stream_pcm, EngineConfig, PcmFormat, RaopOutput, RaopTarget, SampleFormat};
use tokio::io::AsyncRead;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line arguments
struct Args {
    /// `raop://host:port` or `raopt://host:port`
    target: String,
    /// PCM source; stdin when absent
    input: Option<PathBuf>,
    volume: Option<f32>,
    little_endian: bool,
    debug: bool,
    response_timeout: Option<Duration>,
}

fn parse_args() -> Result<Args> {
    let mut target = None;
    let mut input = None;
    let mut volume = None;
    let mut little_endian = false;
    let mut debug = false;
    let mut response_timeout = None;
    let mut iter = std::env::args().skip(1);

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--volume" | "-v" => {
                let value = iter.next().context("--volume needs a value")?;
                volume = Some(value.parse::<f32>().context("invalid volume")?);
            }
            "--response-timeout" => {
                let value = iter.next().context("--response-timeout needs seconds")?;
                let secs = value.parse::<u64>().context("invalid timeout")?;
                response_timeout = Some(Duration::from_secs(secs));
            }
            "--little-endian" | "-l" => little_endian = true,
            "--debug" | "-d" => debug = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            _ if target.is_none() => target = Some(arg),
            _ if input.is_none() => input = Some(PathBuf::from(arg)),
            _ => bail!("unexpected argument: {}", arg),
        }
    }

    let Some(target) = target else {
        print_help();
        std::process::exit(1);
    };
    if !RaopTarget::probe(&target) {
        bail!("{} is not a raop:// or raopt:// target", target);
    }

    Ok(Args {
        target,
        input,
        volume,
        little_endian,
        debug,
        response_timeout,
    })
}

fn print_help() {
    println!("raop-play - stream raw PCM to a RAOP receiver");
    println!();
    println!("Usage: raop-play <raop://HOST:PORT | raopt://HOST:PORT> [FILE] [OPTIONS]");
    println!();
    println!("Reads 44.1 kHz stereo 16-bit PCM from FILE, or stdin when omitted.");
    println!();
    println!("Options:");
    println!("  -v, --volume V            Volume between 0.0 and 1.0");
    println!("  -l, --little-endian       Input samples are little-endian (default: big-endian)");
    println!("      --response-timeout S  Give up on a control response after S seconds");
    println!("  -d, --debug               Enable debug logging");
    println!("  -h, --help                Show this help message");
    println!();
    println!("RUST_LOG overrides the log filter.");
}

fn setup_logging(args: &Args) {
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

async fn open_input(path: Option<&PathBuf>) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdin())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args()?;
    setup_logging(&args);

    let mut config = EngineConfig::default();
    if let Some(limit) = args.response_timeout {
        config = config.with_response_timeout(limit);
    }

    let mut output = RaopOutput::open(&args.target, config)?;
    let input = open_input(args.input.as_ref()).await?;

    output.activate().await?;
    output
        .start()
        .await
        .with_context(|| format!("failed to negotiate with {}", args.target))?;
    info!(
        "Streaming to {} (latency {:?} frames)",
        args.target,
        output.audio_latency()
    );

    if let Some(volume) = args.volume {
        output.set_volume(volume).await.context("failed to set volume")?;
    }

    let sample_format = if args.little_endian {
        SampleFormat::SignedLittleEndian
    } else {
        SampleFormat::SignedBigEndian
    };
    let format = PcmFormat::with_sample_format(sample_format);

    let streamed = stream_pcm(&mut output, input, &format).await;
    let stopped = output.stop().await;
    output.deactivate().await?;

    let bytes = streamed.context("streaming failed")?;
    stopped.context("TEARDOWN failed")?;
    info!(
        "Sent {} bytes ({:.1}s of audio)",
        bytes,
        output.playback_position().as_secs_f64()
    );
    Ok(())
}

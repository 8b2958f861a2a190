mod config;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use sonictag_core::transceiver::{Receiver, Transmitter};

#[derive(Parser, Debug)]
#[command(author, version, about = "SonicTag loopback encode/decode demo", long_about = None)]
struct Cli {
    /// Path to a TOML SonicTagConfig file; defaults to the library's defaults.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a payload into a WAV file.
    Encode {
        /// Message text to encode (mutually exclusive with --file).
        #[arg(short, long)]
        message: Option<String>,

        /// Path to a binary payload file (mutually exclusive with --message).
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Output WAV path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Decode payloads from a WAV file, streaming it in fixed-size chunks
    /// the way an audio callback would hand over buffers.
    Decode {
        /// Input WAV path.
        input: PathBuf,

        /// Chunk size in samples fed to `Receiver::push` per call.
        #[arg(short, long, default_value_t = 1024)]
        chunk_size: usize,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    logging::init(args.verbose);

    let config = config::load(args.config.as_deref())?;

    match args.command {
        Command::Encode { message, file, output } => {
            let payload = match (message, file) {
                (Some(m), None) => m.into_bytes(),
                (None, Some(path)) => std::fs::read(&path)
                    .wrap_err_with(|| format!("failed to read payload file {}", path.display()))?,
                _ => {
                    color_eyre::eyre::bail!("exactly one of --message or --file is required");
                }
            };

            let sample_rate = config.sample_rate as u32;
            let tx = Transmitter::new(config)?;
            let samples = tx.encode(&payload)?;

            let spec = hound::WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            };
            let mut writer = hound::WavWriter::create(&output, spec)
                .wrap_err_with(|| format!("failed to create {}", output.display()))?;
            for sample in samples {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;

            log::info!("wrote {} byte payload to {}", payload.len(), output.display());
            Ok(())
        }

        Command::Decode { input, chunk_size } => {
            let mut reader = hound::WavReader::open(&input)
                .wrap_err_with(|| format!("failed to open {}", input.display()))?;
            let samples: Vec<f32> = match reader.spec().sample_format {
                hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
                hound::SampleFormat::Int => reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
                    .collect::<Result<_, _>>()?,
            };

            let mut rx = Receiver::new(config)?;
            let mut found = 0;
            for chunk in samples.chunks(chunk_size.max(1)) {
                for payload in rx.push(chunk) {
                    found += 1;
                    match std::str::from_utf8(&payload) {
                        Ok(text) => println!("payload {found}: {text:?}"),
                        Err(_) => println!("payload {found}: {payload:02x?}"),
                    }
                }
            }
            if found == 0 {
                log::warn!("no payloads decoded; last_error = {:?}", rx.last_error());
            }
            Ok(())
        }
    }
}

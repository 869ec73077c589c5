mod audio;
mod error;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Args, Parser, Subcommand};
use error::{CliError, Result};
use log::{debug, info, warn};
use serde::Serialize;
use soundpay_core::{Decoder, Encoder, ModemConfig};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Guard silence the CLI puts around every burst unless told otherwise
const CLI_GUARD_MS: u32 = 200;

#[derive(Parser)]
#[command(name = "soundpay")]
#[command(version, about = "On-off keyed acoustic modem for short payloads")]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a payload into a WAV file
    Encode {
        /// Payload file
        #[arg(value_name = "INPUT", required_unless_present = "text", conflicts_with = "text")]
        input: Option<PathBuf>,

        /// Use this string as the payload instead of a file
        #[arg(long)]
        text: Option<String>,

        /// Output WAV file
        #[arg(short, long, value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Write 32-bit float samples instead of 16-bit PCM
        #[arg(long)]
        float: bool,

        #[command(flatten)]
        modem: ModemArgs,
    },

    /// Decode the first frame in a WAV file
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Write the payload here instead of printing it
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Print the payload as base64
        #[arg(long, conflicts_with = "json")]
        base64: bool,

        /// Print a JSON report of the payload
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        modem: ModemArgs,
    },

    /// Print how long a burst for a payload of BYTES bytes lasts
    Airtime {
        #[arg(value_name = "BYTES")]
        bytes: usize,

        #[command(flatten)]
        modem: ModemArgs,
    },
}

/// Modem parameters shared by every subcommand. Both ends must agree on them.
#[derive(Args, Debug, Default)]
struct ModemArgs {
    /// JSON file of modem settings; flags below override its values
    #[arg(long, value_name = "FILE.json")]
    config: Option<PathBuf>,

    /// Carrier frequency in Hz
    #[arg(long)]
    carrier_hz: Option<f32>,

    /// Sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Bit slots per second
    #[arg(long)]
    baud: Option<u32>,

    /// Copies of every bit
    #[arg(long)]
    repetition: Option<usize>,

    /// Largest payload accepted, in bytes
    #[arg(long)]
    max_payload: Option<usize>,

    /// Silence before and after the burst, in milliseconds
    #[arg(long)]
    guard_ms: Option<u32>,

    /// Skip the band-pass pre-filter when decoding
    #[arg(long)]
    no_bandpass: bool,
}

impl ModemArgs {
    fn resolve(&self) -> Result<ModemConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ModemConfig::default().with_guard_ms(CLI_GUARD_MS),
        };

        if let Some(carrier_hz) = self.carrier_hz {
            config = config.with_carrier_hz(carrier_hz);
        }
        if let Some(sample_rate) = self.sample_rate {
            config = config.with_sample_rate_hz(sample_rate);
        }
        if let Some(baud) = self.baud {
            config = config.with_baud(baud);
        }
        if let Some(repetition) = self.repetition {
            config = config.with_repetition(repetition);
        }
        if let Some(max_payload) = self.max_payload {
            config = config.with_max_payload_bytes(max_payload);
        }
        if let Some(guard_ms) = self.guard_ms {
            config = config.with_guard_ms(guard_ms);
        }
        if self.no_bandpass {
            config = config.with_bandpass(None);
        }

        config.validate()?;
        debug!("Modem config: {:?}", config);
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<ModemConfig> {
    let wrap = |source: serde_json::Error| CliError::Config {
        path: path.to_path_buf(),
        source,
    };
    let text = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(wrap)?;
    // Files that leave the guard out get the CLI default, not the library's zero
    let has_guard = value.get("guard_ms").is_some();
    let mut config: ModemConfig = serde_json::from_value(value).map_err(wrap)?;
    if !has_guard {
        config.guard_ms = CLI_GUARD_MS;
    }
    Ok(config)
}

#[derive(Serialize)]
struct DecodeReport {
    bytes: usize,
    text: Option<String>,
    base64: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Modem(e)) if e.is_channel_error() => {
            eprintln!("Error: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Encode {
            input,
            text,
            output,
            float,
            modem,
        } => {
            let payload = match (text, input) {
                (Some(text), _) => text.into_bytes(),
                (None, Some(path)) => std::fs::read(path)?,
                (None, None) => Vec::new(),
            };
            encode_command(&payload, &output, float, &modem.resolve()?)
        }
        Commands::Decode {
            input,
            output,
            base64,
            json,
            modem,
        } => decode_command(&input, output.as_deref(), base64, json, &modem.resolve()?),
        Commands::Airtime { bytes, modem } => airtime_command(bytes, &modem.resolve()?),
    }
}

fn encode_command(payload: &[u8], output: &Path, float: bool, config: &ModemConfig) -> Result<()> {
    let encoder = Encoder::new(config.clone())?;
    let samples = encoder.encode(payload)?;
    audio::write_wav(output, &samples, config.sample_rate_hz, float)?;

    info!(
        "Encoded {} bytes into {:.2} s of audio, wrote {}",
        payload.len(),
        samples.len() as f64 / f64::from(config.sample_rate_hz),
        output.display()
    );
    Ok(())
}

fn decode_command(
    input: &Path,
    output: Option<&Path>,
    base64: bool,
    json: bool,
    config: &ModemConfig,
) -> Result<()> {
    let capture = audio::read_wav(input)?;
    let samples = if capture.sample_rate == config.sample_rate_hz {
        capture.samples
    } else {
        info!(
            "Resampling {} Hz capture to {} Hz",
            capture.sample_rate, config.sample_rate_hz
        );
        audio::resample(&capture.samples, capture.sample_rate, config.sample_rate_hz)
    };

    let payload = Decoder::new(config.clone())?.decode(&samples)?;
    info!("Decoded {} bytes from {}", payload.len(), input.display());

    if let Some(path) = output {
        std::fs::write(path, &payload)?;
        info!("Wrote {}", path.display());
        return Ok(());
    }

    let text = String::from_utf8(payload.clone()).ok();
    if json {
        let report = DecodeReport {
            bytes: payload.len(),
            text,
            base64: STANDARD.encode(&payload),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if base64 {
        println!("{}", STANDARD.encode(&payload));
    } else if let Some(text) = text {
        println!("{}", text);
    } else {
        warn!("Payload is not UTF-8, printing base64");
        println!("{}", STANDARD.encode(&payload));
    }
    Ok(())
}

fn airtime_command(bytes: usize, config: &ModemConfig) -> Result<()> {
    if bytes > config.max_payload_bytes {
        return Err(soundpay_core::ModemError::PayloadTooLarge {
            len: bytes,
            max: config.max_payload_bytes,
        }
        .into());
    }
    let duration = soundpay_core::airtime(bytes, config);
    println!(
        "{:.3} s ({} slots at {} baud, {} ms guard each side)",
        duration.as_secs_f64(),
        config.frame_slots(bytes),
        config.baud,
        config.guard_ms
    );
    Ok(())
}

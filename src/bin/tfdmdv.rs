//! FDMDV loopback test driver
//!
//! Runs the modem loopback for a number of frames and writes every
//! intermediate vector as Octave text matrices, for comparison against the
//! reference model.
//!
//! Usage:
//!   cargo run --bin tfdmdv -- [OPTIONS]
//!
//! Options:
//!   -n, --frames <N>      Frames to run (default: 35)
//!   -c, --cumulative      Write all frames once at the end instead of per frame
//!   -o, --output <path>   Octave output file (default: tfdmdv_out.txt)
//!   -f, --foff <Hz>       Carrier offset applied by the channel (default: 0)
//!   -s, --noise <std>     Channel noise standard deviation (default: 0)
//!   -w, --wav <path>      Also write the channel waveform to a WAV file
//!   -h, --help            Show this help message

use std::fs::File;
use std::io::BufWriter;
use std::process::ExitCode;

use fdmdv_sync::modem::FrameResult;
use fdmdv_sync::{tracing_init, wav, FrameLog, Loopback, ModemConfig, OctaveWriter, OutputMode};
use tracing::info;

struct RunConfig {
    frames: usize,
    mode: OutputMode,
    output_path: String,
    foff_hz: f32,
    noise_std: f32,
    wav_path: Option<String>,
}

impl RunConfig {
    fn parse_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();

        let mut frames = 35;
        let mut mode = OutputMode::PerFrame;
        let mut output_path = "tfdmdv_out.txt".to_string();
        let mut foff_hz = 0.0;
        let mut noise_std = 0.0;
        let mut wav_path = None;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-n" | "--frames" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --frames".to_string());
                    }
                    frames = args[i].parse()
                        .map_err(|_| format!("Invalid frame count: {}", args[i]))?;
                }
                "-c" | "--cumulative" => {
                    mode = OutputMode::Cumulative;
                }
                "-o" | "--output" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --output".to_string());
                    }
                    output_path = args[i].clone();
                }
                "-f" | "--foff" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --foff".to_string());
                    }
                    foff_hz = args[i].parse()
                        .map_err(|_| format!("Invalid frequency offset: {}", args[i]))?;
                }
                "-s" | "--noise" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --noise".to_string());
                    }
                    noise_std = args[i].parse()
                        .map_err(|_| format!("Invalid noise level: {}", args[i]))?;
                }
                "-w" | "--wav" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --wav".to_string());
                    }
                    wav_path = Some(args[i].clone());
                }
                "-h" | "--help" => {
                    print_help(&args[0]);
                    std::process::exit(0);
                }
                arg => return Err(format!("Unknown option: {}", arg)),
            }
            i += 1;
        }

        Ok(RunConfig {
            frames,
            mode,
            output_path,
            foff_hz,
            noise_std,
            wav_path,
        })
    }
}

fn print_help(program: &str) {
    eprintln!("FDMDV loopback test driver");
    eprintln!();
    eprintln!("Usage: {} [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -n, --frames <N>      Frames to run (default: 35)");
    eprintln!("  -c, --cumulative      Write all frames once at the end");
    eprintln!("  -o, --output <path>   Octave output file (default: tfdmdv_out.txt)");
    eprintln!("  -f, --foff <Hz>       Carrier offset applied by the channel (default: 0)");
    eprintln!("  -s, --noise <std>     Channel noise standard deviation (default: 0)");
    eprintln!("  -w, --wav <path>      Also write the channel waveform to a WAV file");
    eprintln!("  -h, --help            Show this help message");
}

fn run(args: &RunConfig) -> fdmdv_sync::Result<()> {
    let config = ModemConfig {
        channel_offset_hz: args.foff_hz,
        channel_noise_std: args.noise_std,
        ..ModemConfig::default()
    };
    let sample_rate = config.sample_rate as u32;

    let mut modem = Loopback::new(config)?;
    let mut log = FrameLog::new(args.mode, modem.reference());

    let file = File::create(&args.output_path).map_err(|source| fdmdv_sync::ModemError::Record {
        name: args.output_path.clone(),
        source,
    })?;
    let mut writer = OctaveWriter::new(BufWriter::new(file));
    writer.comment("Created by tfdmdv")?;

    modem.run(args.frames, &mut log, &mut writer)?;
    writer.flush()?;

    let last = log.frames().last();
    info!(
        frames = log.frames().len(),
        sync = ?last.map(|f| f.sync.state),
        foff = last.map_or(0.0, |f| f.foff),
        snr_db = modem.state().snr().snr_db(),
        "run complete"
    );

    if let Some(path) = &args.wav_path {
        let waveform: Vec<f32> = log
            .frames()
            .iter()
            .flat_map(|f: &FrameResult| f.channel_samples.iter().copied())
            .collect();
        wav::write_wav_file(path, &waveform, sample_rate)?;
        info!(path = %path, samples = waveform.len(), "wrote channel waveform");
    }

    Ok(())
}

fn main() -> ExitCode {
    tracing_init::init_tracing();

    let args = match RunConfig::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Try --help for usage");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let mut message = e.to_string();
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                message.push_str(&format!(": {}", cause));
                source = cause.source();
            }
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

//! WAV dump of the channel waveform
//!
//! **WAV Format**:
//! - 16-bit PCM (signed integer samples)
//! - Modem sample rate (8 kHz by default)
//! - Mono channel
//!
//! The waveform is peak normalised before conversion so the loopback signal,
//! whose amplitude depends on the carrier count, always uses the full range
//! without clipping.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};
use snafu::ResultExt;

use crate::error::{Result, WavSnafu};

/// Peak level after normalisation
const PEAK: f32 = 0.9;

fn spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Convert a sample in [-1.0, 1.0] to 16-bit PCM, clamping outside that range
fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

/// Write `samples` as a WAV stream to any seekable writer
pub fn write_wav_to<W: Write + Seek>(out: W, samples: &[f32], sample_rate: u32) -> Result<()> {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let gain = if peak > 0.0 { PEAK / peak } else { 1.0 };

    let mut writer = WavWriter::new(out, spec(sample_rate)).context(WavSnafu)?;
    for &s in samples {
        writer.write_sample(f32_to_i16(s * gain)).context(WavSnafu)?;
    }
    writer.finalize().context(WavSnafu)
}

/// Write `samples` to a WAV file
pub fn write_wav_file<P: AsRef<Path>>(path: P, samples: &[f32], sample_rate: u32) -> Result<()> {
    let file = File::create(path)
        .map_err(hound::Error::IoError)
        .context(WavSnafu)?;
    write_wav_to(BufWriter::new(file), samples, sample_rate)
}

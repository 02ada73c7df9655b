//! Recording of intermediate vectors for golden-vector comparison
//!
//! The loop never reads anything back from a recorder. [`FrameLog`] keeps
//! every [`FrameResult`] and decides when to hand named vectors to a
//! [`Recorder`]: after each frame, or once for the whole run.

pub mod octave;

pub use octave::OctaveWriter;

use bitvec::prelude::*;
use rustfft::num_complex::Complex32;

use crate::error::Result;
use crate::modem::{FrameResult, ReferenceVectors};

/// Values of one recorded vector
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Int(Vec<i32>),
    Float(Vec<f32>),
    Complex(Vec<Complex32>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Int(v) => v.len(),
            Samples::Float(v) => v.len(),
            Samples::Complex(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Matrix layout of a recorded vector
///
/// Row `r`, column `c` is stored at `r * stride + c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub rows: usize,
    pub cols: usize,
    pub stride: usize,
}

impl Shape {
    /// Single row
    pub fn row(cols: usize) -> Self {
        Self { rows: 1, cols, stride: cols }
    }

    /// Densely packed matrix
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Self { rows, cols, stride: cols }
    }
}

/// Sink for named vectors
pub trait Recorder {
    fn save(&mut self, name: &str, samples: &Samples, shape: Shape) -> Result<()>;
}

/// Keeps every saved vector in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRecorder {
    pub entries: Vec<(String, Samples, Shape)>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries saved under `name`, in order
    pub fn get<'a>(&'a self, name: &'a str) -> impl Iterator<Item = (&'a Samples, Shape)> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _, _)| n == name)
            .map(|(_, s, shape)| (s, *shape))
    }
}

impl Recorder for MemoryRecorder {
    fn save(&mut self, name: &str, samples: &Samples, shape: Shape) -> Result<()> {
        self.entries.push((name.to_string(), samples.clone(), shape));
        Ok(())
    }
}

/// When the log hands its vectors to the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Dump each frame as soon as it is pushed
    #[default]
    PerFrame,
    /// Dump all frames together on [`FrameLog::finish`]
    Cumulative,
}

/// Growable log of frame results
pub struct FrameLog {
    mode: OutputMode,
    reference: ReferenceVectors,
    frames: Vec<FrameResult>,
}

impl FrameLog {
    pub fn new(mode: OutputMode, reference: ReferenceVectors) -> Self {
        Self {
            mode,
            reference,
            frames: Vec::new(),
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn frames(&self) -> &[FrameResult] {
        &self.frames
    }

    /// Store a frame, dumping it straight away in per-frame mode
    pub fn push<R: Recorder>(&mut self, result: FrameResult, recorder: &mut R) -> Result<()> {
        self.frames.push(result);
        if self.mode == OutputMode::PerFrame {
            let last = self.frames.len() - 1;
            self.dump(&self.frames[last..], recorder)?;
        }
        Ok(())
    }

    /// Dump the whole run in cumulative mode; nothing to do per-frame
    pub fn finish<R: Recorder>(&mut self, recorder: &mut R) -> Result<()> {
        if self.mode == OutputMode::Cumulative && !self.frames.is_empty() {
            self.dump(&self.frames, recorder)?;
        }
        Ok(())
    }

    fn dump<R: Recorder>(&self, frames: &[FrameResult], recorder: &mut R) -> Result<()> {
        let n = frames.len();
        let carriers = frames.first().map_or(0, |f| f.rx_symbols.len());

        emit_row(recorder, "tx_bits_log_c", bits(frames, |f| f.tx_bits.as_bitslice()))?;
        emit_row(recorder, "tx_symbols_log_c", concat(frames, |f| f.tx_symbols.as_slice()))?;
        emit_row(recorder, "tx_fdm_log_c", concat(frames, |f| f.tx_fdm.as_slice()))?;
        emit_row(recorder, "pilot_lut_c", Samples::Complex(self.reference.pilot_lut.clone()))?;
        emit_row(
            recorder,
            "pilot_baseband1_log_c",
            concat(frames, |f| f.pilot_baseband1.as_slice()),
        )?;
        emit_row(
            recorder,
            "pilot_baseband2_log_c",
            concat(frames, |f| f.pilot_baseband2.as_slice()),
        )?;
        emit_row(recorder, "pilot_coeff_c", Samples::Float(self.reference.pilot_coeff.clone()))?;
        emit_row(recorder, "pilot_lpf1_log_c", concat(frames, |f| f.pilot_lpf1.as_slice()))?;
        emit_row(recorder, "pilot_lpf2_log_c", concat(frames, |f| f.pilot_lpf2.as_slice()))?;
        emit_row(recorder, "S1_log_c", concat(frames, |f| f.s1.as_slice()))?;
        emit_row(recorder, "S2_log_c", concat(frames, |f| f.s2.as_slice()))?;
        emit_row(recorder, "foff_log_c", scalars(frames, |f| f.foff))?;
        emit_row(recorder, "foff_coarse_log_c", scalars(frames, |f| f.foff_coarse))?;
        emit_row(
            recorder,
            "rx_fdm_filter_log_c",
            concat(frames, |f| f.rx_fdm_filter.as_slice()),
        )?;

        // Filter outputs vary per frame, concatenated along each carrier's row
        let filt_cols: usize = frames
            .iter()
            .map(|f| f.rx_filt.first().map_or(0, Vec::len))
            .sum();
        let rx_filt: Vec<Complex32> = (0..carriers)
            .flat_map(|c| frames.iter().flat_map(move |f| f.rx_filt[c].iter().copied()))
            .collect();
        recorder.save(
            "rx_filt_log_c",
            &Samples::Complex(rx_filt),
            Shape::matrix(carriers, filt_cols),
        )?;

        emit_row(recorder, "env_log_c", concat_float(frames, |f| f.envelope.as_slice()))?;
        emit_row(recorder, "rx_timing_log_c", scalars(frames, |f| f.rx_timing))?;

        let by_carrier = Shape::matrix(carriers, n);
        recorder.save(
            "rx_symbols_log_c",
            &per_carrier(frames, carriers, |f| f.rx_symbols.as_slice()),
            by_carrier,
        )?;
        recorder.save(
            "phase_difference_log_c",
            &per_carrier(frames, carriers, |f| f.phase_difference.as_slice()),
            by_carrier,
        )?;
        recorder.save(
            "sig_est_log_c",
            &per_carrier_float(frames, carriers, |f| f.sig_est.as_slice()),
            by_carrier,
        )?;
        recorder.save(
            "noise_est_log_c",
            &per_carrier_float(frames, carriers, |f| f.noise_est.as_slice()),
            by_carrier,
        )?;

        emit_row(recorder, "rx_bits_log_c", bits(frames, |f| f.rx_bits.as_bitslice()))?;
        emit_row(recorder, "foff_fine_log_c", scalars(frames, |f| f.foff_fine))?;
        emit_row(recorder, "sync_bit_log_c", ints(frames, |f| f.sync_bit as i32))?;
        emit_row(
            recorder,
            "sync_log_c",
            ints(frames, |f| f.sync.state.is_synchronized() as i32),
        )?;
        emit_row(recorder, "nin_log_c", ints(frames, |f| f.nin as i32))?;

        Ok(())
    }
}

fn emit_row<R: Recorder>(recorder: &mut R, name: &str, samples: Samples) -> Result<()> {
    let shape = Shape::row(samples.len());
    recorder.save(name, &samples, shape)
}

fn bits(frames: &[FrameResult], select: fn(&FrameResult) -> &BitSlice<u8, Msb0>) -> Samples {
    Samples::Int(
        frames
            .iter()
            .flat_map(|f| select(f).iter().map(|b| *b as i32))
            .collect(),
    )
}

fn concat(frames: &[FrameResult], select: fn(&FrameResult) -> &[Complex32]) -> Samples {
    Samples::Complex(frames.iter().flat_map(|f| select(f).iter().copied()).collect())
}

fn concat_float(frames: &[FrameResult], select: fn(&FrameResult) -> &[f32]) -> Samples {
    Samples::Float(frames.iter().flat_map(|f| select(f).iter().copied()).collect())
}

fn scalars(frames: &[FrameResult], select: fn(&FrameResult) -> f32) -> Samples {
    Samples::Float(frames.iter().map(select).collect())
}

fn ints(frames: &[FrameResult], select: fn(&FrameResult) -> i32) -> Samples {
    Samples::Int(frames.iter().map(select).collect())
}

/// One row per carrier, one column per frame
fn per_carrier(
    frames: &[FrameResult],
    carriers: usize,
    select: fn(&FrameResult) -> &[Complex32],
) -> Samples {
    Samples::Complex(
        (0..carriers)
            .flat_map(|c| frames.iter().map(move |f| select(f)[c]))
            .collect(),
    )
}

fn per_carrier_float(
    frames: &[FrameResult],
    carriers: usize,
    select: fn(&FrameResult) -> &[f32],
) -> Samples {
    Samples::Float(
        (0..carriers)
            .flat_map(|c| frames.iter().map(move |f| select(f)[c]))
            .collect(),
    )
}

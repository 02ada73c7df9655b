//! Shared utilities for integration tests

#![allow(dead_code)]

use fdmdv_sync::modem::FrameResult;
use fdmdv_sync::recorder::{Samples, Shape};
use fdmdv_sync::{FrameLog, Loopback, MemoryRecorder, ModemConfig, OctaveWriter, OutputMode};

/// Run a fresh loopback for `frames` frames and collect the results
pub fn run_frames(config: ModemConfig, frames: usize) -> Vec<FrameResult> {
    let mut modem = Loopback::new(config).expect("valid config");
    (0..frames)
        .map(|_| modem.process_frame().expect("frame runs"))
        .collect()
}

/// Run a fresh loopback through a `FrameLog` into a memory recorder
pub fn record_frames(config: ModemConfig, frames: usize, mode: OutputMode) -> MemoryRecorder {
    let mut modem = Loopback::new(config).expect("valid config");
    let mut log = FrameLog::new(mode, modem.reference());
    let mut recorder = MemoryRecorder::new();
    modem.run(frames, &mut log, &mut recorder).expect("run succeeds");
    recorder
}

/// Run a fresh loopback and render its cumulative Octave output
pub fn octave_output(config: ModemConfig, frames: usize) -> Vec<u8> {
    let mut modem = Loopback::new(config).expect("valid config");
    let mut log = FrameLog::new(OutputMode::Cumulative, modem.reference());
    let mut writer = OctaveWriter::new(Vec::new());
    modem.run(frames, &mut log, &mut writer).expect("run succeeds");
    writer.into_inner()
}

/// Row `r` of a recorded matrix
pub fn row(samples: &Samples, shape: Shape, r: usize) -> Samples {
    let range = r * shape.stride..r * shape.stride + shape.cols;
    match samples {
        Samples::Int(v) => Samples::Int(v[range].to_vec()),
        Samples::Float(v) => Samples::Float(v[range].to_vec()),
        Samples::Complex(v) => Samples::Complex(v[range].to_vec()),
    }
}

/// Append `tail` to `head`; both must hold the same kind of values
pub fn append(head: &mut Samples, tail: &Samples) {
    match (head, tail) {
        (Samples::Int(a), Samples::Int(b)) => a.extend_from_slice(b),
        (Samples::Float(a), Samples::Float(b)) => a.extend_from_slice(b),
        (Samples::Complex(a), Samples::Complex(b)) => a.extend_from_slice(b),
        _ => panic!("mismatched sample kinds"),
    }
}

/// Empty vector of the same kind as `like`
pub fn empty_like(like: &Samples) -> Samples {
    match like {
        Samples::Int(_) => Samples::Int(Vec::new()),
        Samples::Float(_) => Samples::Float(Vec::new()),
        Samples::Complex(_) => Samples::Complex(Vec::new()),
    }
}

/// Longest transmit to receive delay searched, in frames
const MAX_DELAY: usize = 16;

/// Index of the first frame reported as synchronized
pub fn first_sync(results: &[FrameResult]) -> Option<usize> {
    results.iter().position(|r| r.sync.state.is_synchronized())
}

/// Compare received bits from frame `from` on against the transmitted bits
/// of every delay up to `MAX_DELAY` frames and keep the best match
///
/// # Returns
/// `(delay, bit errors, bits compared)`
pub fn bit_errors_at_best_delay(results: &[FrameResult], from: usize) -> (usize, usize, usize) {
    (0..MAX_DELAY)
        .map(|delay| {
            let mut errors = 0;
            let mut bits = 0;
            for k in from.max(delay)..results.len() {
                let tx = &results[k - delay].tx_bits;
                let rx = &results[k].rx_bits;
                errors += tx.iter().zip(rx.iter()).filter(|(a, b)| **a != **b).count();
                bits += tx.len();
            }
            (delay, errors, bits)
        })
        .min_by_key(|&(_, errors, _)| errors)
        .expect("at least one delay")
}

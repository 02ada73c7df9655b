//! Transmit side: test bits, DQPSK mapping and FDM modulation
//!
//! **Frame structure**: one DQPSK symbol per data carrier plus one BPSK pilot
//! symbol per frame. Each data carrier carries 2 bits differentially against
//! the previous frame's symbol on the same carrier.

use bitvec::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::num_complex::Complex32;

use super::filter::root_raised_cosine;
use super::freq_shift::FreqShifter;
use crate::config::ModemConfig;

/// Deterministic, cycling test bit source
#[derive(Debug, Clone)]
pub struct TestBits {
    pattern: BitVec<u8, Msb0>,
    bits_per_frame: usize,
    cursor: usize,
}

impl TestBits {
    pub fn new(config: &ModemConfig) -> Self {
        let bits_per_frame = config.bits_per_frame();
        let mut rng = StdRng::seed_from_u64(config.test_bit_seed);
        let pattern = (0..bits_per_frame * config.test_bit_frames)
            .map(|_| rng.random_bool(0.5))
            .collect();
        Self {
            pattern,
            bits_per_frame,
            cursor: 0,
        }
    }

    /// Bits for the next frame; the pattern wraps after `test_bit_frames`
    pub fn next_frame(&mut self) -> BitVec<u8, Msb0> {
        let start = self.cursor * self.bits_per_frame;
        let frame = self.pattern[start..start + self.bits_per_frame].to_bitvec();
        self.cursor = (self.cursor + 1) % (self.pattern.len() / self.bits_per_frame);
        frame
    }
}

/// Map one frame of bits to DQPSK symbols against the previous frame
///
/// Bit pairs (msb, lsb) rotate the previous symbol of their carrier:
/// 00 → ×1, 01 → ×j, 10 → ×−j, 11 → ×−1. The pilot (last carrier) is
/// inverted when `pilot_bit` is set, after which `pilot_bit` toggles.
///
/// # Arguments
/// * `prev` - Previous frame's symbols, data carriers then pilot
/// * `bits` - Two bits per data carrier
/// * `pilot_bit` - Pilot inversion state, updated in place
pub fn bits_to_dqpsk_symbols(
    prev: &[Complex32],
    bits: &BitSlice<u8, Msb0>,
    pilot_bit: &mut bool,
) -> Vec<Complex32> {
    let nc = prev.len() - 1;
    debug_assert_eq!(bits.len(), 2 * nc);

    let j = Complex32::new(0.0, 1.0);
    let mut symbols: Vec<Complex32> = (0..nc)
        .map(|c| {
            let p = prev[c];
            match (bits[2 * c], bits[2 * c + 1]) {
                (false, false) => p,
                (false, true) => j * p,
                (true, false) => -j * p,
                (true, true) => -p,
            }
        })
        .collect();

    let pilot = if *pilot_bit { -prev[nc] } else { prev[nc] };
    symbols.push(pilot);
    *pilot_bit = !*pilot_bit;

    symbols
}

/// Pulse-shaped output of one carrier at offset `i` into the current symbol
///
/// `memory` holds the most recent symbols, oldest first.
pub(crate) fn shape_sample(memory: &[Complex32], taps: &[f32], m: usize, i: usize) -> Complex32 {
    let newest = memory.len() - 1;
    (0..memory.len())
        .map(|k| memory[newest - k] * taps[k * m + i])
        .sum()
}

/// FDM modulator: pulse shaping, per-carrier and centre upconversion
#[derive(Debug, Clone)]
pub struct TxModulator {
    taps: Vec<f32>,
    samples_per_symbol: usize,
    centre_freq: f32,
    /// Symbol memory per carrier, oldest first
    memory: Vec<Vec<Complex32>>,
    carrier_step: Vec<Complex32>,
    carrier_phase: Vec<Complex32>,
    centre: FreqShifter,
}

impl TxModulator {
    pub fn new(config: &ModemConfig) -> Self {
        let carriers = config.total_carriers();
        let carrier_step = config
            .carrier_freqs()
            .iter()
            .map(|f| Complex32::from_polar(1.0, 2.0 * core::f32::consts::PI * f / config.sample_rate))
            .collect();

        Self {
            taps: root_raised_cosine(
                config.filter_len(),
                config.samples_per_symbol,
                config.rrc_rolloff,
            ),
            samples_per_symbol: config.samples_per_symbol,
            centre_freq: config.centre_freq,
            memory: vec![vec![Complex32::new(0.0, 0.0); config.filter_symbols]; carriers],
            carrier_step,
            carrier_phase: vec![Complex32::new(1.0, 0.0); carriers],
            centre: FreqShifter::new(config.sample_rate),
        }
    }

    /// Modulate one frame of symbols to M samples of analytic passband signal
    ///
    /// The real part is the transmitted waveform.
    pub fn modulate(&mut self, symbols: &[Complex32]) -> Vec<Complex32> {
        debug_assert_eq!(symbols.len(), self.memory.len());
        let m = self.samples_per_symbol;
        let mut baseband = vec![Complex32::new(0.0, 0.0); m];

        for (c, &symbol) in symbols.iter().enumerate() {
            let memory = &mut self.memory[c];
            memory.rotate_left(1);
            if let Some(last) = memory.last_mut() {
                *last = symbol;
            }

            for (i, out) in baseband.iter_mut().enumerate() {
                self.carrier_phase[c] *= self.carrier_step[c];
                *out += shape_sample(memory, &self.taps, m, i) * self.carrier_phase[c];
            }
        }

        for phase in self.carrier_phase.iter_mut() {
            *phase /= phase.norm();
        }

        self.centre
            .shift(&baseband, self.centre_freq)
            .into_iter()
            .map(|x| x * 2.0)
            .collect()
    }
}

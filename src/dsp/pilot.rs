//! Pilot reference and coarse frequency offset estimation
//!
//! The pilot is a BPSK carrier at the centre of the FDM signal whose symbols
//! follow a +1 +1 −1 −1 pattern, so its pulse-shaped waveform repeats every
//! four symbols. The receiver keeps that waveform in a look-up table and uses
//! it to strip the pilot modulation before looking for the residual tone.
//!
//! **Algorithm**:
//! 1. Mix the baseband block with the conjugate pilot waveform under two
//!    timing hypotheses one symbol apart
//! 2. Low-pass filter and decimate the last four symbols of each product
//! 3. Window and FFT both, take the strongest bin inside the search range

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};
use tracing::{instrument, trace};

use super::filter::{hanning, lowpass, root_raised_cosine};
use super::tx::shape_sample;
use crate::config::ModemConfig;

/// Generate four symbols of the steady-state pilot waveform
///
/// The pilot generator is run until its pulse shaping memory is full, then
/// one full period is captured.
pub fn generate_pilot_lut(config: &ModemConfig) -> Vec<Complex32> {
    let m = config.samples_per_symbol;
    let taps = root_raised_cosine(config.filter_len(), m, config.rrc_rolloff);

    let mut memory = vec![Complex32::new(0.0, 0.0); config.filter_symbols];
    let mut symbol = Complex32::new(config.pilot_amplitude, 0.0);
    let mut pilot_bit = false;
    let mut lut = Vec::with_capacity(4 * m);

    for frame in 0..config.filter_symbols + 4 {
        if pilot_bit {
            symbol = -symbol;
        }
        pilot_bit = !pilot_bit;

        memory.rotate_left(1);
        if let Some(last) = memory.last_mut() {
            *last = symbol;
        }

        if frame >= config.filter_symbols {
            lut.extend((0..m).map(|i| shape_sample(&memory, &taps, m, i)));
        }
    }

    lut
}

/// Pilot based coarse frequency offset estimator
pub struct CoarseFreqEstimator {
    lut: Vec<Complex32>,
    lut_index: usize,
    samples_per_symbol: usize,
    coeffs: Vec<f32>,
    decimation: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_len: usize,
    bin_hz: f32,
    search_bins: i32,
    history_len: usize,
    baseband1: Vec<Complex32>,
    baseband2: Vec<Complex32>,
    lpf1: Vec<Complex32>,
    lpf2: Vec<Complex32>,
    s1: Vec<Complex32>,
    s2: Vec<Complex32>,
    estimate_hz: f32,
}

impl CoarseFreqEstimator {
    pub fn new(config: &ModemConfig) -> Self {
        let window_len = config.pilot_window();
        let coeffs = lowpass(config.pilot_coeff_taps, config.pilot_cutoff_hz, config.sample_rate);
        let history_len = window_len + coeffs.len() - 1;
        let decimated = window_len / config.pilot_decimation;
        let nfft = config.pilot_fft_size;

        let bin_hz = config.sample_rate / config.pilot_decimation as f32 / nfft as f32;
        let search_bins = ((config.coarse_search_hz / bin_hz) as i32).min(nfft as i32 / 2 - 1);

        let mut planner = FftPlanner::new();
        let zeros = vec![Complex32::new(0.0, 0.0); history_len];

        Self {
            lut: generate_pilot_lut(config),
            lut_index: 0,
            samples_per_symbol: config.samples_per_symbol,
            coeffs,
            decimation: config.pilot_decimation,
            window: hanning(decimated),
            fft: planner.plan_fft_forward(nfft),
            fft_len: nfft,
            bin_hz,
            search_bins,
            history_len,
            baseband1: zeros.clone(),
            baseband2: zeros,
            lpf1: vec![Complex32::new(0.0, 0.0); decimated],
            lpf2: vec![Complex32::new(0.0, 0.0); decimated],
            s1: vec![Complex32::new(0.0, 0.0); nfft],
            s2: vec![Complex32::new(0.0, 0.0); nfft],
            estimate_hz: 0.0,
        }
    }

    /// Estimate the carrier offset of a baseband block
    ///
    /// The pilot histories are updated on every call so the estimator is
    /// ready the moment it is enabled. With `enable` false the FFT search is
    /// skipped and the previous estimate is returned unchanged.
    #[instrument(level = "trace", skip(self, block), fields(nin = block.len()))]
    pub fn estimate(&mut self, block: &[Complex32], enable: bool) -> f32 {
        let lut_len = self.lut.len();
        for &x in block {
            let p1 = self.lut[self.lut_index];
            let p2 = self.lut[(self.lut_index + self.samples_per_symbol) % lut_len];
            self.baseband1.push(x * p1.conj());
            self.baseband2.push(x * p2.conj());
            self.lut_index = (self.lut_index + 1) % lut_len;
        }
        let excess = self.baseband1.len().saturating_sub(self.history_len);
        self.baseband1.drain(..excess);
        self.baseband2.drain(..excess);

        if !enable {
            return self.estimate_hz;
        }

        self.lpf1 = self.lowpass_decimate(&self.baseband1);
        self.lpf2 = self.lowpass_decimate(&self.baseband2);
        self.s1 = self.spectrum(&self.lpf1);
        self.s2 = self.spectrum(&self.lpf2);

        let nfft = self.s1.len() as i32;
        let power = |k: i32| {
            let idx = k.rem_euclid(nfft) as usize;
            self.s1[idx].norm_sqr().max(self.s2[idx].norm_sqr())
        };

        let mut best_bin = 0;
        let mut best_power = power(0);
        for k in -self.search_bins..=self.search_bins {
            let p = power(k);
            if p > best_power {
                best_bin = k;
                best_power = p;
            }
        }

        self.estimate_hz = best_bin as f32 * self.bin_hz;
        trace!(best_bin, best_power, foff = self.estimate_hz, "coarse peak");
        self.estimate_hz
    }

    fn lowpass_decimate(&self, history: &[Complex32]) -> Vec<Complex32> {
        let taps = self.coeffs.len();
        let outputs = history.len() + 1 - taps;
        (0..outputs)
            .step_by(self.decimation)
            .map(|o| {
                let newest = o + taps - 1;
                self.coeffs
                    .iter()
                    .enumerate()
                    .map(|(t, &h)| history[newest - t] * h)
                    .sum()
            })
            .collect()
    }

    fn spectrum(&self, decimated: &[Complex32]) -> Vec<Complex32> {
        let mut buffer = vec![Complex32::new(0.0, 0.0); self.fft_len];
        for ((b, &x), &w) in buffer.iter_mut().zip(decimated).zip(&self.window) {
            *b = x * w;
        }
        self.fft.process(&mut buffer);
        buffer
    }

    /// Pilot waveform look-up table
    pub fn pilot_lut(&self) -> &[Complex32] {
        &self.lut
    }

    /// Pilot low-pass filter taps
    pub fn pilot_coeffs(&self) -> &[f32] {
        &self.coeffs
    }

    /// Baseband mixed against the pilot, first hypothesis
    pub fn pilot_baseband1(&self) -> &[Complex32] {
        &self.baseband1
    }

    /// Baseband mixed against the pilot, second hypothesis
    pub fn pilot_baseband2(&self) -> &[Complex32] {
        &self.baseband2
    }

    pub fn pilot_lpf1(&self) -> &[Complex32] {
        &self.lpf1
    }

    pub fn pilot_lpf2(&self) -> &[Complex32] {
        &self.lpf2
    }

    /// Spectrum of the first hypothesis from the last enabled search
    pub fn s1(&self) -> &[Complex32] {
        &self.s1
    }

    pub fn s2(&self) -> &[Complex32] {
        &self.s2
    }

    /// Resolution of the coarse search in Hz
    pub fn bin_hz(&self) -> f32 {
        self.bin_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::freq_shift::FreqShifter;

    #[test]
    fn test_pilot_lut_length_and_sign_pattern() {
        let config = ModemConfig::default();
        let lut = generate_pilot_lut(&config);
        let m = config.samples_per_symbol;
        assert_eq!(lut.len(), 4 * m);

        // Pulse peaks land on symbol boundaries of the 3-symbol delayed
        // pilot and follow its +1 +1 -1 -1 period
        let centre = |s: usize| lut[s * m].re;
        let signs: Vec<bool> = (0..4).map(|s| centre(s) > 0.0).collect();
        assert_eq!(signs.iter().filter(|&&p| p).count(), 2);
        assert!(lut.iter().all(|x| x.im == 0.0));
    }

    #[test]
    fn test_disabled_estimator_holds_last_value() {
        let config = ModemConfig::default();
        let mut est = CoarseFreqEstimator::new(&config);
        let block = vec![Complex32::new(0.0, 0.0); config.samples_per_symbol];
        assert_eq!(est.estimate(&block, true), 0.0);
        assert_eq!(est.estimate(&block, false), 0.0);
        assert_eq!(est.pilot_baseband1().len(), 4 * 160 + 29);
    }

    #[test]
    fn test_finds_offset_of_bare_pilot() {
        init_tracing();
        let config = ModemConfig::default();
        let m = config.samples_per_symbol;
        let lut = generate_pilot_lut(&config);
        let mut est = CoarseFreqEstimator::new(&config);
        let mut shifter = FreqShifter::new(config.sample_rate);

        // A clean pilot, aligned with the local reference and offset by 50 Hz
        let offset = 50.0;
        let mut foff = 0.0;
        for frame in 0..8 {
            let block: Vec<Complex32> = (0..m).map(|i| lut[(frame * m + i) % lut.len()]).collect();
            let shifted = shifter.shift(&block, offset);
            foff = est.estimate(&shifted, true);
        }
        assert!((foff - offset).abs() <= est.bin_hz(), "estimated {} Hz", foff);
    }

    #[test]
    fn test_finds_offsets_across_search_range() {
        init_tracing();
        let config = ModemConfig::default();
        let m = config.samples_per_symbol;
        let lut = generate_pilot_lut(&config);

        // Every pilot alignment: shifts of one and three symbols are only
        // matched by the second hypothesis
        for shift in [0, m, 2 * m, 3 * m] {
            for step in -4..=4 {
                let offset = step as f32 * 45.0;
                assert!(offset.abs() < config.coarse_search_hz);

                let mut est = CoarseFreqEstimator::new(&config);
                let mut shifter = FreqShifter::new(config.sample_rate);
                let mut foff = 0.0;
                for frame in 0..8 {
                    let block: Vec<Complex32> = (0..m)
                        .map(|i| lut[(frame * m + i + shift) % lut.len()])
                        .collect();
                    foff = est.estimate(&shifter.shift(&block, offset), true);
                }
                assert!(
                    (foff - offset).abs() <= est.bin_hz(),
                    "shift {} offset {} estimated {}",
                    shift,
                    offset,
                    foff
                );
            }
        }
    }

    fn init_tracing() {
        crate::tracing_init::init_test_tracing();
    }
}

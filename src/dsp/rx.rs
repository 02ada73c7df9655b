//! Receive chain: decimation filter, per-carrier down-conversion and timing
//!
//! Every stage owns its filter memory, so blocks of any length that is a
//! multiple of the sub-block Q can be pushed through frame after frame.

use core::f32::consts::PI;

use rustfft::num_complex::Complex32;

use super::filter::{lowpass, root_raised_cosine};
use crate::config::ModemConfig;

/// FIR over `history`, evaluated with its newest sample at `newest`
fn fir_at(taps: &[f32], history: &[Complex32], newest: usize) -> Complex32 {
    taps.iter()
        .enumerate()
        .map(|(t, &h)| history[newest - t] * h)
        .sum()
}

/// Low-pass filter applied before the per-carrier decimation
#[derive(Debug, Clone)]
pub struct RxDecimator {
    taps: Vec<f32>,
    memory: Vec<Complex32>,
}

impl RxDecimator {
    pub fn new(config: &ModemConfig) -> Self {
        let taps = lowpass(config.rxdec_taps, config.rxdec_cutoff_hz, config.sample_rate);
        let memory = vec![Complex32::new(0.0, 0.0); taps.len() - 1];
        Self { taps, memory }
    }

    /// Filter a block; output has the same length as the input
    pub fn filter(&mut self, block: &[Complex32]) -> Vec<Complex32> {
        let history: Vec<Complex32> = self.memory.iter().chain(block).copied().collect();
        let delay = self.taps.len() - 1;
        let out = (0..block.len())
            .map(|i| fir_at(&self.taps, &history, i + delay))
            .collect();

        self.memory.copy_from_slice(&history[history.len() - delay..]);
        out
    }
}

/// Per-carrier down-converter and matched filter
///
/// Produces P filtered samples per symbol for each carrier, i.e. one output
/// every Q input samples.
#[derive(Debug, Clone)]
pub struct DownConverter {
    taps: Vec<f32>,
    sub_block: usize,
    carrier_step: Vec<Complex32>,
    carrier_phase: Vec<Complex32>,
    /// Down-converted history per carrier, `taps - 1` samples
    memory: Vec<Vec<Complex32>>,
}

impl DownConverter {
    pub fn new(config: &ModemConfig) -> Self {
        let taps = root_raised_cosine(
            config.filter_len(),
            config.samples_per_symbol,
            config.rrc_rolloff,
        );
        let carriers = config.total_carriers();
        let carrier_step = config
            .carrier_freqs()
            .iter()
            .map(|f| Complex32::from_polar(1.0, 2.0 * PI * f / config.sample_rate))
            .collect();

        Self {
            memory: vec![vec![Complex32::new(0.0, 0.0); taps.len() - 1]; carriers],
            taps,
            sub_block: config.sub_block(),
            carrier_step,
            carrier_phase: vec![Complex32::new(1.0, 0.0); carriers],
        }
    }

    /// Down-convert and filter one block
    ///
    /// # Returns
    /// `[carrier][block.len() / Q]` filtered samples
    pub fn process(&mut self, block: &[Complex32]) -> Vec<Vec<Complex32>> {
        let delay = self.taps.len() - 1;
        let outputs = block.len() / self.sub_block;
        let mut rx_filt = Vec::with_capacity(self.memory.len());

        let carriers = self
            .memory
            .iter_mut()
            .zip(self.carrier_phase.iter_mut())
            .zip(&self.carrier_step);
        for ((memory, phase), &step) in carriers {
            let mut history = std::mem::take(memory);
            history.reserve(block.len());
            for &x in block {
                *phase *= step;
                history.push(x * phase.conj());
            }

            let filtered = (0..outputs)
                .map(|k| fir_at(&self.taps, &history, delay + (k + 1) * self.sub_block - 1))
                .collect();
            rx_filt.push(filtered);

            history.drain(..history.len() - delay);
            *memory = history;
            let norm = phase.norm();
            *phase /= norm;
        }

        rx_filt
    }
}

/// Output of the timing estimator for one frame
#[derive(Debug, Clone)]
pub struct TimingEstimate {
    /// Symbol timing in samples; `M/P` means the strobe is centred
    pub rx_timing: f32,
    /// Symbols sampled at the estimated instant, one per carrier
    pub symbols: Vec<Complex32>,
    /// Summed carrier envelope over the timing window
    pub envelope: Vec<f32>,
}

/// Envelope based symbol timing estimator
///
/// The summed envelope of the filtered carriers has a component at the
/// symbol rate whose phase gives the sampling instant.
#[derive(Debug, Clone)]
pub struct TimingEstimator {
    oversample: usize,
    samples_per_symbol: usize,
    timing_symbols: usize,
    /// Last NT·P filtered samples per carrier, oldest first
    memory: Vec<Vec<Complex32>>,
}

impl TimingEstimator {
    pub fn new(config: &ModemConfig) -> Self {
        let len = config.timing_symbols * config.rx_oversample;
        Self {
            oversample: config.rx_oversample,
            samples_per_symbol: config.samples_per_symbol,
            timing_symbols: config.timing_symbols,
            memory: vec![vec![Complex32::new(0.0, 0.0); len]; config.total_carriers()],
        }
    }

    /// Update the window with one frame of filtered samples and estimate
    ///
    /// The envelope peaks once per symbol at the best sampling instant. Its
    /// symbol rate component, correlated against `exp(+j2πi/P)`, has phase
    /// `2π·i0/P` for a peak at window index `i0`. Consuming an extra sub-block
    /// moves the peak one sample earlier in the window and lowers the
    /// estimate by `M/P`.
    ///
    /// # Returns
    /// `None` when the envelope phase is not finite (e.g. NaN input)
    pub fn estimate(&mut self, rx_filt: &[Vec<Complex32>]) -> Option<TimingEstimate> {
        for (memory, filt) in self.memory.iter_mut().zip(rx_filt) {
            memory.drain(..filt.len());
            memory.extend_from_slice(filt);
        }

        let p = self.oversample as f32;
        let window = self.memory[0].len();
        let envelope: Vec<f32> = (0..window)
            .map(|i| self.memory.iter().map(|m| m[i].norm()).sum())
            .collect();

        // Single DFT bin at the symbol rate
        let x: Complex32 = envelope
            .iter()
            .enumerate()
            .map(|(i, &e)| Complex32::from_polar(e, 2.0 * PI * i as f32 / p))
            .sum();
        let norm_timing = x.im.atan2(x.re) / (2.0 * PI);
        if !norm_timing.is_finite() {
            return None;
        }

        // Sampling instant at rate P, centred in the window; indices below
        // are one-based
        let mut instant = norm_timing * p + p / 4.0;
        if instant > p {
            instant -= p;
        }
        if instant < -p {
            instant += p;
        }
        instant += (self.timing_symbols / 2) as f32 * p;

        let low = instant.floor();
        let fract = instant - low;
        let high = instant.ceil();
        let (low, high) = (low as usize, high as usize);
        let symbols = self
            .memory
            .iter()
            .map(|m| m[low - 1] * (1.0 - fract) + m[high - 1] * fract)
            .collect();

        let m = self.samples_per_symbol as f32;
        Some(TimingEstimate {
            rx_timing: norm_timing * m + m / p,
            symbols,
            envelope,
        })
    }
}

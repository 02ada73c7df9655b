//! Modem configuration
//!
//! All tunables of the loopback modem live here. The defaults describe the
//! 14 carrier, 50 baud DQPSK FDM modem sampled at 8 kHz.

use snafu::ensure;

use crate::error::{InvalidConfigSnafu, Result};

/// Configuration for the loopback modem
#[derive(Debug, Clone)]
pub struct ModemConfig {
    /// Sample rate in Hz
    pub sample_rate: f32,
    /// Number of data carriers (the pilot is one extra carrier)
    pub num_carriers: usize,
    /// Samples per symbol, M; also the nominal block size
    pub samples_per_symbol: usize,
    /// Receive filter outputs per symbol, P
    pub rx_oversample: usize,
    /// Spacing between carriers in Hz
    pub carrier_spacing: f32,
    /// Centre of the FDM signal in the passband, Hz
    pub centre_freq: f32,
    /// Pulse shaping filter length in symbols
    pub filter_symbols: usize,
    /// Symbols in the timing estimation window, NT
    pub timing_symbols: usize,
    /// Root raised cosine roll-off
    pub rrc_rolloff: f32,
    /// Pilot symbol magnitude; data symbols have unit magnitude
    pub pilot_amplitude: f32,

    /// Taps in the pilot low-pass filter
    pub pilot_coeff_taps: usize,
    /// Pilot low-pass cutoff in Hz
    pub pilot_cutoff_hz: f32,
    /// Decimation between the pilot low-pass filter and the FFT
    pub pilot_decimation: usize,
    /// FFT size of the coarse estimator (power of 2)
    pub pilot_fft_size: usize,
    /// Coarse search range, +/- Hz
    pub coarse_search_hz: f32,

    /// Taps in the receive decimation filter
    pub rxdec_taps: usize,
    /// Receive decimation filter cutoff in Hz
    pub rxdec_cutoff_hz: f32,

    /// Damping gain of the fine frequency update
    pub track_coeff: f32,
    /// Smoothing coefficient of the SNR accumulators
    pub snr_coeff: f32,

    /// Frames of unique word needed to leave the tentative sync phase
    pub sync_confirm_frames: u32,
    /// Frames without unique word tolerated before sync is dropped
    pub sync_hold_frames: u32,

    /// Channel buffer capacity in samples
    pub channel_capacity: usize,
    /// Silence queued in the channel before the first frame
    pub channel_prefill: usize,
    /// Carrier offset applied by the simulated channel, Hz
    pub channel_offset_hz: f32,
    /// Standard deviation of the channel AWGN (0 disables noise)
    pub channel_noise_std: f32,
    /// Seed of the channel noise generator
    pub channel_seed: u64,

    /// Length of the cycled test bit pattern, in frames
    pub test_bit_frames: usize,
    /// Seed of the test bit pattern
    pub test_bit_seed: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        let m = 160;
        Self {
            sample_rate: 8000.0,
            num_carriers: 14,
            samples_per_symbol: m,
            rx_oversample: 4,
            carrier_spacing: 75.0,
            centre_freq: 1500.0,
            filter_symbols: 6,
            timing_symbols: 5,
            rrc_rolloff: 0.5,
            pilot_amplitude: 2.0,
            pilot_coeff_taps: 30,
            pilot_cutoff_hz: 200.0,
            pilot_decimation: 4,
            pilot_fft_size: 256,
            coarse_search_hz: 200.0,
            rxdec_taps: 31,
            rxdec_cutoff_hz: 1000.0,
            track_coeff: 0.5,
            snr_coeff: 0.9,
            sync_confirm_frames: 25,
            sync_hold_frames: 50,
            channel_capacity: 10 * m,
            channel_prefill: 4 * m,
            channel_offset_hz: 0.0,
            channel_noise_std: 0.0,
            channel_seed: 0x5eed,
            test_bit_frames: 4,
            test_bit_seed: 0x0fd3_d1ff,
        }
    }
}

impl ModemConfig {
    /// Receive sub-block Q = M/P; the granularity of block size changes
    pub fn sub_block(&self) -> usize {
        self.samples_per_symbol / self.rx_oversample
    }

    /// Bits carried by one frame (2 per data carrier)
    pub fn bits_per_frame(&self) -> usize {
        2 * self.num_carriers
    }

    /// Carriers including the pilot
    pub fn total_carriers(&self) -> usize {
        self.num_carriers + 1
    }

    /// Pulse shaping filter length in samples
    pub fn filter_len(&self) -> usize {
        self.filter_symbols * self.samples_per_symbol
    }

    /// Samples of pilot history seen by the coarse estimator
    pub fn pilot_window(&self) -> usize {
        4 * self.samples_per_symbol
    }

    /// Largest block the receiver can ever request
    pub fn max_block(&self) -> usize {
        self.samples_per_symbol + self.sub_block()
    }

    /// Baseband carrier frequencies in Hz, pilot last
    ///
    /// Data carriers sit symmetrically around the pilot at 0 Hz, leaving one
    /// spacing free on each side of it.
    pub fn carrier_freqs(&self) -> Vec<f32> {
        let half = (self.num_carriers / 2) as i32;
        let mut freqs: Vec<f32> = (0..self.num_carriers as i32)
            .map(|c| {
                let slot = if c < half { c - half } else { c - half + 1 };
                slot as f32 * self.carrier_spacing
            })
            .collect();
        freqs.push(0.0);
        freqs
    }

    /// Check that the configuration describes a modem that can run
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.num_carriers > 0,
            InvalidConfigSnafu { reason: "at least one data carrier is required" }
        );
        ensure!(
            self.samples_per_symbol > 0 && self.rx_oversample > 0,
            InvalidConfigSnafu { reason: "samples per symbol and receive oversampling must be non-zero" }
        );
        ensure!(
            self.samples_per_symbol % self.rx_oversample == 0,
            InvalidConfigSnafu {
                reason: format!(
                    "samples per symbol {} is not a multiple of the receive oversampling {}",
                    self.samples_per_symbol, self.rx_oversample
                )
            }
        );
        ensure!(
            self.filter_symbols > 0 && self.timing_symbols > 0,
            InvalidConfigSnafu { reason: "filter and timing windows must span at least one symbol" }
        );
        ensure!(
            self.pilot_coeff_taps > 0 && self.rxdec_taps > 0,
            InvalidConfigSnafu { reason: "filters need at least one tap" }
        );
        ensure!(
            self.pilot_decimation > 0 && self.pilot_window() % self.pilot_decimation == 0,
            InvalidConfigSnafu { reason: "pilot decimation must divide the pilot window" }
        );
        ensure!(
            self.pilot_fft_size.is_power_of_two()
                && self.pilot_fft_size >= self.pilot_window() / self.pilot_decimation,
            InvalidConfigSnafu {
                reason: format!(
                    "pilot FFT size {} must be a power of two holding {} decimated samples",
                    self.pilot_fft_size,
                    self.pilot_window() / self.pilot_decimation
                )
            }
        );

        let required = self.channel_prefill + 2 * self.samples_per_symbol + self.sub_block();
        ensure!(
            self.channel_capacity >= required,
            InvalidConfigSnafu {
                reason: format!(
                    "channel capacity {} cannot absorb one frame of drift (needs {})",
                    self.channel_capacity, required
                )
            }
        );
        ensure!(
            self.channel_prefill >= self.sub_block(),
            InvalidConfigSnafu { reason: "channel prefill must cover one sub-block of drift" }
        );

        let gains = [
            self.sample_rate,
            self.track_coeff,
            self.rrc_rolloff,
            self.pilot_amplitude,
            self.pilot_cutoff_hz,
            self.rxdec_cutoff_hz,
            self.coarse_search_hz,
        ];
        ensure!(
            gains.iter().all(|g| g.is_finite() && *g > 0.0),
            InvalidConfigSnafu { reason: "rates, cutoffs and gains must be finite and positive" }
        );
        ensure!(
            self.snr_coeff.is_finite() && (0.0..1.0).contains(&self.snr_coeff),
            InvalidConfigSnafu { reason: "snr coefficient must lie in [0, 1)" }
        );
        ensure!(
            self.channel_offset_hz.is_finite()
                && self.channel_noise_std.is_finite()
                && self.channel_noise_std >= 0.0,
            InvalidConfigSnafu { reason: "channel impairments must be finite" }
        );
        ensure!(
            self.test_bit_frames > 0,
            InvalidConfigSnafu { reason: "test bit pattern must span at least one frame" }
        );

        Ok(())
    }
}

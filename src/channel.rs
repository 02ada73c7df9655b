//! Loopback channel
//!
//! The transmitter produces a fixed M samples per frame while the receiver
//! consumes a variable `nin`; the channel buffer absorbs the difference.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rustfft::num_complex::Complex32;
use snafu::ensure;
use tracing::trace;

use crate::config::ModemConfig;
use crate::dsp::FreqShifter;
use crate::error::{ChannelOverflowSnafu, ChannelUnderflowSnafu, Result};

/// Bounded FIFO of real channel samples
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    samples: Vec<f32>,
    capacity: usize,
}

impl ChannelBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Samples currently queued
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a block to the tail
    ///
    /// Fails without modifying the buffer if the block does not fit.
    pub fn append(&mut self, block: &[f32]) -> Result<()> {
        ensure!(
            self.samples.len() + block.len() <= self.capacity,
            ChannelOverflowSnafu {
                occupancy: self.samples.len(),
                block: block.len(),
                capacity: self.capacity,
            }
        );
        self.samples.extend_from_slice(block);
        Ok(())
    }

    /// Remove the first `n` samples, returned as complex with zero imaginary part
    ///
    /// Fails without modifying the buffer if fewer than `n` samples are queued.
    pub fn take(&mut self, n: usize) -> Result<Vec<Complex32>> {
        ensure!(
            n <= self.samples.len(),
            ChannelUnderflowSnafu {
                requested: n,
                available: self.samples.len(),
            }
        );
        let out = self
            .samples
            .drain(..n)
            .map(|x| Complex32::new(x, 0.0))
            .collect();
        trace!(taken = n, remaining = self.samples.len(), "channel take");
        Ok(out)
    }
}

/// Channel impairments applied to the transmitted waveform
///
/// Takes the modulator's analytic output, applies an optional carrier
/// offset, keeps the real part and adds optional white Gaussian noise. With
/// the default configuration the channel is ideal.
pub struct ChannelSimulator {
    offset_hz: f32,
    shifter: FreqShifter,
    noise: Option<(Normal<f32>, StdRng)>,
}

impl ChannelSimulator {
    pub fn new(config: &ModemConfig) -> Self {
        let noise = Normal::new(0.0, config.channel_noise_std)
            .ok()
            .filter(|_| config.channel_noise_std > 0.0)
            .map(|normal| (normal, StdRng::seed_from_u64(config.channel_seed)));

        Self {
            offset_hz: config.channel_offset_hz,
            shifter: FreqShifter::new(config.sample_rate),
            noise,
        }
    }

    pub fn apply(&mut self, tx: &[Complex32]) -> Vec<f32> {
        let shifted;
        let tx = if self.offset_hz != 0.0 {
            shifted = self.shifter.shift(tx, self.offset_hz);
            &shifted[..]
        } else {
            tx
        };

        match self.noise.as_mut() {
            Some((normal, rng)) => tx.iter().map(|x| x.re + normal.sample(rng)).collect(),
            None => tx.iter().map(|x| x.re).collect(),
        }
    }
}

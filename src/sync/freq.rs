//! Carrier frequency offset tracking
//!
//! Two regimes share one estimate:
//! 1. Unsynchronized: the coarse pilot search runs every frame and its
//!    result replaces the estimate outright
//! 2. Synchronized: the coarse search is skipped and only the damped fine
//!    update moves the estimate
//!
//! The fine update runs every frame in both regimes.

use rustfft::num_complex::Complex32;
use snafu::ensure;
use tracing::trace;

use super::state::SyncState;
use crate::config::ModemConfig;
use crate::dsp::CoarseFreqEstimator;
use crate::error::{NonFiniteSnafu, Result};

/// Running carrier offset estimate
pub struct FrequencyTracker {
    coarse: CoarseFreqEstimator,
    estimate_hz: f32,
    track_coeff: f32,
}

impl FrequencyTracker {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            coarse: CoarseFreqEstimator::new(config),
            estimate_hz: 0.0,
            track_coeff: config.track_coeff,
        }
    }

    /// Current carrier offset estimate in Hz
    pub fn estimate_hz(&self) -> f32 {
        self.estimate_hz
    }

    pub fn coarse(&self) -> &CoarseFreqEstimator {
        &self.coarse
    }

    /// Run the coarse path over a baseband block
    ///
    /// The search is enabled only while unsynchronized. The pilot histories
    /// are updated regardless.
    ///
    /// # Returns
    /// The coarse estimator output (held from its last search when disabled)
    pub fn estimate(&mut self, baseband: &[Complex32], state: SyncState, frame: u64) -> Result<f32> {
        let coarse = self.coarse.estimate(baseband, !state.is_synchronized());
        ensure!(
            coarse.is_finite(),
            NonFiniteSnafu { quantity: "coarse frequency offset", frame }
        );
        self.accept_coarse(coarse, state);
        Ok(coarse)
    }

    /// Take a coarse estimate; ignored once synchronized
    pub fn accept_coarse(&mut self, coarse_hz: f32, state: SyncState) {
        if state == SyncState::Unsynchronized {
            self.estimate_hz = coarse_hz;
        }
    }

    /// Apply the damped fine update `estimate -= track_coeff * foff_fine`
    pub fn track(&mut self, foff_fine: f32, frame: u64) -> Result<f32> {
        ensure!(
            foff_fine.is_finite(),
            NonFiniteSnafu { quantity: "fine frequency error", frame }
        );
        self.estimate_hz -= self.track_coeff * foff_fine;
        ensure!(
            self.estimate_hz.is_finite(),
            NonFiniteSnafu { quantity: "carrier offset estimate", frame }
        );
        trace!(foff_fine, foff = self.estimate_hz, "fine update");
        Ok(self.estimate_hz)
    }
}

//! Loopback modem: the frame-synchronous control loop
//!
//! One call to [`Loopback::process_frame`] runs a whole frame, in order:
//! 1. Next test bits mapped to DQPSK against the previous transmit symbols
//! 2. Modulate, pass through the channel simulator, append to the channel
//! 3. Take `nin` samples from the channel
//! 4. Shift down from the centre frequency to complex baseband
//! 5. Coarse frequency path, searching only while unsynchronized
//! 6. Correct the carrier offset estimate
//! 7. Decimation filter, down-conversion, timing estimation
//! 8. Demap against the previous receive symbols
//! 9. Update the SNR estimates
//! 10. Choose the next frame's `nin` from the timing estimate
//! 11. Update the sync state from the sync bit
//! 12. Fine frequency update
//! 13. Return every intermediate vector as a [`FrameResult`]
//!
//! `nin` and the frequency estimate computed in steps 10 and 12 are only
//! consumed by the next frame.

use bitvec::prelude::*;
use rustfft::num_complex::Complex32;
use snafu::OptionExt;
use tracing::{debug, instrument, trace, Level};

use crate::channel::{ChannelBuffer, ChannelSimulator};
use crate::config::ModemConfig;
use crate::dsp::{
    bits_to_dqpsk_symbols, qpsk_to_bits, DownConverter, FreqShifter, RxDecimator, SnrEstimator,
    TestBits, TimingEstimator, TxModulator,
};
use crate::error::{NonFiniteSnafu, Result};
use crate::recorder::{FrameLog, Recorder};
use crate::sync::{BlockSizeController, FrequencyTracker, SyncState, SyncStatus, SyncTracker};

/// Everything one frame produced
#[derive(Debug, Clone)]
pub struct FrameResult {
    /// Frame index, starting at 0
    pub frame: u64,
    pub tx_bits: BitVec<u8, Msb0>,
    pub tx_symbols: Vec<Complex32>,
    /// Analytic modulator output; the real part went into the channel
    pub tx_fdm: Vec<Complex32>,
    /// Samples appended to the channel after impairments
    pub channel_samples: Vec<f32>,
    /// Samples consumed by the receiver this frame
    pub nin: usize,
    pub pilot_baseband1: Vec<Complex32>,
    pub pilot_baseband2: Vec<Complex32>,
    pub pilot_lpf1: Vec<Complex32>,
    pub pilot_lpf2: Vec<Complex32>,
    pub s1: Vec<Complex32>,
    pub s2: Vec<Complex32>,
    pub foff_coarse: f32,
    /// Offset removed from this frame's baseband
    pub foff_applied: f32,
    /// Offset estimate after the fine update
    pub foff: f32,
    pub rx_fdm_filter: Vec<Complex32>,
    /// Filtered samples per carrier, `nin / Q` each
    pub rx_filt: Vec<Vec<Complex32>>,
    pub envelope: Vec<f32>,
    pub rx_timing: f32,
    pub rx_symbols: Vec<Complex32>,
    pub phase_difference: Vec<Complex32>,
    pub rx_bits: BitVec<u8, Msb0>,
    pub sync_bit: bool,
    pub foff_fine: f32,
    pub sig_est: Vec<f32>,
    pub noise_est: Vec<f32>,
    pub sync: SyncStatus,
    /// Samples the next frame will consume
    pub next_nin: usize,
}

/// Constant vectors recorded alongside the frame logs
#[derive(Debug, Clone)]
pub struct ReferenceVectors {
    pub pilot_lut: Vec<Complex32>,
    pub pilot_coeff: Vec<f32>,
}

/// State the receiver carries from one frame to the next
pub struct ModemState {
    freq: FrequencyTracker,
    sync: SyncTracker,
    prev_tx_symbols: Vec<Complex32>,
    prev_rx_symbols: Vec<Complex32>,
    tx_pilot_bit: bool,
    snr: SnrEstimator,
    baseband_shift: FreqShifter,
    foff_shift: FreqShifter,
    rxdec: RxDecimator,
    down_converter: DownConverter,
    timing: TimingEstimator,
}

impl ModemState {
    pub fn new(config: &ModemConfig) -> Self {
        let carriers = config.total_carriers();
        let mut prev_tx_symbols = vec![Complex32::new(1.0, 0.0); carriers];
        prev_tx_symbols[config.num_carriers] = Complex32::new(config.pilot_amplitude, 0.0);

        Self {
            freq: FrequencyTracker::new(config),
            sync: SyncTracker::new(config),
            prev_tx_symbols,
            prev_rx_symbols: vec![Complex32::new(1.0, 0.0); carriers],
            tx_pilot_bit: false,
            snr: SnrEstimator::new(carriers, config.snr_coeff),
            baseband_shift: FreqShifter::new(config.sample_rate),
            foff_shift: FreqShifter::new(config.sample_rate),
            rxdec: RxDecimator::new(config),
            down_converter: DownConverter::new(config),
            timing: TimingEstimator::new(config),
        }
    }

    /// Current carrier offset estimate in Hz
    pub fn carrier_offset(&self) -> f32 {
        self.freq.estimate_hz()
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn prev_tx_symbols(&self) -> &[Complex32] {
        &self.prev_tx_symbols
    }

    pub fn prev_rx_symbols(&self) -> &[Complex32] {
        &self.prev_rx_symbols
    }

    pub fn snr(&self) -> &SnrEstimator {
        &self.snr
    }
}

/// Transmitter, channel and receiver driven one frame at a time
pub struct Loopback {
    config: ModemConfig,
    test_bits: TestBits,
    modulator: TxModulator,
    simulator: ChannelSimulator,
    channel: ChannelBuffer,
    block_size: BlockSizeController,
    state: ModemState,
    nin: usize,
    frame: u64,
}

impl Loopback {
    /// Build the loop and queue the channel prefill
    pub fn new(config: ModemConfig) -> Result<Self> {
        config.validate()?;

        let mut channel = ChannelBuffer::new(config.channel_capacity);
        channel.append(&vec![0.0; config.channel_prefill])?;

        Ok(Self {
            test_bits: TestBits::new(&config),
            modulator: TxModulator::new(&config),
            simulator: ChannelSimulator::new(&config),
            channel,
            block_size: BlockSizeController::new(config.samples_per_symbol, config.sub_block()),
            state: ModemState::new(&config),
            nin: config.samples_per_symbol,
            frame: 0,
            config,
        })
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    pub fn state(&self) -> &ModemState {
        &self.state
    }

    pub fn channel(&self) -> &ChannelBuffer {
        &self.channel
    }

    /// Samples the next frame will consume
    pub fn nin(&self) -> usize {
        self.nin
    }

    /// Index of the next frame
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn reference(&self) -> ReferenceVectors {
        let coarse = self.state.freq.coarse();
        ReferenceVectors {
            pilot_lut: coarse.pilot_lut().to_vec(),
            pilot_coeff: coarse.pilot_coeffs().to_vec(),
        }
    }

    /// Run one frame of the loop
    #[instrument(level = "debug", skip(self), fields(frame = self.frame, nin = self.nin))]
    pub fn process_frame(&mut self) -> Result<FrameResult> {
        let frame = self.frame;
        let nin = self.nin;
        let state = &mut self.state;

        let tx_bits = self.test_bits.next_frame();
        let tx_symbols =
            bits_to_dqpsk_symbols(&state.prev_tx_symbols, &tx_bits, &mut state.tx_pilot_bit);
        state.prev_tx_symbols.clone_from(&tx_symbols);

        let tx_fdm = self.modulator.modulate(&tx_symbols);
        let channel_samples = self.simulator.apply(&tx_fdm);
        self.channel.append(&channel_samples)?;

        let rx_fdm = self.channel.take(nin)?;
        let baseband = state.baseband_shift.shift(&rx_fdm, -self.config.centre_freq);

        let sync_before = state.sync.state();
        let foff_coarse = state.freq.estimate(&baseband, sync_before, frame)?;
        let foff_applied = state.freq.estimate_hz();
        let corrected = state.foff_shift.shift(&baseband, -foff_applied);

        let rx_fdm_filter = state.rxdec.filter(&corrected);
        let rx_filt = state.down_converter.process(&rx_fdm_filter);
        let timing = state
            .timing
            .estimate(&rx_filt)
            .context(NonFiniteSnafu { quantity: "timing estimate", frame })?;

        let demapped = qpsk_to_bits(&state.prev_rx_symbols, &timing.symbols);
        state.prev_rx_symbols.clone_from(&timing.symbols);
        state.snr.update(&demapped.phase_difference);

        let next_nin = self.block_size.next_block_size(timing.rx_timing);
        let sync = state.sync.update(demapped.sync_bit);
        let foff = state.freq.track(demapped.foff_fine, frame)?;

        debug!(
            frame,
            nin,
            foff,
            foff_coarse,
            rx_timing = timing.rx_timing,
            sync = ?sync.state,
            next_nin,
            "frame done"
        );
        if tracing::enabled!(Level::TRACE) {
            trace!(snr_db = state.snr.snr_db(), occupancy = self.channel.len(), "receiver");
        }

        self.nin = next_nin;
        self.frame += 1;

        let coarse = state.freq.coarse();
        Ok(FrameResult {
            frame,
            tx_bits,
            tx_symbols,
            tx_fdm,
            channel_samples,
            nin,
            pilot_baseband1: coarse.pilot_baseband1().to_vec(),
            pilot_baseband2: coarse.pilot_baseband2().to_vec(),
            pilot_lpf1: coarse.pilot_lpf1().to_vec(),
            pilot_lpf2: coarse.pilot_lpf2().to_vec(),
            s1: coarse.s1().to_vec(),
            s2: coarse.s2().to_vec(),
            foff_coarse,
            foff_applied,
            foff,
            rx_fdm_filter,
            rx_filt,
            envelope: timing.envelope,
            rx_timing: timing.rx_timing,
            rx_symbols: timing.symbols,
            phase_difference: demapped.phase_difference,
            rx_bits: demapped.bits,
            sync_bit: demapped.sync_bit,
            foff_fine: demapped.foff_fine,
            sig_est: state.snr.sig_est().to_vec(),
            noise_est: state.snr.noise_est().to_vec(),
            sync,
            next_nin,
        })
    }

    /// Run `frames` frames, handing each result to the log
    ///
    /// The log is finished at the end so cumulative output is written.
    pub fn run<R: Recorder>(
        &mut self,
        frames: usize,
        log: &mut FrameLog,
        recorder: &mut R,
    ) -> Result<()> {
        for _ in 0..frames {
            let result = self.process_frame()?;
            log.push(result, recorder)?;
        }
        log.finish(recorder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModemError;

    fn init_tracing() {
        crate::tracing_init::init_test_tracing();
    }

    #[test]
    fn test_new_prefills_channel() {
        let config = ModemConfig::default();
        let lb = Loopback::new(config.clone()).unwrap();
        assert_eq!(lb.channel().len(), config.channel_prefill);
        assert_eq!(lb.nin(), config.samples_per_symbol);
        assert_eq!(lb.state().sync_state(), SyncState::Unsynchronized);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ModemConfig {
            num_carriers: 0,
            ..ModemConfig::default()
        };
        assert!(matches!(Loopback::new(config), Err(ModemError::InvalidConfig { .. })));
    }

    #[test]
    fn test_frame_vectors_have_expected_sizes() {
        init_tracing();
        let config = ModemConfig::default();
        let mut lb = Loopback::new(config.clone()).unwrap();
        let carriers = config.total_carriers();

        for expected in 0..6 {
            let r = lb.process_frame().unwrap();
            assert_eq!(r.frame, expected);
            assert_eq!(r.tx_bits.len(), config.bits_per_frame());
            assert_eq!(r.rx_bits.len(), config.bits_per_frame());
            assert_eq!(r.tx_symbols.len(), carriers);
            assert_eq!(r.tx_fdm.len(), config.samples_per_symbol);
            assert_eq!(r.rx_fdm_filter.len(), r.nin);
            assert!(r.rx_filt.iter().all(|c| c.len() == r.nin / config.sub_block()));
            assert_eq!(r.rx_symbols.len(), carriers);
            assert_eq!(r.sig_est.len(), carriers);
            assert_eq!(r.s1.len(), config.pilot_fft_size);
            assert_eq!(lb.nin(), r.next_nin);
        }
        assert_eq!(lb.frame(), 6);
    }

    #[test]
    fn test_prev_symbols_hold_last_frame() {
        let mut lb = Loopback::new(ModemConfig::default()).unwrap();
        let r = lb.process_frame().unwrap();
        assert_eq!(lb.state().prev_tx_symbols(), &r.tx_symbols[..]);
        assert_eq!(lb.state().prev_rx_symbols(), &r.rx_symbols[..]);
    }

    #[test]
    fn test_occupancy_follows_nin() {
        let config = ModemConfig::default();
        let mut lb = Loopback::new(config.clone()).unwrap();
        let mut expected = config.channel_prefill;
        for _ in 0..20 {
            let r = lb.process_frame().unwrap();
            expected = expected + config.samples_per_symbol - r.nin;
            assert_eq!(lb.channel().len(), expected);
        }
    }
}

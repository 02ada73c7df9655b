//! FDM DQPSK signal processing primitives
//!
//! Each primitive is a struct owning its own filter memory; the control loop
//! calls them in order once per frame and never looks inside that memory.
//!
//! **Module Organization**:
//! - `filter` - Coefficient design (RRC, windowed sinc, windows)
//! - `freq_shift` - Continuous-phase frequency shifter
//! - `tx` - Test bits, DQPSK mapping, FDM modulator
//! - `pilot` - Pilot reference and coarse frequency estimation
//! - `rx` - Decimation filter, down-converter, timing estimator
//! - `demap` - DQPSK demapper and SNR estimator

pub mod demap;
pub mod filter;
pub mod freq_shift;
pub mod pilot;
pub mod rx;
pub mod tx;

pub use demap::{qpsk_to_bits, Demapped, SnrEstimator};
pub use freq_shift::FreqShifter;
pub use pilot::{generate_pilot_lut, CoarseFreqEstimator};
pub use rx::{DownConverter, RxDecimator, TimingEstimate, TimingEstimator};
pub use tx::{bits_to_dqpsk_symbols, TestBits, TxModulator};

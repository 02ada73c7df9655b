//! Error type shared by the control loop, the channel and the recorders.
//!
//! Every variant is fatal for the run: the loop is a deterministic closed-loop
//! simulation, so a violation means the feedback state can no longer be trusted.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ModemError {
    /// Configuration cannot describe a working modem
    #[snafu(display("invalid modem configuration: {reason}"))]
    InvalidConfig { reason: String },

    /// Appending a transmit block would exceed the channel capacity
    #[snafu(display(
        "channel overflow: {occupancy} queued + {block} appended exceeds capacity {capacity}"
    ))]
    ChannelOverflow {
        occupancy: usize,
        block: usize,
        capacity: usize,
    },

    /// The receiver asked for more samples than the channel holds
    #[snafu(display("channel underflow: requested {requested} samples, {available} available"))]
    ChannelUnderflow { requested: usize, available: usize },

    /// A feedback quantity left the finite range
    #[snafu(display("non-finite {quantity} in frame {frame}"))]
    NonFinite { quantity: &'static str, frame: u64 },

    /// Writing a recorded vector failed
    #[snafu(display("failed to record {name}"))]
    Record {
        name: String,
        source: std::io::Error,
    },

    /// Writing the channel waveform to WAV failed
    #[snafu(display("failed to write channel waveform"))]
    Wav { source: hound::Error },
}

pub type Result<T, E = ModemError> = std::result::Result<T, E>;

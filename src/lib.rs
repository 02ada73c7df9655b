pub mod channel;
pub mod config;
pub mod dsp;
pub mod error;
pub mod modem;
pub mod recorder;
pub mod sync;
pub mod tracing_init;
pub mod wav;

pub use config::ModemConfig;
pub use error::{ModemError, Result};
pub use modem::{FrameResult, Loopback, ModemState};
pub use recorder::{FrameLog, MemoryRecorder, OctaveWriter, OutputMode, Recorder};
pub use sync::SyncState;

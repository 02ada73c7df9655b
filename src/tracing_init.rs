//! Tracing subscribers for the loopback driver and the test suite
//!
//! The control loop logs at three levels:
//! - `info`/`warn`: sync acquired and lost, run summary from `tfdmdv`
//! - `debug`: one `frame done` event per frame (nin, offsets, timing, sync)
//!   plus sync phase changes
//! - `trace`: coarse peak search, fine tracker updates, channel occupancy
//!
//! `RUST_LOG` overrides the default filter, e.g.
//! `RUST_LOG=fdmdv_sync::modem=debug,fdmdv_sync::dsp::pilot=trace`.

#[cfg(test)]
use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` if set, otherwise `default`
fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Install the test subscriber once per test binary
///
/// Output goes through the test writer so it is only shown for failing
/// tests. Only warnings (sync loss) are shown unless `RUST_LOG` says
/// otherwise.
#[cfg(test)]
pub fn init_test_tracing() {
    static TRACING: Lazy<()> = Lazy::new(|| {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter("fdmdv_sync=warn"))
            .with_target(true)
            .with_line_number(true)
            .with_test_writer()
            .init();
    });

    Lazy::force(&TRACING);
}

/// Install the subscriber for `tfdmdv`; call once at the top of `main`
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter("fdmdv_sync=info,tfdmdv=info"))
        .with_target(true)
        .init();
}

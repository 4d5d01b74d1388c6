//! Logging and tracing configuration for seghash
//!
//! Diagnostics go to stderr so that progress output and `--json` results on
//! stdout stay clean.
//!
//! # Log Levels
//!
//! - `error` - Errors that stop a calculation or verification
//! - `warn`  - Invalid manifest rows and other recoverable surprises
//! - `info`  - Run start/finish, outputs created (default in release, unless
//!   a progress bar is drawn, which lowers the default to `warn`)
//! - `debug` - Per-stage statistics, diffs (default in debug builds)
//! - `trace` - Per-chunk and per-segment detail
//!
//! # Environment Variable Control
//!
//! `RUST_LOG` overrides the defaults:
//! ```bash
//! RUST_LOG=seghash=trace seghash calc image.dd md5
//! RUST_LOG=seghash::manifest=debug seghash verify image.dd hashes.csv
//! ```

use std::io;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default directive when `RUST_LOG` is unset. Lines written to stderr
/// while a progress bar is drawn tear it, so only warnings and errors pass
/// then.
fn default_directive(verbose: bool, progress_bar: bool) -> &'static str {
    if verbose {
        "seghash=trace"
    } else if progress_bar {
        "seghash=warn"
    } else if cfg!(debug_assertions) {
        "seghash=debug"
    } else {
        "seghash=info"
    }
}

fn default_filter(verbose: bool, progress_bar: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, progress_bar)))
}

/// Initialize the logging/tracing system
///
/// Call once at startup; later calls are ignored. Pass `progress_bar` when a
/// progress bar will be drawn on stderr.
pub fn init(progress_bar: bool) {
    let subscriber = tracing_subscriber::registry().with(default_filter(false, progress_bar)).with(
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Initialize logging with file:line and thread IDs, for `-v`
pub fn init_verbose() {
    let subscriber = tracing_subscriber::registry().with(default_filter(true, false)).with(
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .compact(),
    );

    let _ = tracing::subscriber::set_global_default(subscriber);
}

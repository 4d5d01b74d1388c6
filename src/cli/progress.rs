// Byte progress bar for calc and verify runs

use std::sync::OnceLock;

use indicatif::{ProgressBar, ProgressStyle};

const PB_STYLE: &str =
    "{spinner:.blue} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";

const PB_CHARS: &str = "█▓▒░  ";

const INCOMPLETE_NOTE: &str = "Progress percentage is different from 100 due to overlapping or lack of segments \
in hashes file (different data size was expected to be processed).\n";

fn style() -> ProgressStyle {
    static PB_TEMPLATE: OnceLock<Option<ProgressStyle>> = OnceLock::new();
    PB_TEMPLATE
        .get_or_init(|| {
            ProgressStyle::with_template(PB_STYLE)
                .ok()
                .map(|style| style.progress_chars(PB_CHARS))
        })
        .clone()
        .unwrap_or_else(ProgressStyle::default_bar)
}

/// Tracks bytes read against the size of the input. Hidden trackers accept
/// updates and ignore them.
pub struct ProgressTracker {
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        let bar = ProgressBar::new(total);
        bar.set_style(style());
        Self { bar: Some(bar) }
    }

    pub fn hidden() -> Self {
        Self { bar: None }
    }

    /// Callback for the streamer's per-read byte counts
    pub fn callback(&self) -> impl FnMut(u64) + Send + 'static {
        let bar = self.bar.clone();
        move |bytes| {
            if let Some(bar) = &bar {
                bar.inc(bytes);
            }
        }
    }

    pub fn position(&self) -> Option<u64> {
        self.bar.as_ref().map(ProgressBar::position)
    }

    /// Stop the bar and return `message`, prefixed with a note when the bar
    /// did not reach its total
    pub fn finish(&self, message: String) -> String {
        match &self.bar {
            Some(bar) => {
                // finish() jumps to the total, so compare first
                if bar.position() != bar.length().unwrap_or(0) {
                    bar.abandon();
                    format!("{INCOMPLETE_NOTE}{message}")
                } else {
                    bar.finish();
                    message
                }
            }
            None => message,
        }
    }
}

//! Terminal progress for the sequential pipeline phases

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::LazyLock;
use std::time::Duration;

static PHASE_STYLE: LazyLock<ProgressStyle> = LazyLock::new(|| {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {prefix:<24} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
});

/// Creates one bar per pipeline phase; everything becomes a no-op when
/// progress display is disabled.
pub struct PipelineProgress {
    enabled: bool,
}

impl PipelineProgress {
    pub const fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Start a counted phase. The total may be corrected later through
    /// [`PhaseBar::update`].
    pub fn phase(&self, label: &'static str, total: usize) -> PhaseBar {
        let bar = if self.enabled {
            ProgressBar::new(total as u64)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(PHASE_STYLE.clone());
        bar.set_prefix(label);
        PhaseBar { bar }
    }

    /// Start an uncounted phase (downloads, session setup).
    pub fn spinner(&self, message: &'static str) -> PhaseBar {
        let bar = if self.enabled {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(120));
        PhaseBar { bar }
    }
}

/// Handle for one running phase.
pub struct PhaseBar {
    bar: ProgressBar,
}

impl PhaseBar {
    pub fn update(&self, done: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(done as u64);
    }

    /// Attach a short note after the counter, e.g. the latest object count.
    pub fn note(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    /// Complete a counted phase, leaving its final state on the terminal.
    pub fn finish(&self) {
        self.bar.finish();
    }

    /// Complete an uncounted phase, removing the spinner line.
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

//! Shared progress display
//!
//! One handle is created per run and cloned into every job. It serializes
//! terminal redraws between workers and guards no data.

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{prefix:>12.bold.dim} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Cloneable handle onto the run's progress display
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    multi: MultiProgress,
}

impl ProgressHandle {
    /// Handle drawing to stderr
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
        }
    }

    /// Handle that never draws (tests, `--quiet`)
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        }
    }

    /// Append a bar below existing ones
    pub fn bar(&self, len: u64, label: &str) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new(len));
        decorate(&bar, label);
        bar
    }

    /// Place a bar at display row `slot`
    pub fn slot_bar(&self, slot: usize, len: u64, label: &str) -> ProgressBar {
        let bar = self.multi.insert(slot, ProgressBar::new(len));
        decorate(&bar, label);
        bar
    }

    /// Run `f` with the bars cleared, so log output does not tear them
    pub fn suspend<F: FnOnce() -> R, R>(&self, f: F) -> R {
        self.multi.suspend(f)
    }
}

impl Default for ProgressHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn decorate(bar: &ProgressBar, label: &str) {
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    bar.set_style(style);
    bar.set_prefix(label.to_string());
}

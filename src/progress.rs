//! Progress indicators for ncedit.

use crate::ui;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use reconcile::BatchProgress;
use std::time::Duration;

/// Create a ticking spinner with a message
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Stop a spinner and leave a success line
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    ui::success(msg);
}

/// Stop a spinner and leave an error line
pub fn finish_error(pb: &ProgressBar, msg: &str) {
    pb.finish_and_clear();
    ui::error(msg);
}

/// Prints batch progress, one line per phase
pub struct BatchReporter {
    quiet: bool,
    settle: Option<ProgressBar>,
}

impl BatchReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            settle: None,
        }
    }
}

impl BatchProgress for BatchReporter {
    fn on_group_start(&mut self, group: &str) {
        if !self.quiet {
            ui::section(group);
        }
    }

    fn on_phase_saved(&mut self, _group: &str, phase: &str) {
        if !self.quiet {
            ui::success(&format!("{phase}: changes saved"));
        }
    }

    fn on_phase_up_to_date(&mut self, _group: &str, phase: &str) {
        if !self.quiet {
            println!("  {} {}", "·".dimmed(), format!("{phase}: up to date").dimmed());
        }
    }

    fn on_settle_start(&mut self, duration: Duration) {
        if !self.quiet {
            self.settle = Some(spinner(&format!(
                "Waiting {}s for classes to refresh...",
                duration.as_secs()
            )));
        }
    }

    fn on_settle_complete(&mut self) {
        if let Some(pb) = self.settle.take() {
            finish_success(&pb, "Classes refreshed");
        }
    }
}

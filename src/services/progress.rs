use crate::core::session::ProgressSnapshot;
use crate::core::story::PageStatus;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

/// Updates arrive in emission order; the snapshot is a read-only copy.
pub trait ProgressSink: Send + Sync {
    fn update(&self, snapshot: &ProgressSnapshot, message: &str);
}

/// Rounded to nearest; `total == 0` reports 0 rather than dividing by zero.
pub fn percent(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

pub fn pages_line(snapshot: &ProgressSnapshot) -> String {
    format!("Page {} of {}", snapshot.completed, snapshot.total)
}

/// One marker per page: `.` waiting, `~` generating, `#` complete, `!` error.
pub fn badge_row(statuses: &[PageStatus]) -> String {
    statuses.iter().map(PageStatus::marker).collect()
}

pub struct TermProgress {
    bar: ProgressBar,
}

impl TermProgress {
    pub fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        Ok(Self { bar })
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    // Failed runs leave the bar in place without marking it complete.
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl ProgressSink for TermProgress {
    fn update(&self, snapshot: &ProgressSnapshot, message: &str) {
        self.bar.set_length(snapshot.total as u64);
        self.bar.set_position(snapshot.completed as u64);
        self.bar.set_message(format!(
            "{}% {} [{}] {}",
            percent(snapshot.completed, snapshot.total),
            pages_line(snapshot),
            badge_row(&snapshot.statuses),
            message
        ));
    }
}

/// Used when running unattended.
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&self, _snapshot: &ProgressSnapshot, _message: &str) {}
}

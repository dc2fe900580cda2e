//! 📊 progress.rs: "Are we there yet?" Every reindex, every time, forever.
//!
//! 🚀 One [`ReindexProgress`] per run. It owns the last percentage it announced and the
//! moment the transfer started, so nothing about progress lives in globals and nothing
//! leaks from one run into the next.
//!
//! ⚠️ Watching this progress bar will not make it go faster. Science says no.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

/// ⏱️ Formats a Duration into MM:SS or HH:MM:SS.
/// If it shows HH:MM:SS, you should probably call your mom. It's been a while.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// 🔢 `(processed / total) × 100`, truncated, capped at 100. `None` when total is 0.
pub fn percent_of(processed: u64, total: u64) -> Option<u64> {
    if total == 0 {
        return None;
    }
    let percent = (processed as u128 * 100) / total as u128;
    Some(percent.min(100) as u64)
}

/// 📊 Monotonic, deduplicated progress for one reindex.
///
/// Only announces a percentage when it is strictly greater than the last one announced.
/// Repeats and backwards steps are swallowed silently, like a good poker face.
pub struct ReindexProgress {
    label: String,
    last_percent: Option<u64>,
    started: Instant,
    progress_bar: ProgressBar,
}

impl std::fmt::Debug for ReindexProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ReindexProgress")
            .field("label", &self.label)
            .field("last_percent", &self.last_percent)
            .finish()
    }
}

impl ReindexProgress {
    /// 🚀 A tracker with a terminal bar. indicatif hides it on its own when stderr isn't a TTY.
    pub fn new(label: impl Into<String>) -> Self {
        let progress_bar = ProgressBar::new(100);
        // -- 🐛 template is a literal; if it ever fails to parse we fall back to the default look
        if let Ok(style) = ProgressStyle::default_bar().template("{msg}\n| [{bar:40.cyan/blue}] {pos}%") {
            progress_bar.set_style(style.progress_chars("=>-"));
        }
        Self::with_bar(label.into(), progress_bar)
    }

    /// 🙈 Same bookkeeping, no terminal output. For tests and pipes.
    pub fn hidden(label: impl Into<String>) -> Self {
        Self::with_bar(label.into(), ProgressBar::hidden())
    }

    fn with_bar(label: String, progress_bar: ProgressBar) -> Self {
        progress_bar.set_message(format!("reindexing: {}", label));
        Self {
            label,
            last_percent: None,
            started: Instant::now(),
            progress_bar,
        }
    }

    /// ⏱️ Reset the clock. Called when the first byte is about to move.
    pub fn start(&mut self) {
        self.started = Instant::now();
        self.last_percent = None;
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn last_percent(&self) -> Option<u64> {
        self.last_percent
    }

    /// 🔄 Feed it cumulative counts after each batch. Returns the percentage if it was announced.
    pub fn observe(&mut self, processed: u64, total: u64) -> Option<u64> {
        let percent = percent_of(processed, total)?;
        if self.last_percent.is_some_and(|last| percent <= last) {
            return None;
        }
        self.last_percent = Some(percent);
        info!(
            "🔄 Reindexing... {}% [Time elapsed: {}]",
            percent,
            format_duration(self.elapsed())
        );
        self.progress_bar.set_position(percent);
        Some(percent)
    }

    /// ✅ Ring the bell. We made it. (Or we hit the end of the scroll. Same energy.)
    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}

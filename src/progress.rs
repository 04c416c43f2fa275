//! In-memory session log and progress rendering.
//!
//! One [`SessionLog`] lives for the duration of a batch run. Workers append
//! timestamped lines from any task; readers take owned snapshots. The buffer
//! is bounded: past a high-water mark it truncates to the most recent lines,
//! so a long batch cannot grow it without limit.

use parking_lot::Mutex;

use crate::model::DownloadItem;

/// Line count that triggers truncation.
const LOG_HIGH_WATER: usize = 200;

/// Lines kept after truncation.
const LOG_KEEP: usize = 100;

/// Items rendered per snapshot before eliding the rest.
const ITEMS_SHOWN: usize = 50;

/// Severity tag for a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Ok,
    Warn,
    Error,
    Download,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            Self::Info => "[INFO]",
            Self::Ok => "[OK]",
            Self::Warn => "[WARN]",
            Self::Error => "[ERR]",
            Self::Download => "[DL]",
        }
    }
}

#[derive(Default)]
struct LogState {
    lines: Vec<String>,
    completed: u32,
    failed: u32,
    skipped: u32,
    total: u32,
}

/// Shared, bounded log for one batch session.
///
/// A single lock guards both the lines and the counters so a snapshot is
/// internally consistent.
#[derive(Default)]
pub struct SessionLog {
    state: Mutex<LogState>,
}

impl SessionLog {
    pub fn new(total: u32) -> Self {
        Self {
            state: Mutex::new(LogState {
                total,
                ..Default::default()
            }),
        }
    }

    /// Append one timestamped line.
    pub fn log(&self, level: LogLevel, message: &str) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        let line = format!("[{stamp}] {} {message}", level.tag());
        let mut state = self.state.lock();
        state.lines.push(line);
        if state.lines.len() > LOG_HIGH_WATER {
            let start = state.lines.len() - LOG_KEEP;
            state.lines.drain(..start);
        }
    }

    /// Fix the item total once expansion has resolved it.
    pub fn set_total(&self, total: u32) {
        self.state.lock().total = total;
    }

    /// Record one item reaching a terminal state.
    pub fn count_completed(&self) {
        self.state.lock().completed += 1;
    }

    pub fn count_failed(&self) {
        self.state.lock().failed += 1;
    }

    pub fn count_skipped(&self) {
        self.state.lock().skipped += 1;
    }

    /// (completed, failed, skipped, total) snapshot.
    pub fn counters(&self) -> (u32, u32, u32, u32) {
        let state = self.state.lock();
        (state.completed, state.failed, state.skipped, state.total)
    }

    /// The most recent `limit` lines joined with newlines.
    pub fn get_logs(&self, limit: usize) -> String {
        let state = self.state.lock();
        let start = state.lines.len().saturating_sub(limit);
        state.lines[start..].join("\n")
    }

    /// Number of retained lines.
    pub fn line_count(&self) -> usize {
        self.state.lock().lines.len()
    }

    /// One-line progress summary, e.g. "4/10 (40%) | 3 ok, 1 failed, 0 skipped".
    pub fn render_progress(&self) -> String {
        let state = self.state.lock();
        let done = state.completed + state.failed + state.skipped;
        let percent = if state.total > 0 {
            done * 100 / state.total
        } else {
            0
        };
        format!(
            "{}/{} ({}%) | {} ok, {} failed, {} skipped",
            done, state.total, percent, state.completed, state.failed, state.skipped
        )
    }
}

/// Render item status lines, capped with a trailing "+N more".
pub fn render_items(items: &[DownloadItem]) -> String {
    let mut lines: Vec<String> = items
        .iter()
        .take(ITEMS_SHOWN)
        .map(DownloadItem::status_line)
        .collect();
    if items.len() > ITEMS_SHOWN {
        lines.push(format!("... +{} more", items.len() - ITEMS_SHOWN));
    }
    lines.join("\n")
}

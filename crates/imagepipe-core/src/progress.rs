//! Per-file progress reporting for verbose stages.
//!
//! The stage runner calls a [`ProgressReporter`] after every finished file.
//! Calls come from a single task even when transforms run in parallel, so
//! `completed` only ever grows within a stage.

use std::io::Write;
use std::sync::Mutex;

/// Width of the bar, in cells
const BAR_WIDTH: usize = 10;

/// Width of the file name column
const NAME_WIDTH: usize = 80;

/// Snapshot handed to a reporter after a file finishes.
#[derive(Debug, Clone, Copy)]
pub struct StageProgress<'a> {
    /// Name of the running stage
    pub stage: &'a str,
    /// Files finished so far, including this one
    pub completed: usize,
    /// Files in the stage
    pub total: usize,
    /// Original basename of the file that just finished
    pub current_name: &'a str,
    /// Resident memory of the process, when it could be sampled
    pub memory_bytes: Option<u64>,
}

/// Receives stage progress.
pub trait ProgressReporter: Send + Sync {
    /// A stage is about to process `total` files.
    fn stage_started(&self, _stage: &str, _total: usize) {}

    /// One more file finished.
    fn report(&self, progress: &StageProgress<'_>);

    /// The stage finished (successfully or not).
    fn stage_finished(&self, _stage: &str) {}
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _progress: &StageProgress<'_>) {}
}

/// Redraws a single status line on stderr after every file.
#[derive(Debug, Default)]
pub struct ConsoleProgress {
    // Serialises writers sharing one reporter across pipes
    lock: Mutex<()>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressReporter for ConsoleProgress {
    fn stage_started(&self, stage: &str, total: usize) {
        tracing::debug!("Running {} on {} file(s)", stage, total);
    }

    fn report(&self, progress: &StageProgress<'_>) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{}", format_line(progress));
        let _ = stderr.flush();
    }

    fn stage_finished(&self, _stage: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let _ = writeln!(std::io::stderr());
    }
}

/// Render one status line:
/// ` [||||      ]  File: name...  RAM: 12.34MB  (4/10 completed) `
pub fn format_line(progress: &StageProgress<'_>) -> String {
    let filled = if progress.total == 0 {
        BAR_WIDTH
    } else {
        (progress.completed * BAR_WIDTH / progress.total).min(BAR_WIDTH)
    };
    let memory = match progress.memory_bytes {
        Some(bytes) => format!("{:.2}MB", bytes as f64 / 1_000_000.0),
        None => "n/a".to_string(),
    };

    format!(
        " [{}{}]  File: {}  RAM: {}  ({}/{} completed) ",
        "|".repeat(filled),
        " ".repeat(BAR_WIDTH - filled),
        fit_name(progress.current_name),
        memory,
        progress.completed,
        progress.total
    )
}

/// Pad or truncate a name to exactly `NAME_WIDTH` characters.
fn fit_name(name: &str) -> String {
    let len = name.chars().count();
    if len > NAME_WIDTH {
        let head: String = name.chars().take(NAME_WIDTH - 3).collect();
        format!("{head}...")
    } else {
        format!("{:<width$}", name, width = NAME_WIDTH)
    }
}

/// Resident set size of the current process, in bytes.
pub fn resident_memory_bytes() -> Option<u64> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut system = sysinfo::System::new();
    if !system.refresh_process(pid) {
        return None;
    }
    system.process(pid).map(|p| p.memory())
}

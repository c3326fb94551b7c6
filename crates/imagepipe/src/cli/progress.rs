//! Terminal progress bar for verbose runs.

use imagepipe_core::{ProgressReporter, StageProgress};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

/// One `indicatif` bar per stage.
#[derive(Default)]
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressReporter for BarProgress {
    fn stage_started(&self, stage: &str, total: usize) {
        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] {prefix:>18} [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_prefix(stage.to_string());
        pb.set_message("starting...");
        *self.slot() = Some(pb);
    }

    fn report(&self, progress: &StageProgress<'_>) {
        if let Some(pb) = self.slot().as_ref() {
            pb.set_position(progress.completed as u64);
            pb.set_message(message(progress));
        }
    }

    fn stage_finished(&self, stage: &str) {
        if let Some(pb) = self.slot().take() {
            pb.finish_with_message(format!("{stage} done"));
        }
    }
}

fn message(progress: &StageProgress<'_>) -> String {
    match progress.memory_bytes {
        Some(bytes) => format!(
            "{}  RAM: {:.1}MB",
            progress.current_name,
            bytes as f64 / 1_000_000.0
        ),
        None => progress.current_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_includes_memory() {
        let progress = StageProgress {
            stage: "resize",
            completed: 1,
            total: 2,
            current_name: "a.jpg",
            memory_bytes: Some(52_400_000),
        };
        assert_eq!(message(&progress), "a.jpg  RAM: 52.4MB");
    }

    #[test]
    fn test_report_without_stage_is_ignored() {
        let reporter = BarProgress::new();
        reporter.report(&StageProgress {
            stage: "copy",
            completed: 1,
            total: 1,
            current_name: "a.jpg",
            memory_bytes: None,
        });
        reporter.stage_finished("copy");
    }
}

//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Progress
//!
//! One block per finished job, in completion order:
//!
//! ```text
//! Processing 3 images
//! [001/003]  33% a.png
//!     copy: 2450 KiB
//!     resize: 1500x1000, 812 KiB
//!     convert: a.webp, 640 KiB
//!     compress: 455 KiB
//!     quality 90: 260 KiB
//!     quality 80: 187 KiB
//!     thumbnail: 800x533
//! [002/003]  66% b.jpg
//!     up to date
//! [003/003] 100% broken.png
//!     failed at resize: Failed to decode ...
//! ```
//!
//! ## Summary
//!
//! ```text
//! 1 processed, 1 up to date, 1 failed
//! Missing outputs (1)
//!     broken.webp
//! ```
//!
//! # Architecture
//!
//! Each display has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::imaging::ResizeOutcome;
use crate::process::{JobStatus, ProcessEvent, ProcessResult, StageOutcome};
use crate::reconcile::{CopyOutcome, FailureReport};

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn percent(position: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        position * 100 / total
    }
}

fn format_outcome(outcome: &StageOutcome) -> String {
    match outcome {
        StageOutcome::Copy(CopyOutcome::Copied(kib)) => format!("copy: {kib} KiB"),
        StageOutcome::Copy(CopyOutcome::Present(kib)) => {
            format!("copy: already present, {kib} KiB")
        }
        StageOutcome::Resize(ResizeOutcome::Resized {
            width,
            height,
            size_kib,
        }) => format!("resize: {width}x{height}, {size_kib} KiB"),
        StageOutcome::Resize(ResizeOutcome::Skipped) => "resize: within limit".to_string(),
        StageOutcome::Convert { name, size_kib } => format!("convert: {name}, {size_kib} KiB"),
        StageOutcome::Compress { size_kib } => format!("compress: {size_kib} KiB"),
        StageOutcome::Quality(attempt) => {
            format!("quality {}: {} KiB", attempt.quality, attempt.size_kib)
        }
        StageOutcome::Thumbnail { width, height } => format!("thumbnail: {width}x{height}"),
        StageOutcome::ThumbnailPresent => "thumbnail: already present".to_string(),
    }
}

/// Format a single process progress event as display lines.
pub fn format_process_event(event: &ProcessEvent) -> Vec<String> {
    match event {
        ProcessEvent::RunStarted { total } => vec![format!("Processing {total} images")],
        ProcessEvent::JobFinished {
            position,
            total,
            report,
        } => {
            let mut lines = vec![format!(
                "[{}/{}] {:>3}% {}",
                format_index(*position),
                format_index(*total),
                percent(*position, *total),
                report.id.source_name
            )];
            match &report.status {
                JobStatus::Done(outcomes) => {
                    lines.extend(
                        outcomes
                            .iter()
                            .map(|o| format!("{}{}", indent(1), format_outcome(o))),
                    );
                }
                JobStatus::UpToDate => lines.push(format!("{}up to date", indent(1))),
                JobStatus::Failed { stage, error } => {
                    lines.push(format!("{}failed at {stage}: {error}", indent(1)));
                }
            }
            lines
        }
    }
}

/// Format the missing-output list.
pub fn format_missing(report: &FailureReport) -> Vec<String> {
    if report.is_empty() {
        return vec!["Every source has an output".to_string()];
    }
    let mut lines = vec![format!("Missing outputs ({})", report.missing.len())];
    lines.extend(
        report
            .missing
            .iter()
            .map(|name| format!("{}{}", indent(1), name)),
    );
    lines
}

/// Format the end-of-run summary: counts, failures, then missing outputs.
pub fn format_summary(result: &ProcessResult) -> Vec<String> {
    let mut lines = vec![format!(
        "{} processed, {} up to date, {} failed",
        result.done(),
        result.up_to_date(),
        result.failed()
    )];

    for job in &result.jobs {
        if let JobStatus::Failed { stage, error } = &job.status {
            lines.push(format!(
                "{}{} ({stage}): {error}",
                indent(1),
                job.id.source_name
            ));
        }
    }

    lines.extend(format_missing(&result.report));
    lines
}

/// Print the end-of-run summary to stdout.
pub fn print_summary(result: &ProcessResult) {
    for line in format_summary(result) {
        println!("{}", line);
    }
}

/// Print the missing-output list to stdout.
pub fn print_missing(report: &FailureReport) {
    for line in format_missing(report) {
        println!("{}", line);
    }
}

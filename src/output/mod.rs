//! Output module for run outcomes and reports
//!
//! This module handles:
//! - Delivering finished jobs to storage and counting outcomes
//! - Summarizing a finished run
//! - Rendering the markdown run report

mod markdown;
mod sink;
pub mod stats;
mod traits;

pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use sink::StoreSink;
pub use stats::{OutcomeCounts, OutcomeTally};
pub use traits::{FailedPage, OutcomeSink, OutputError, OutputResult, RunStatus, RunSummary};

/// Logs the completion line and failure sample of a run
pub fn log_summary(summary: &RunSummary) {
    match summary.status {
        RunStatus::Error => tracing::error!("{}", summary.finished_line()),
        RunStatus::PartialSuccess => tracing::warn!("{}", summary.finished_line()),
        _ => tracing::info!("{}", summary.finished_line()),
    }

    for failure in &summary.failed_sample {
        tracing::warn!(
            page = failure.page_index,
            reason = %failure.kind,
            status = ?failure.http_status,
            attempts = failure.attempts,
            "Failed page: {}",
            failure.message
        );
    }
}

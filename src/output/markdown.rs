//! Markdown run report
//!
//! This module renders a human-readable markdown report of a finished run,
//! including outcome counts, retry activity and a sample of failed pages.

use crate::output::traits::{OutputResult, RunSummary};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Writes the markdown report of a run
///
/// # Arguments
///
/// * `summary` - The run summary
/// * `output_path` - Path where the markdown file should be written; parent
///   directories are created
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_summary(summary: &RunSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run summary as markdown
pub fn format_markdown_summary(summary: &RunSummary) -> String {
    let mut md = String::new();

    md.push_str("# Sumi-Harvest Run Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Target**: {}\n", summary.target));
    md.push_str(&format!("- **Base URL**: {}\n", summary.base_url));
    md.push_str(&format!("- **Output**: {}\n", summary.output_location));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    md.push_str(&format!("- **Finished**: {}\n", summary.finished_at));
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        summary.duration_seconds,
        summary.duration_seconds as f64 / 60.0
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    // Planning
    md.push_str("## Page Count\n\n");
    match summary.discovered_pages {
        Some(pages) => md.push_str(&format!("- **Discovered**: {}\n", pages)),
        None => md.push_str("- **Discovered**: unknown\n"),
    }
    md.push_str(&format!("- **Planned**: {}\n", summary.planned_pages));
    md.push_str(&format!("- **Jobs Queued**: {}\n\n", summary.jobs_queued));

    // Outcomes
    md.push_str("## Outcomes\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Succeeded | {} |\n", summary.succeeded));
    md.push_str(&format!("| Empty | {} |\n", summary.empty));
    md.push_str(&format!("| Failed | {} |\n", summary.failed));
    md.push_str(&format!("| Files Saved | {} |\n", summary.files_saved));
    md.push_str(&format!("| Items Saved | {} |\n", summary.items_saved));
    md.push_str(&format!("| Storage Errors | {} |\n\n", summary.storage_errors));
    md.push_str(&format!(
        "- **Profile Saved**: {}\n",
        if summary.profile_saved { "yes" } else { "no" }
    ));
    md.push_str(&format!("- **Failure Rate**: {:.2}%\n\n", summary.failure_rate()));

    // Retry activity
    md.push_str("## Retry Activity\n\n");
    md.push_str(&format!("- **Network Attempts**: {}\n", summary.total_attempts));
    md.push_str(&format!("- **Block-Tier Retries**: {}\n", summary.ledger_entries));
    md.push_str(&format!("- **Global Pauses**: {}\n\n", summary.global_pauses));

    // Failures
    if !summary.failed_sample.is_empty() {
        md.push_str("## Failed Pages (sample)\n\n");
        md.push_str("| Page | Reason | Status | Attempts | Message |\n");
        md.push_str("|------|--------|--------|----------|---------|\n");

        for failure in &summary.failed_sample {
            let status = failure
                .http_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                failure.page_index,
                failure.kind,
                status,
                failure.attempts,
                failure.message.replace('|', "\\|")
            ));
        }
        md.push('\n');
    }

    md
}

//! Progress bars and end-of-run summary tables.

use imgrake_core::pipeline::SweepReport;
use imgrake_core::RunStatistics;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    )
    .map(|style| style.progress_chars("##-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

/// Summary table for a crawl run.
pub fn run_summary(stats: &RunStatistics) -> String {
    let mut lines = vec![
        String::new(),
        "  ====================================".to_string(),
        "               Summary".to_string(),
        "  ====================================".to_string(),
        format!("    Keywords done:    {:>8}", stats.keywords_processed),
    ];
    if stats.keywords_failed > 0 {
        lines.push(format!("    Keywords failed:  {:>8}", stats.keywords_failed));
    }
    if stats.keywords_skipped > 0 {
        lines.push(format!("    Keywords skipped: {:>8}", stats.keywords_skipped));
    }
    lines.push("  ------------------------------------".to_string());
    lines.push(format!("    Fetched:          {:>8}", stats.artifacts_fetched));
    lines.push(format!("    Kept:             {:>8}", stats.artifacts_kept));
    lines.push(format!("    Rewritten:        {:>8}", stats.artifacts_rewritten));
    lines.push(format!("    Quarantined:      {:>8}", stats.artifacts_quarantined));
    lines.push(format!(
        "    Duration:         {:>7.1}s",
        stats.elapsed.as_secs_f64()
    ));
    if let Some(fatal) = &stats.fatal_error {
        lines.push(format!("    Aborted:          {fatal}"));
    }
    lines.push("  ====================================".to_string());
    lines.join("\n")
}

/// Summary table for a normalize or prune sweep.
pub fn sweep_summary(report: &SweepReport, elapsed: Duration) -> String {
    let rate = if elapsed.as_secs_f64() > 0.0 {
        report.summary.total() as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };

    let mut lines = vec![
        String::new(),
        "  ====================================".to_string(),
        "               Summary".to_string(),
        "  ====================================".to_string(),
        format!("    Directories:  {:>8}", report.directories),
    ];
    if report.skipped > 0 {
        lines.push(format!("    Skipped:      {:>8}", report.skipped));
    }
    if report.failed > 0 {
        lines.push(format!("    Unreadable:   {:>8}", report.failed));
    }
    lines.push("  ------------------------------------".to_string());
    lines.push(format!("    Kept:         {:>8}", report.summary.kept));
    if report.summary.rewritten > 0 {
        lines.push(format!("    Rewritten:    {:>8}", report.summary.rewritten));
    }
    lines.push(format!("    Quarantined:  {:>8}", report.summary.quarantined));
    lines.push(format!("    Duration:     {:>7.1}s", elapsed.as_secs_f64()));
    lines.push(format!("    Rate:         {:>7.1} img/sec", rate));
    lines.push("  ====================================".to_string());
    lines.join("\n")
}

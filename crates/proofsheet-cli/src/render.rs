//! Plain-text rendering of queue snapshots and batch reports.

use proofsheet_core::models::{UploadItem, UploadStatus};
use proofsheet_upload::{BatchReport, ItemOutcome};

/// Truncate a string to `max_len` characters, appending "..." if truncated.
pub fn truncate_name(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn letter_tag(letter: Option<&str>) -> String {
    format!("[{}]", letter.unwrap_or("-"))
}

/// One queue line, e.g. `[B] hero.png uploading 40%`.
pub fn describe_item(item: &UploadItem) -> String {
    let mut line = format!(
        "{} {} {}",
        letter_tag(item.letter.as_deref()),
        truncate_name(&item.file_name, 40),
        item.status
    );
    match item.status {
        UploadStatus::Uploading => line.push_str(&format!(" {}%", item.progress_percent)),
        UploadStatus::Error => {
            if let Some(message) = &item.error_message {
                line.push_str(&format!(": {}", message));
            }
        }
        _ => {}
    }
    line
}

/// Coarse progress key; a line is printed only when it changes.
pub fn progress_key(item: &UploadItem) -> (UploadStatus, u8) {
    (item.status, item.progress_percent / 25)
}

fn describe_outcome(outcome: &ItemOutcome) -> String {
    let mut line = format!(
        "{} {} {}",
        letter_tag(outcome.letter.as_deref()),
        outcome.file_name,
        outcome.status
    );
    if let Some(path) = &outcome.storage_path {
        line.push_str(&format!(" -> {}", path));
    }
    if let Some(error) = &outcome.error {
        line.push_str(&format!(": {}", error));
    }
    line
}

pub fn report_lines(report: &BatchReport) -> Vec<String> {
    let mut lines = vec![format!(
        "version {}: {}/{} uploaded",
        report.version_id,
        report.succeeded(),
        report.items.len()
    )];
    lines.extend(report.items.iter().map(describe_outcome));
    lines.extend(report.warnings.iter().map(|w| format!("warning: {}", w)));
    lines
}

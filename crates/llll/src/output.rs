//! Plain-text rendering of command results
//!
//! Everything here returns a `String` so it can be tested without a
//! terminal; colouring happens at print time in `commands`.

use std::path::{Path, PathBuf};

use llll_common::{DiscoveryError, LogEntry, RunResult, UpdateCheck};

/// Summary of one program run, followed by its output
pub fn format_run_result(program: &Path, result: &RunResult) -> String {
    let mut parts = vec![format!("Program: {}", program.display())];

    if result.timed_out {
        parts.push(format!("TIMED OUT after {:.1}s", result.duration_secs));
    } else {
        parts.push(format!("Exit code: {}", result.exit_code));
        parts.push(format!("Duration: {:.1}s", result.duration_secs));
    }

    match &result.log_file {
        Some(log) => parts.push(format!("Log: {}", log.display())),
        None => parts.push("Log: not written".to_string()),
    }
    if let Some(error) = &result.error {
        parts.push(format!("Warning: {}", error));
    }

    parts.push(String::new());
    parts.push("--- Output ---".to_string());
    parts.push(result.output.trim_end().to_string());

    parts.join("\n")
}

pub fn format_log_list(entries: &[LogEntry]) -> String {
    if entries.is_empty() {
        return "No logs yet.".to_string();
    }
    entries
        .iter()
        .map(|e| format!("{}  ({} bytes)", e.file, e.size))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_programs(programs: &[PathBuf], dir: &Path) -> String {
    if programs.is_empty() {
        return format!("No .py files found in {}", dir.display());
    }
    programs
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_update_check(check: &UpdateCheck) -> String {
    if let Some(error) = &check.error {
        return format!("Current: {}\nUpdate check failed: {}", check.current, error);
    }

    let latest = check.latest.as_deref().unwrap_or("unknown");
    let mut lines = vec![
        format!("Current: {}", check.current),
        format!("Latest: {}", latest),
    ];

    if check.available {
        lines.push("Update available".to_string());
        match &check.download_url {
            Some(url) => lines.push(format!("Download: {}", url)),
            None => lines.push("Download: no firmware asset for this hub".to_string()),
        }
    } else {
        lines.push("Up to date".to_string());
    }
    if let Some(url) = &check.release_url {
        lines.push(format!("Release: {}", url));
    }

    lines.join("\n")
}

/// Failure message for a discovery run, with raw output when there is some
pub fn format_discovery_failure(err: &DiscoveryError) -> String {
    let mut msg = format!("Detection failed: {}", err);
    if let Some(output) = err.raw_output().filter(|o| !o.trim().is_empty()) {
        msg.push_str("\n\nRaw output:\n");
        msg.push_str(output.trim_end());
    }
    msg
}

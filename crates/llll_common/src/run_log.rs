//! Run logs
//!
//! One plain-text record per launched program, stored at
//! `logs/{program}_{YYYYMMDD_HHMMSS}.log`, plus the `logs/latest.log` alias
//! that is repointed (never rewritten in place) after each record lands.
//!
//! Format:
//! ```text
//! === llll run log ===
//! program: drive.py
//! timestamp: 2026-02-11T15:27:07.123456+00:00
//! hub: Pybricks Hub
//! === output ===
//! ...
//! === end ===
//! exit_code: 0
//! duration: 4.2s
//! timed_out: false
//! finished: 2026-02-11T15:27:11.323456+00:00
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::fs_atomic;
use crate::project::{ProjectContext, LATEST_LOG_NAME};

/// Everything known about a run once the process is gone
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Program path as requested, relative to the project root
    pub program: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hub_name: Option<String>,
    pub output: String,
    pub exit_code: i32,
    pub duration_secs: f64,
    pub timed_out: bool,
}

impl LogRecord {
    /// Log file name: `{program stem}_{UTC start, one-second resolution}.log`
    pub fn file_name(&self) -> String {
        let stem = Path::new(&self.program)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "program".to_string());
        format!("{}_{}.log", stem, self.started_at.format("%Y%m%d_%H%M%S"))
    }

    /// Render the record in its stable on-disk layout
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.output.len() + 256);
        out.push_str("=== llll run log ===\n");
        out.push_str(&format!("program: {}\n", self.program));
        out.push_str(&format!("timestamp: {}\n", iso8601(&self.started_at)));
        if let Some(hub) = &self.hub_name {
            out.push_str(&format!("hub: {}\n", hub));
        }
        out.push_str("=== output ===\n");
        out.push_str(&self.output);
        if !self.output.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("=== end ===\n");
        out.push_str(&format!("exit_code: {}\n", self.exit_code));
        out.push_str(&format!("duration: {:.1}s\n", self.duration_secs));
        out.push_str(&format!("timed_out: {}\n", self.timed_out));
        out.push_str(&format!("finished: {}\n", iso8601(&self.finished_at)));
        out
    }

    /// Write the record into the project's log directory and repoint
    /// `latest.log` at it. Returns the absolute path of the new log.
    pub fn write(&self, project: &ProjectContext) -> io::Result<PathBuf> {
        let logs_dir = project.logs_dir();
        fs::create_dir_all(&logs_dir)?;

        let file_name = self.file_name();
        let path = logs_dir.join(&file_name);
        fs_atomic::atomic_write_str(&path, &self.render())?;
        point_latest(project, &file_name)?;

        debug!("Run log written: {}", path.display());
        Ok(path)
    }
}

fn iso8601(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

// =============================================================================
// LATEST ALIAS
// =============================================================================

#[cfg(unix)]
fn point_latest(project: &ProjectContext, file_name: &str) -> io::Result<()> {
    fs_atomic::replace_symlink(Path::new(file_name), &project.latest_log_path())
}

/// Without symlinks the alias is a one-line pointer naming the target log.
#[cfg(not(unix))]
fn point_latest(project: &ProjectContext, file_name: &str) -> io::Result<()> {
    fs_atomic::atomic_write_str(&project.latest_log_path(), &format!("{}\n", file_name))
}

#[cfg(unix)]
fn read_latest_target(alias: &Path) -> Option<PathBuf> {
    fs::read_link(alias).ok()
}

#[cfg(not(unix))]
fn read_latest_target(alias: &Path) -> Option<PathBuf> {
    let name = fs::read_to_string(alias).ok()?;
    Some(PathBuf::from(name.trim()))
}

/// Path of the log `latest.log` currently refers to, if any
pub fn resolve_latest(project: &ProjectContext) -> Option<PathBuf> {
    let target = read_latest_target(&project.latest_log_path())?;
    let resolved = project.logs_dir().join(target);
    resolved.is_file().then_some(resolved)
}

// =============================================================================
// LOG BROWSING
// =============================================================================

/// Errors from reading run logs
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("No logs yet. Run a program first.")]
    NoLogs,

    #[error("Log not found: {0}")]
    NotFound(String),

    #[error("Failed to read log: {0}")]
    Io(#[from] io::Error),
}

/// A log file as listed by `list_logs`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct LogEntry {
    pub file: String,
    pub size: u64,
}

/// All run logs, most recent first. `latest.log` itself is not listed.
pub fn list_logs(project: &ProjectContext) -> io::Result<Vec<LogEntry>> {
    let logs_dir = project.logs_dir();
    if !logs_dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(&logs_dir)?.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == LATEST_LOG_NAME || !name.ends_with(".log") {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        entries.push(LogEntry {
            file: name,
            size: metadata.len(),
        });
    }

    entries.sort_by(|a, b| b.file.cmp(&a.file));
    Ok(entries)
}

/// Read a log by file name, or the latest log when no name is given
pub fn read_log(project: &ProjectContext, name: Option<&str>) -> Result<String, LogError> {
    let path = match name {
        Some(name) => {
            if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
                return Err(LogError::NotFound(name.to_string()));
            }
            let path = project.logs_dir().join(name);
            if !path.is_file() {
                return Err(LogError::NotFound(name.to_string()));
            }
            path
        }
        None => resolve_latest(project).ok_or(LogError::NoLogs)?,
    };

    Ok(fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(program: &str, second: u32) -> LogRecord {
        let started_at = Utc.with_ymd_and_hms(2026, 2, 11, 15, 27, second).unwrap();
        LogRecord {
            program: program.to_string(),
            started_at,
            finished_at: started_at + chrono::Duration::milliseconds(4200),
            hub_name: Some("Pybricks Hub".to_string()),
            output: "hello".to_string(),
            exit_code: 0,
            duration_secs: 4.2,
            timed_out: false,
        }
    }

    #[test]
    fn test_file_name_uses_stem_and_utc_second() {
        let rec = record("drive/forward.py", 7);
        assert_eq!(rec.file_name(), "forward_20260211_152707.log");
    }

    #[test]
    fn test_render_layout() {
        let rendered = record("forward.py", 7).render();
        let expected = "=== llll run log ===\n\
                        program: forward.py\n\
                        timestamp: 2026-02-11T15:27:07.000000+00:00\n\
                        hub: Pybricks Hub\n\
                        === output ===\n\
                        hello\n\
                        === end ===\n\
                        exit_code: 0\n\
                        duration: 4.2s\n\
                        timed_out: false\n\
                        finished: 2026-02-11T15:27:11.200000+00:00\n";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_render_omits_hub_and_keeps_trailing_newline() {
        let mut rec = record("forward.py", 7);
        rec.hub_name = None;
        rec.output = "line\n".to_string();
        rec.timed_out = true;
        rec.exit_code = -1;

        let rendered = rec.render();
        assert!(!rendered.contains("hub:"));
        assert!(rendered.contains("=== output ===\nline\n=== end ===\n"));
        assert!(rendered.contains("exit_code: -1\n"));
        assert!(rendered.contains("timed_out: true\n"));
    }

    #[test]
    fn test_write_repoints_latest() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());

        let first = record("forward.py", 7).write(&project).unwrap();
        assert_eq!(resolve_latest(&project), Some(first.clone()));

        let mut second = record("turn.py", 9);
        second.output = "second run".to_string();
        let second_path = second.write(&project).unwrap();

        assert_eq!(resolve_latest(&project), Some(second_path));
        assert!(first.exists());
        assert!(read_log(&project, None).unwrap().contains("second run"));
    }

    #[cfg(unix)]
    #[test]
    fn test_latest_is_an_alias_not_a_copy() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());
        record("forward.py", 7).write(&project).unwrap();

        let meta = fs::symlink_metadata(project.latest_log_path()).unwrap();
        assert!(meta.file_type().is_symlink());
    }

    #[test]
    fn test_list_logs_newest_first_without_latest() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());
        record("a.py", 1).write(&project).unwrap();
        record("a.py", 5).write(&project).unwrap();

        let logs = list_logs(&project).unwrap();
        let names: Vec<&str> = logs.iter().map(|l| l.file.as_str()).collect();
        assert_eq!(names, vec!["a_20260211_152705.log", "a_20260211_152701.log"]);
        assert!(logs.iter().all(|l| l.size > 0));
    }

    #[test]
    fn test_list_logs_without_directory() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());
        assert!(list_logs(&project).unwrap().is_empty());
    }

    #[test]
    fn test_read_log_errors() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());

        assert!(matches!(read_log(&project, None), Err(LogError::NoLogs)));
        assert!(matches!(
            read_log(&project, Some("missing.log")),
            Err(LogError::NotFound(_))
        ));
        assert!(matches!(
            read_log(&project, Some("../llll.toml")),
            Err(LogError::NotFound(_))
        ));
    }

    #[test]
    fn test_read_log_by_name() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());
        let rec = record("forward.py", 7);
        rec.write(&project).unwrap();

        let content = read_log(&project, Some(&rec.file_name())).unwrap();
        assert!(content.starts_with("=== llll run log ===\n"));
    }
}

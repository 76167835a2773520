//! Program runner - uploads and runs a MicroPython program through pybricksdev
//!
//! One call spawns exactly one uploader process, races it against the
//! request timeout, captures stdout and stderr as a single interleaved
//! stream, and records the run in `logs/`. A process that outlives its
//! timeout is killed and reaped before `run` returns.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::project::ProjectContext;
use crate::run_log::LogRecord;

/// Uploader used when nothing else is configured
pub const DEFAULT_UPLOADER: &str = "pybricksdev";

/// Environment variable overriding the uploader executable
pub const UPLOADER_ENV: &str = "LLLL_UPLOADER";

/// Default program timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Exit code reported when the process was killed rather than exiting
pub const KILLED_EXIT_CODE: i32 = -1;

/// How long to wait for buffered output after killing a timed-out process
const DRAIN_GRACE: Duration = Duration::from_secs(2);

const READ_CHUNK: usize = 4096;

// =============================================================================
// REQUEST / RESULT
// =============================================================================

/// A program to run on the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    program: PathBuf,
    hub_name: Option<String>,
    timeout_secs: u64,
}

impl RunRequest {
    /// Run `program` (relative to the project root) with the default timeout
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            hub_name: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Target a specific hub by its Bluetooth name
    pub fn with_hub_name(mut self, hub_name: Option<String>) -> Self {
        self.hub_name = hub_name.filter(|n| !n.is_empty());
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn hub_name(&self) -> Option<&str> {
        self.hub_name.as_deref()
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }
}

/// Outcome of a run whose process was actually launched
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// `exit_code == 0 && !timed_out`
    pub success: bool,
    /// Process exit code, or `KILLED_EXIT_CODE` on timeout / signal death
    pub exit_code: i32,
    pub timed_out: bool,
    pub duration_secs: f64,
    /// stdout and stderr, interleaved in arrival order
    pub output: String,
    /// Log file relative to the project root
    pub log_file: Option<PathBuf>,
    /// Set when the run itself completed but its log could not be written
    pub error: Option<String>,
}

/// Why a run never got as far as a running process
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("File not found: {}", .0.display())]
    ProgramNotFound(PathBuf),

    #[error("Invalid program path (must be relative to the project root): {}", .0.display())]
    InvalidProgramPath(PathBuf),

    #[error("Timeout must be a positive number of seconds")]
    InvalidTimeout,

    #[error("{0} not found. Install it with: pip install pybricksdev")]
    ToolNotFound(String),

    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to prepare log directory: {0}")]
    LogDir(#[source] io::Error),

    #[error("Failed while waiting for {tool}: {source}")]
    Wait {
        tool: String,
        #[source]
        source: io::Error,
    },
}

// =============================================================================
// UPLOADER
// =============================================================================

/// Command line template for the external uploader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploader {
    program: OsString,
    base_args: Vec<OsString>,
}

impl Default for Uploader {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOADER)
    }
}

impl Uploader {
    /// Uploader invoked as `<program> run ble ...`
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            base_args: vec!["run".into(), "ble".into()],
        }
    }

    /// Resolve the uploader: `LLLL_UPLOADER`, then the configured value,
    /// then `pybricksdev`
    pub fn resolve(configured: Option<&str>) -> Self {
        if let Ok(from_env) = std::env::var(UPLOADER_ENV) {
            if !from_env.trim().is_empty() {
                return Self::new(from_env);
            }
        }
        match configured {
            Some(program) if !program.trim().is_empty() => Self::new(program),
            _ => Self::default(),
        }
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    fn display_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Arguments for one run: `run ble [--name <hub>] <program>`
    pub fn command_args(&self, hub_name: Option<&str>, program: &Path) -> Vec<OsString> {
        let mut args = self.base_args.clone();
        if let Some(hub) = hub_name {
            args.push("--name".into());
            args.push(hub.into());
        }
        args.push(program.as_os_str().to_owned());
        args
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Runs programs for one project through one uploader
#[derive(Debug, Clone)]
pub struct ProgramRunner {
    project: ProjectContext,
    uploader: Uploader,
}

impl ProgramRunner {
    pub fn new(project: ProjectContext, uploader: Uploader) -> Self {
        Self { project, uploader }
    }

    pub fn project(&self) -> &ProjectContext {
        &self.project
    }

    pub fn uploader(&self) -> &Uploader {
        &self.uploader
    }

    /// Upload and run a program, wait for it (or its timeout) and log the run
    pub async fn run(&self, request: &RunRequest) -> Result<RunResult, RunError> {
        if request.timeout_secs == 0 {
            return Err(RunError::InvalidTimeout);
        }

        let program_path = self
            .project
            .join_relative(&request.program)
            .ok_or_else(|| RunError::InvalidProgramPath(request.program.clone()))?;
        if !program_path.is_file() {
            return Err(RunError::ProgramNotFound(request.program.clone()));
        }

        std::fs::create_dir_all(self.project.logs_dir()).map_err(RunError::LogDir)?;

        let args = self.uploader.command_args(request.hub_name(), &program_path);
        debug!("Executing: {:?} {:?}", self.uploader.program, args);

        let started_at = Utc::now();
        let start = Instant::now();

        let mut child = Command::new(&self.uploader.program)
            .args(&args)
            .current_dir(self.project.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    RunError::ToolNotFound(self.uploader.display_name())
                } else {
                    RunError::Spawn {
                        tool: self.uploader.display_name(),
                        source: e,
                    }
                }
            })?;

        let collector = collect_combined_output(child.stdout.take(), child.stderr.take());
        let timeout = Duration::from_secs(request.timeout_secs);

        let waited = tokio::select! {
            status = child.wait() => Some(status),
            _ = tokio::time::sleep(timeout) => None,
        };

        let (exit_code, timed_out) = match waited {
            Some(Ok(status)) => (status.code().unwrap_or(KILLED_EXIT_CODE), false),
            Some(Err(e)) => {
                if let Err(kill_err) = child.kill().await {
                    warn!("Failed to kill process after wait error: {}", kill_err);
                }
                return Err(RunError::Wait {
                    tool: self.uploader.display_name(),
                    source: e,
                });
            }
            None => {
                warn!(
                    "{} exceeded {}s timeout, killing process",
                    request.program.display(),
                    request.timeout_secs
                );
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed-out process: {}", e);
                }
                (KILLED_EXIT_CODE, true)
            }
        };

        let raw = if timed_out {
            collector.drain_within(DRAIN_GRACE).await
        } else {
            collector.finish().await
        };
        let output = String::from_utf8_lossy(&raw).into_owned();

        let duration_secs = start.elapsed().as_secs_f64();
        let finished_at = Utc::now();

        info!(
            "{} finished: exit_code={} timed_out={} duration={:.1}s",
            request.program.display(),
            exit_code,
            timed_out,
            duration_secs
        );

        let record = LogRecord {
            program: request.program.to_string_lossy().into_owned(),
            started_at,
            finished_at,
            hub_name: request.hub_name.clone(),
            output: output.clone(),
            exit_code,
            duration_secs,
            timed_out,
        };

        let (log_file, error) = match record.write(&self.project) {
            Ok(path) => (
                Some(self.project.relative_to_root(&path).unwrap_or(path)),
                None,
            ),
            Err(e) => {
                warn!("Failed to write run log: {}", e);
                (None, Some(format!("Failed to write run log: {}", e)))
            }
        };

        Ok(RunResult {
            success: exit_code == 0 && !timed_out,
            exit_code,
            timed_out,
            duration_secs,
            output,
            log_file,
            error,
        })
    }
}

/// Reader tasks for the child's pipes plus the task merging their chunks
struct OutputCollector {
    forwarders: Vec<JoinHandle<()>>,
    merged: JoinHandle<Vec<u8>>,
}

impl OutputCollector {
    /// Wait for both pipes to reach EOF
    async fn finish(self) -> Vec<u8> {
        self.merged.await.unwrap_or_default()
    }

    /// Wait up to `grace` for EOF. A pipe still held open by a surviving
    /// grandchild has its reader aborted, keeping everything read so far.
    async fn drain_within(mut self, grace: Duration) -> Vec<u8> {
        if let Ok(joined) = tokio::time::timeout(grace, &mut self.merged).await {
            return joined.unwrap_or_default();
        }
        warn!("Output pipes still open after kill; keeping output read so far");
        for forwarder in &self.forwarders {
            forwarder.abort();
        }
        // Aborted readers drop their senders, which closes the channel
        self.merged.await.unwrap_or_default()
    }
}

/// Merge two pipes into one buffer, preserving the order chunks arrive in.
fn collect_combined_output<O, E>(stdout: Option<O>, stderr: Option<E>) -> OutputCollector
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let mut forwarders = Vec::with_capacity(2);
    if let Some(stdout) = stdout {
        forwarders.push(tokio::spawn(forward_chunks(stdout, tx.clone())));
    }
    if let Some(stderr) = stderr {
        forwarders.push(tokio::spawn(forward_chunks(stderr, tx.clone())));
    }
    drop(tx);

    let merged = tokio::spawn(async move {
        let mut combined = Vec::new();
        while let Some(chunk) = rx.recv().await {
            combined.extend_from_slice(&chunk);
        }
        combined
    });

    OutputCollector { forwarders, merged }
}

async fn forward_chunks<R>(mut reader: R, tx: mpsc::UnboundedSender<Vec<u8>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(e) => {
                debug!("Output pipe read failed: {}", e);
                break;
            }
        }
    }
}

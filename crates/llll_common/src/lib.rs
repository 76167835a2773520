//! llll Common - hub execution, discovery and firmware plumbing for llll
//!
//! Everything that touches the uploader process, the run logs, the
//! `LLLL_DETECT:` protocol and the Pybricks release registry lives here.
//! The `llll` binary is a thin shell over these modules.

pub mod config;
pub mod discovery;
pub mod firmware;
pub mod fs_atomic;
pub mod github_releases;
pub mod programs;
pub mod project;
pub mod run_log;
pub mod runner;
pub mod workspace;

pub use config::{ConfigError, HubConfig, LlllConfig, PortConfig, Settings};
pub use discovery::{
    discover, DecodeError, DiscoveryError, HubSnapshot, HubType, PortDevice, ProbePayload,
};
pub use firmware::{
    compare_versions, evaluate_update, firmware_filename, is_update_available, FirmwareVersion,
    UpdateCheck,
};
pub use github_releases::{FirmwareError, ReleaseAsset, ReleaseClient, ReleaseInfo};
pub use programs::{list_programs, ProgramsError};
pub use project::ProjectContext;
pub use run_log::{list_logs, read_log, LogEntry, LogError, LogRecord};
pub use runner::{ProgramRunner, RunError, RunRequest, RunResult, Uploader};
pub use workspace::{init_workspace, InitOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Project context
//!
//! Every component receives the project root explicitly; nothing reads the
//! process working directory behind the caller's back.

use std::path::{Component, Path, PathBuf};

/// Name of the hub config file at the project root
pub const CONFIG_FILENAME: &str = "llll.toml";

/// Directory (under the project root) holding run logs
pub const LOGS_DIRNAME: &str = "logs";

/// Alias that always resolves to the most recent run log
pub const LATEST_LOG_NAME: &str = "latest.log";

/// Where the discovery probe is staged for the duration of a run
pub const PROBE_FILENAME: &str = "_llll_discover.py";

/// MCP client configuration written by `llll init`
pub const MCP_CONFIG_FILENAME: &str = ".mcp.json";

/// A project directory containing programs, logs and `llll.toml`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    root: PathBuf,
}

impl ProjectContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project rooted at the current working directory
    pub fn from_current_dir() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIRNAME)
    }

    pub fn latest_log_path(&self) -> PathBuf {
        self.logs_dir().join(LATEST_LOG_NAME)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILENAME)
    }

    pub fn mcp_config_path(&self) -> PathBuf {
        self.root.join(MCP_CONFIG_FILENAME)
    }

    pub fn probe_path(&self) -> PathBuf {
        self.root.join(PROBE_FILENAME)
    }

    /// Join a project-relative path onto the root.
    ///
    /// Returns `None` for absolute paths or paths that climb out of the
    /// project with `..`.
    pub fn join_relative(&self, relative: &Path) -> Option<PathBuf> {
        if relative.as_os_str().is_empty() {
            return None;
        }
        let mut joined = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => joined.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(joined)
    }

    /// Express `path` relative to the project root, if it lives under it
    pub fn relative_to_root(&self, path: &Path) -> Option<PathBuf> {
        path.strip_prefix(&self.root).ok().map(Path::to_path_buf)
    }
}

//! Workspace initialization
//!
//! Sets up a project directory so an MCP client can launch `llll` from it.

use std::io;
use std::path::PathBuf;

use serde_json::json;
use tracing::info;

use crate::fs_atomic::atomic_write_str;
use crate::project::ProjectContext;

/// What `init_workspace` did with `.mcp.json`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Created(PathBuf),
    Overwritten(PathBuf),
    /// Already present and not forced
    Skipped(PathBuf),
}

impl InitOutcome {
    pub fn path(&self) -> &PathBuf {
        match self {
            InitOutcome::Created(p) | InitOutcome::Overwritten(p) | InitOutcome::Skipped(p) => p,
        }
    }
}

/// `.mcp.json` contents registering the `llll` server
pub fn mcp_config() -> serde_json::Value {
    json!({
        "mcpServers": {
            "llll": {
                "command": "llll",
                "args": [],
                "env": {}
            }
        }
    })
}

/// Write `.mcp.json` unless it exists and `force` is not set
pub fn init_workspace(project: &ProjectContext, force: bool) -> io::Result<InitOutcome> {
    let path = project.mcp_config_path();
    let existed = path.exists();
    if existed && !force {
        info!("{} already exists, leaving it alone", path.display());
        return Ok(InitOutcome::Skipped(path));
    }

    let mut contents = serde_json::to_string_pretty(&mcp_config())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    contents.push('\n');
    atomic_write_str(&path, &contents)?;

    Ok(if existed {
        InitOutcome::Overwritten(path)
    } else {
        InitOutcome::Created(path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_creates_mcp_json() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());

        let outcome = init_workspace(&project, false).unwrap();
        assert_eq!(outcome, InitOutcome::Created(project.mcp_config_path()));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(project.mcp_config_path()).unwrap()).unwrap();
        assert_eq!(written["mcpServers"]["llll"]["command"], "llll");
        assert_eq!(written, mcp_config());
    }

    #[test]
    fn test_existing_file_skipped_unless_forced() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());
        fs::write(project.mcp_config_path(), "{}").unwrap();

        let outcome = init_workspace(&project, false).unwrap();
        assert!(matches!(outcome, InitOutcome::Skipped(_)));
        assert_eq!(fs::read_to_string(project.mcp_config_path()).unwrap(), "{}");

        let outcome = init_workspace(&project, true).unwrap();
        assert!(matches!(outcome, InitOutcome::Overwritten(_)));
        assert!(fs::read_to_string(project.mcp_config_path())
            .unwrap()
            .contains("mcpServers"));
    }
}

//! Program listing
//!
//! Finds the MicroPython sources a project could run. Hidden paths,
//! virtualenvs and bytecode caches are not programs.

use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::project::ProjectContext;

/// Directory names never searched
const SKIPPED_DIRS: &[&str] = &["venv", "__pycache__"];

#[derive(Debug, thiserror::Error)]
pub enum ProgramsError {
    #[error("Directory not found: {}", .0.display())]
    DirNotFound(PathBuf),
}

fn is_skipped(relative: &Path) -> bool {
    relative.components().any(|component| match component {
        Component::Normal(part) => {
            let part = part.to_string_lossy();
            part.starts_with('.') || SKIPPED_DIRS.contains(&part.as_ref())
        }
        _ => false,
    })
}

/// `.py` files under `dir` (relative to the project root), as sorted
/// project-relative paths
pub fn list_programs(project: &ProjectContext, dir: &Path) -> Result<Vec<PathBuf>, ProgramsError> {
    let search_dir = project
        .join_relative(dir)
        .or_else(|| (dir.as_os_str().is_empty()).then(|| project.root().to_path_buf()))
        .filter(|p| p.is_dir())
        .ok_or_else(|| ProgramsError::DirNotFound(dir.to_path_buf()))?;

    let mut programs = Vec::new();
    for entry in WalkDir::new(&search_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            project
                .relative_to_root(e.path())
                .map_or(true, |rel| !is_skipped(&rel))
        })
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Error walking {}: {}", search_dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "py") {
            continue;
        }
        if let Some(rel) = project.relative_to_root(path) {
            programs.push(rel);
        }
    }

    programs.sort();
    Ok(programs)
}

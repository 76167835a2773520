//! Atomic file operations
//!
//! Writers never leave a partially written file behind: data goes to a temp
//! file in the same directory, is fsynced, then renamed over the target.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Temp path next to `path`, unique per call (pid plus a process-wide counter)
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.tmp", name, std::process::id(), n))
}

/// A file written incrementally under a temp name and renamed into place on
/// `commit`. Dropping it uncommitted removes the temp file.
pub struct AtomicFile {
    path: PathBuf,
    temp_path: PathBuf,
    file: Option<File>,
}

impl AtomicFile {
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let temp_path = temp_path_for(path);
        let file = File::create(&temp_path)?;
        Ok(Self {
            path: path.to_path_buf(),
            temp_path,
            file: Some(file),
        })
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(data),
            None => Err(io::Error::new(io::ErrorKind::Other, "file already committed")),
        }
    }

    /// fsync and rename over the destination
    pub fn commit(mut self) -> io::Result<()> {
        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        fs::rename(&self.temp_path, &self.path)
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        // After a successful commit the temp name no longer exists
        let _ = fs::remove_file(&self.temp_path);
    }
}

/// Write data to a file atomically using temp file + rename
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = AtomicFile::create(path)?;
    file.write_all(data)?;
    file.commit()
}

/// Write string data atomically
pub fn atomic_write_str(path: &Path, data: &str) -> io::Result<()> {
    atomic_write(path, data.as_bytes())
}

/// Point `link` at `target` (a path relative to the link's directory).
///
/// The new symlink is created under a temp name and renamed over `link`, so
/// a reader resolving `link` sees either the old target or the new one.
#[cfg(unix)]
pub fn replace_symlink(target: &Path, link: &Path) -> io::Result<()> {
    let temp_link = temp_path_for(link);
    std::os::unix::fs::symlink(target, &temp_link)?;
    if let Err(e) = fs::rename(&temp_link, link) {
        let _ = fs::remove_file(&temp_link);
        return Err(e);
    }
    Ok(())
}

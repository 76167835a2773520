//! On-hub probe program and its staging
//!
//! The probe is written into the project right before the discovery run and
//! removed when the `StagedProbe` guard drops, whichever way the run ends.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::project::{ProjectContext, PROBE_FILENAME};

/// MicroPython program run on the hub to report its type, name, battery,
/// firmware version and the device on each port as one `LLLL_DETECT:` line.
pub const PROBE_PROGRAM: &str = r#"import ujson
from pybricks.iodevices import PUPDevice
from pybricks.parameters import Port
from uerrno import ENODEV

hub = None
hub_type = "Unknown"

for name in ["InventorHub", "PrimeHub", "TechnicHub", "CityHub", "EssentialHub", "MoveHub"]:
    try:
        mod = __import__("pybricks.hubs", None, None, [name])
        cls = getattr(mod, name)
        hub = cls()
        hub_type = name
        break
    except (ImportError, AttributeError, OSError):
        pass

if hub is None:
    print("LLLL_DETECT:" + ujson.dumps({"error": "Could not detect hub type"}))
    raise SystemExit

hub_name = hub.system.name()
battery_mv = hub.battery.voltage()

# usys.version looks like "3.4.0; Pybricks MicroPython ci-release-86-v3.6.1 on 2025-03-11"
pybricks_version = "unknown"
try:
    import usys
    version_str = usys.version
    if "Pybricks" in version_str and "-v" in version_str:
        after_v = version_str.split("-v")[-1].split()[0]
        clean = ""
        for char in after_v:
            if char.isdigit() or char == ".":
                clean += char
            elif clean:
                break
        if clean.count(".") >= 2:
            pybricks_version = clean
except Exception:
    pybricks_version = "unknown"

ports = []
for letter in ["A", "B", "C", "D", "E", "F"]:
    try:
        port = getattr(Port, letter)
    except AttributeError:
        break
    try:
        dev = PUPDevice(port)
        ports.append({"port": letter, "device_id": dev.info()["id"]})
    except OSError as ex:
        if ex.args[0] == ENODEV:
            ports.append({"port": letter, "device_id": None})
        else:
            ports.append({"port": letter, "device_id": None, "error": str(ex)})

print("LLLL_DETECT:" + ujson.dumps({
    "hub_type": hub_type,
    "hub_name": hub_name,
    "battery_voltage": battery_mv,
    "pybricks_version": pybricks_version,
    "ports": ports,
}))
"#;

/// The probe file on disk; removed on drop
#[derive(Debug)]
pub struct StagedProbe {
    path: PathBuf,
}

impl StagedProbe {
    /// Write the probe program to its fixed spot in the project
    pub fn stage(project: &ProjectContext) -> io::Result<Self> {
        let path = project.probe_path();
        fs::write(&path, PROBE_PROGRAM)?;
        debug!("Staged probe program at {}", path.display());
        Ok(Self { path })
    }

    /// Path of the staged file relative to the project root
    pub fn relative_path(&self) -> &Path {
        Path::new(PROBE_FILENAME)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedProbe {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed probe program {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove probe program {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_probe_prints_marker() {
        assert!(PROBE_PROGRAM.contains("print(\"LLLL_DETECT:\" + ujson.dumps("));
        for hub in ["InventorHub", "PrimeHub", "TechnicHub", "CityHub", "EssentialHub", "MoveHub"] {
            assert!(PROBE_PROGRAM.contains(hub));
        }
    }

    #[test]
    fn test_staged_probe_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());

        let staged = StagedProbe::stage(&project).unwrap();
        let path = staged.path().to_path_buf();
        assert_eq!(fs::read_to_string(&path).unwrap(), PROBE_PROGRAM);
        assert_eq!(staged.relative_path(), Path::new("_llll_discover.py"));

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_tolerates_already_removed_file() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());

        let staged = StagedProbe::stage(&project).unwrap();
        fs::remove_file(staged.path()).unwrap();
        drop(staged);
    }
}

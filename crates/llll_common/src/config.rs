//! Project hardware configuration (`llll.toml`)
//!
//! Written by discovery, read by everything that needs a default hub name
//! or timeout. Example:
//!
//! ```toml
//! [settings]
//! timeout = 60
//!
//! [[hubs]]
//! type = "TechnicHub"
//! name = "Hub1"
//! battery_voltage = 8100
//!
//! [hubs.ports]
//! A = { device = "Technic Large Motor", class = "Motor", id = 46 }
//! ```

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::discovery::{catalog, HubSnapshot, HubType};
use crate::fs_atomic::atomic_write_str;
use crate::project::ProjectContext;
use crate::runner::DEFAULT_TIMEOUT_SECS;

/// Class recorded for a device we have no pybricks class for
pub const FALLBACK_DEVICE_CLASS: &str = "PUPDevice";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Run settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Default program timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Uploader executable, when not `pybricksdev` on PATH
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT_SECS,
            uploader: None,
        }
    }
}

/// Device plugged into one port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub device: String,
    pub class: String,
    pub id: u32,
}

/// One hub as last discovered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(rename = "type")]
    pub hub_type: HubType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Millivolts at discovery time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,

    /// Port letter to device; empty ports are not stored
    #[serde(default)]
    pub ports: BTreeMap<String, PortConfig>,
}

impl HubConfig {
    /// Config entry for a discovered hub
    pub fn from_snapshot(snapshot: &HubSnapshot) -> Self {
        let ports = snapshot
            .occupied_ports()
            .filter_map(|port| {
                let id = port.device_id?;
                let entry = PortConfig {
                    device: port
                        .device_name
                        .clone()
                        .unwrap_or_else(|| catalog::unknown_device_label(id)),
                    class: port
                        .device_class
                        .clone()
                        .unwrap_or_else(|| FALLBACK_DEVICE_CLASS.to_string()),
                    id,
                };
                Some((port.port.to_string(), entry))
            })
            .collect();

        Self {
            hub_type: snapshot.hub_type,
            name: Some(snapshot.hub_name.clone()).filter(|n| !n.is_empty()),
            battery_voltage: Some(snapshot.battery_voltage).filter(|v| *v > 0),
            firmware_version: snapshot
                .pybricks_version
                .clone()
                .filter(|v| !v.is_empty() && v != "unknown"),
            ports,
        }
    }
}

/// Contents of `llll.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlllConfig {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub hubs: Vec<HubConfig>,
}

impl LlllConfig {
    /// Load `llll.toml`; `Ok(None)` when the project has none yet
    pub fn load(project: &ProjectContext) -> Result<Option<Self>, ConfigError> {
        Self::load_from(&project.config_path())
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&contents)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Write `llll.toml`, returning its path
    pub fn save(&self, project: &ProjectContext) -> Result<PathBuf, ConfigError> {
        let path = project.config_path();
        let toml_string = toml::to_string_pretty(self)?;
        atomic_write_str(&path, &toml_string).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;
        info!("Saved {}", path.display());
        Ok(path)
    }

    /// Config describing a fresh discovery.
    ///
    /// Hubs are replaced wholesale; settings carry over from `previous`.
    pub fn from_snapshot(snapshot: &HubSnapshot, previous: Option<Settings>) -> Self {
        Self {
            settings: previous.unwrap_or_default(),
            hubs: vec![HubConfig::from_snapshot(snapshot)],
        }
    }

    /// Name of the first configured hub
    pub fn default_hub_name(&self) -> Option<&str> {
        self.hubs
            .first()
            .and_then(|h| h.name.as_deref())
            .filter(|n| !n.is_empty())
    }

    /// Type of the first configured hub
    pub fn default_hub_type(&self) -> Option<HubType> {
        self.hubs.first().map(|h| h.hub_type)
    }

    /// Human-readable summary of the configured hardware
    pub fn format_hub_info(&self) -> String {
        let mut out = String::new();

        for (i, hub) in self.hubs.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "Hub: {}", hub.hub_type);
            if let Some(name) = &hub.name {
                let _ = writeln!(out, "Name: {}", name);
            }
            if let Some(mv) = hub.battery_voltage {
                let _ = writeln!(out, "Battery: {} mV", mv);
            }
            if let Some(version) = &hub.firmware_version {
                let _ = writeln!(out, "Firmware: {}", version);
            }

            if hub.ports.is_empty() {
                out.push_str("Ports: none detected\n");
            } else {
                out.push_str("Ports:\n");
                for (letter, port) in &hub.ports {
                    let _ = writeln!(out, "  {}: {} ({})", letter, port.device, port.class);
                }
            }
        }

        out.push_str("\nSettings:\n");
        let _ = writeln!(out, "  timeout: {}", self.settings.timeout);
        if let Some(uploader) = &self.settings.uploader {
            let _ = writeln!(out, "  uploader: {}", uploader);
        }

        out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::PortDevice;
    use tempfile::TempDir;

    fn snapshot() -> HubSnapshot {
        let mut snapshot = HubSnapshot {
            hub_type: HubType::TechnicHub,
            hub_name: "Hub1".to_string(),
            battery_voltage: 8100,
            pybricks_version: Some("3.6.1".to_string()),
            ports: vec![
                PortDevice::with_device('A', 46),
                PortDevice::empty('B'),
                PortDevice::with_device('D', 9999),
            ],
        };
        snapshot.enrich();
        snapshot
    }

    #[test]
    fn test_from_snapshot_stores_occupied_ports_only() {
        let config = LlllConfig::from_snapshot(&snapshot(), None);

        assert_eq!(config.settings, Settings::default());
        assert_eq!(config.hubs.len(), 1);

        let hub = &config.hubs[0];
        assert_eq!(hub.hub_type, HubType::TechnicHub);
        assert_eq!(hub.name.as_deref(), Some("Hub1"));
        assert_eq!(hub.battery_voltage, Some(8100));
        assert_eq!(hub.firmware_version.as_deref(), Some("3.6.1"));
        assert_eq!(hub.ports.len(), 2);
        assert_eq!(
            hub.ports["A"],
            PortConfig {
                device: "Technic Large Motor".to_string(),
                class: "Motor".to_string(),
                id: 46,
            }
        );
        assert_eq!(hub.ports["D"].device, "Unknown (ID 9999)");
        assert_eq!(hub.ports["D"].class, "PUPDevice");
    }

    #[test]
    fn test_from_snapshot_keeps_previous_settings() {
        let previous = Settings {
            timeout: 120,
            uploader: Some("/opt/pybricksdev".to_string()),
        };
        let config = LlllConfig::from_snapshot(&snapshot(), Some(previous.clone()));
        assert_eq!(config.settings, previous);
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());
        assert!(LlllConfig::load(&project).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());
        let config = LlllConfig::from_snapshot(&snapshot(), None);

        let path = config.save(&project).unwrap();
        assert_eq!(path, project.config_path());

        let loaded = LlllConfig::load(&project).unwrap().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.default_hub_name(), Some("Hub1"));
        assert_eq!(loaded.default_hub_type(), Some(HubType::TechnicHub));
    }

    #[test]
    fn test_load_inline_port_tables() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());
        fs::write(
            project.config_path(),
            r#"
[settings]
timeout = 30

[[hubs]]
type = "PrimeHub"
name = "Spike"

[hubs.ports]
A = { device = "SPIKE Medium Angular Motor", class = "Motor", id = 48 }
"#,
        )
        .unwrap();

        let config = LlllConfig::load(&project).unwrap().unwrap();
        assert_eq!(config.settings.timeout, 30);
        assert_eq!(config.hubs[0].hub_type, HubType::PrimeHub);
        assert_eq!(config.hubs[0].ports["A"].id, 48);
    }

    #[test]
    fn test_missing_settings_use_defaults() {
        let config: LlllConfig = toml::from_str("[[hubs]]\ntype = \"CityHub\"\n").unwrap();
        assert_eq!(config.settings.timeout, 60);
        assert_eq!(config.default_hub_name(), None);
    }

    #[test]
    fn test_unknown_hub_type_in_file() {
        let config: LlllConfig = toml::from_str("[[hubs]]\ntype = \"MegaHub\"\n").unwrap();
        assert_eq!(config.hubs[0].hub_type, HubType::Unknown);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let project = ProjectContext::new(dir.path());
        fs::write(project.config_path(), "[[hubs]\n").unwrap();

        assert!(matches!(
            LlllConfig::load(&project),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_format_hub_info() {
        let config = LlllConfig::from_snapshot(&snapshot(), None);
        let info = config.format_hub_info();

        assert_eq!(
            info,
            "Hub: TechnicHub\n\
             Name: Hub1\n\
             Battery: 8100 mV\n\
             Firmware: 3.6.1\n\
             Ports:\n  \
             A: Technic Large Motor (Motor)\n  \
             D: Unknown (ID 9999) (PUPDevice)\n\
             \n\
             Settings:\n  \
             timeout: 60"
        );
    }

    #[test]
    fn test_format_hub_info_without_ports() {
        let mut snapshot = snapshot();
        snapshot.ports.clear();
        let info = LlllConfig::from_snapshot(&snapshot, None).format_hub_info();
        assert!(info.contains("Ports: none detected\n"));
    }
}

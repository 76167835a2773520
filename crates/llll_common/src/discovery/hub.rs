//! Hub snapshot types
//!
//! A `HubSnapshot` is one complete discovery result. It is never merged
//! with an earlier snapshot; a new discovery replaces the old one wholesale.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::catalog;

/// Hub classes the probe knows how to instantiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HubType {
    InventorHub,
    PrimeHub,
    TechnicHub,
    CityHub,
    EssentialHub,
    MoveHub,
    Unknown,
}

impl HubType {
    /// All concrete hub types, in the order the probe tries them
    pub const KNOWN: [HubType; 6] = [
        HubType::InventorHub,
        HubType::PrimeHub,
        HubType::TechnicHub,
        HubType::CityHub,
        HubType::EssentialHub,
        HubType::MoveHub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HubType::InventorHub => "InventorHub",
            HubType::PrimeHub => "PrimeHub",
            HubType::TechnicHub => "TechnicHub",
            HubType::CityHub => "CityHub",
            HubType::EssentialHub => "EssentialHub",
            HubType::MoveHub => "MoveHub",
            HubType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a hub type name outside the known set
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown hub type '{0}'. Valid types: InventorHub, PrimeHub, TechnicHub, CityHub, EssentialHub, MoveHub")]
pub struct UnknownHubType(pub String);

impl FromStr for HubType {
    type Err = UnknownHubType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "Unknown" {
            return Ok(HubType::Unknown);
        }
        HubType::KNOWN
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownHubType(s.to_string()))
    }
}

/// Wire/config values outside the enumeration become `Unknown`, flagged in the log
impl From<String> for HubType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|e: UnknownHubType| {
            warn!("Unrecognised hub type '{}', treating as Unknown", e.0);
            HubType::Unknown
        })
    }
}

impl From<HubType> for String {
    fn from(value: HubType) -> Self {
        value.as_str().to_string()
    }
}

/// One scanned port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDevice {
    /// Port letter, A through F
    pub port: char,
    /// `None` means nothing is plugged in
    #[serde(default)]
    pub device_id: Option<u32>,
    /// Set when probing the port itself failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(
        default,
        rename = "pybricks_class",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_class: Option<String>,
    #[serde(
        default,
        rename = "pybricks_module",
        skip_serializing_if = "Option::is_none"
    )]
    pub device_module: Option<String>,
}

impl PortDevice {
    pub fn empty(port: char) -> Self {
        Self {
            port,
            device_id: None,
            error: None,
            device_name: None,
            device_class: None,
            device_module: None,
        }
    }

    pub fn with_device(port: char, device_id: u32) -> Self {
        Self {
            device_id: Some(device_id),
            ..Self::empty(port)
        }
    }

    pub fn has_device(&self) -> bool {
        self.device_id.is_some()
    }

    /// Attach catalog names to this port. Empty ports are left alone.
    pub fn enrich(&mut self) {
        let Some(id) = self.device_id else {
            return;
        };
        match catalog::lookup(id) {
            Some(descriptor) => {
                self.device_name = Some(descriptor.name.to_string());
                self.device_class = Some(descriptor.class.to_string());
                self.device_module = Some(descriptor.module.to_string());
            }
            None => {
                self.device_name = Some(catalog::unknown_device_label(id));
                self.device_class = None;
                self.device_module = None;
            }
        }
    }
}

/// Hub identity and port wiring at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSnapshot {
    pub hub_type: HubType,
    #[serde(default)]
    pub hub_name: String,
    /// Battery voltage in millivolts
    #[serde(default)]
    pub battery_voltage: u32,
    /// Firmware version reported by the hub, when it could be determined
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pybricks_version: Option<String>,
    /// One entry per scanned port, in port order
    #[serde(default)]
    pub ports: Vec<PortDevice>,
}

impl HubSnapshot {
    /// Enrich every port from the device catalog
    pub fn enrich(&mut self) {
        for port in &mut self.ports {
            port.enrich();
        }
    }

    /// Ports with something plugged in
    pub fn occupied_ports(&self) -> impl Iterator<Item = &PortDevice> {
        self.ports.iter().filter(|p| p.has_device())
    }
}

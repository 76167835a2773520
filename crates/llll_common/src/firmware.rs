//! Firmware version resolution
//!
//! Pure helpers: parse hub-reported and release versions, compare them, and
//! work out which release asset belongs to which hub.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::discovery::HubType;
use crate::github_releases::ReleaseInfo;

/// Message reported when the release registry could not be reached
pub const FETCH_FAILED_MESSAGE: &str = "could not fetch latest release";

/// A `major.minor.patch` firmware version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub const ZERO: FirmwareVersion = FirmwareVersion {
        major: 0,
        minor: 0,
        patch: 0,
    };

    /// Parse a version string.
    ///
    /// `"3.6.1"` and `"v3.6.1"` give 3.6.1, `"3.6.0b1"` gives 3.6.0, `"3.6"`
    /// gives 3.6.0. Empty, `"unknown"` and anything unparseable give 0.0.0.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

        // Numeric core only: pre-release tails like "b1" or "rc2" are dropped
        let core_len = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let core = &trimmed[..core_len];
        if core.is_empty() {
            return Self::ZERO;
        }

        let mut parts = [0u32; 3];
        for (i, part) in core.split('.').enumerate() {
            let Ok(n) = part.parse::<u32>() else {
                return Self::ZERO;
            };
            if let Some(slot) = parts.get_mut(i) {
                *slot = n;
            }
        }

        Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Compare two version strings numerically
pub fn compare_versions(current: &str, latest: &str) -> Ordering {
    FirmwareVersion::parse(current).cmp(&FirmwareVersion::parse(latest))
}

/// True when `latest` is strictly newer than `current`
pub fn is_update_available(current: &str, latest: &str) -> bool {
    compare_versions(current, latest) == Ordering::Less
}

/// Firmware product name used in release asset names
pub fn firmware_product(hub_type: HubType) -> Option<&'static str> {
    match hub_type {
        HubType::InventorHub | HubType::PrimeHub => Some("primehub"),
        HubType::TechnicHub => Some("technichub"),
        HubType::CityHub => Some("cityhub"),
        HubType::EssentialHub => Some("essentialhub"),
        HubType::MoveHub => Some("movehub"),
        HubType::Unknown => None,
    }
}

/// Release asset name, e.g. `pybricks-primehub-v3.6.1.zip`.
///
/// `None` means the hub type has no firmware in the release registry.
pub fn firmware_filename(hub_type: HubType, version: &str) -> Option<String> {
    firmware_product(hub_type).map(|product| format!("pybricks-{}-v{}.zip", product, version))
}

/// Outcome of comparing installed firmware with the latest release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateCheck {
    pub available: bool,
    pub current: String,
    pub latest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Decide whether an update is available given the fetched release.
///
/// The download URL is only looked up when there is something to download.
pub fn evaluate_update<E>(
    current: &str,
    hub_type: HubType,
    release: Result<ReleaseInfo, E>,
) -> UpdateCheck {
    let release = match release {
        Ok(release) => release,
        Err(_) => {
            return UpdateCheck {
                available: false,
                current: current.to_string(),
                latest: None,
                release_url: None,
                download_url: None,
                error: Some(FETCH_FAILED_MESSAGE.to_string()),
            }
        }
    };

    let available = is_update_available(current, &release.version);
    let download_url = if available {
        release.firmware_download_url(hub_type).map(str::to_string)
    } else {
        None
    };

    UpdateCheck {
        available,
        current: current.to_string(),
        latest: Some(release.version),
        release_url: release.url,
        download_url,
        error: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github_releases::ReleaseAsset;

    fn release(version: &str) -> ReleaseInfo {
        ReleaseInfo {
            version: version.to_string(),
            url: Some(format!(
                "https://github.com/pybricks/pybricks-micropython/releases/tag/v{}",
                version
            )),
            published_at: None,
            assets: vec![
                ReleaseAsset {
                    name: format!("pybricks-primehub-v{}.zip", version),
                    url: format!("https://example.invalid/primehub-{}.zip", version),
                },
                ReleaseAsset {
                    name: format!("pybricks-technichub-v{}.zip", version),
                    url: format!("https://example.invalid/technichub-{}.zip", version),
                },
            ],
        }
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("3.5.0", "3.6.1"), Ordering::Less);
        assert_eq!(compare_versions("3.6.1", "3.6.1"), Ordering::Equal);
        assert_eq!(compare_versions("3.6.0b1", "3.6.0"), Ordering::Equal);
        assert_eq!(compare_versions("unknown", "3.0.0"), Ordering::Less);
        assert_eq!(compare_versions("3.10.0", "3.9.9"), Ordering::Greater);
    }

    #[test]
    fn test_parse_variants() {
        let v = |major, minor, patch| FirmwareVersion {
            major,
            minor,
            patch,
        };
        assert_eq!(FirmwareVersion::parse("v3.6.1"), v(3, 6, 1));
        assert_eq!(FirmwareVersion::parse("3.6.0rc2"), v(3, 6, 0));
        assert_eq!(FirmwareVersion::parse("3.6"), v(3, 6, 0));
        assert_eq!(FirmwareVersion::parse(""), FirmwareVersion::ZERO);
        assert_eq!(FirmwareVersion::parse("garbage"), FirmwareVersion::ZERO);
        assert_eq!(FirmwareVersion::parse("3..1"), FirmwareVersion::ZERO);
        assert_eq!(FirmwareVersion::parse("3.6.1").to_string(), "3.6.1");
    }

    #[test]
    fn test_firmware_filename() {
        assert_eq!(
            firmware_filename(HubType::InventorHub, "3.6.1").as_deref(),
            Some("pybricks-primehub-v3.6.1.zip")
        );
        assert_eq!(
            firmware_filename(HubType::PrimeHub, "3.6.1"),
            firmware_filename(HubType::InventorHub, "3.6.1")
        );
        assert_eq!(
            firmware_filename(HubType::MoveHub, "3.5.0").as_deref(),
            Some("pybricks-movehub-v3.5.0.zip")
        );
        assert_eq!(firmware_filename(HubType::Unknown, "3.6.1"), None);
    }

    #[test]
    fn test_evaluate_update_available() {
        let check = evaluate_update::<()>("3.5.0", HubType::TechnicHub, Ok(release("3.6.1")));

        assert!(check.available);
        assert_eq!(check.latest.as_deref(), Some("3.6.1"));
        assert_eq!(
            check.download_url.as_deref(),
            Some("https://example.invalid/technichub-3.6.1.zip")
        );
        assert!(check.release_url.is_some());
        assert!(check.error.is_none());
    }

    #[test]
    fn test_evaluate_up_to_date_has_no_download() {
        let check = evaluate_update::<()>("3.6.1", HubType::PrimeHub, Ok(release("3.6.1")));
        assert!(!check.available);
        assert!(check.download_url.is_none());
    }

    #[test]
    fn test_evaluate_missing_asset() {
        let check = evaluate_update::<()>("3.0.0", HubType::CityHub, Ok(release("3.6.1")));
        assert!(check.available);
        assert!(check.download_url.is_none());
    }

    #[test]
    fn test_evaluate_fetch_failure() {
        let check = evaluate_update("3.5.0", HubType::PrimeHub, Err("offline"));

        assert!(!check.available);
        assert_eq!(check.current, "3.5.0");
        assert!(check.latest.is_none());
        assert_eq!(check.error.as_deref(), Some("could not fetch latest release"));
    }
}

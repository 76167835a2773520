//! Pybricks release registry client
//!
//! Looks up the latest pybricks-micropython release on GitHub and downloads
//! firmware assets. Nothing is cached; every check hits the API.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::discovery::HubType;
use crate::firmware::{evaluate_update, firmware_filename, UpdateCheck};
use crate::fs_atomic::AtomicFile;

/// Latest-release endpoint for the Pybricks firmware repository
pub const LATEST_RELEASE_URL: &str =
    "https://api.github.com/repos/pybricks/pybricks-micropython/releases/latest";

const API_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Release registry failures
#[derive(Debug, thiserror::Error)]
pub enum FirmwareError {
    #[error("Failed to reach {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("No firmware available for hub type {0}")]
    UnsupportedHub(HubType),

    #[error("Release {version} has no asset for {hub_type}")]
    AssetNotFound { version: String, hub_type: HubType },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Raw GitHub release JSON (the fields we read)
#[derive(Debug, Clone, Deserialize)]
struct GitHubRelease {
    #[serde(default)]
    tag_name: String,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitHubAsset {
    name: String,
    browser_download_url: String,
}

/// A downloadable release file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub url: String,
}

/// One firmware release
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReleaseInfo {
    /// Tag without the leading `v`
    pub version: String,
    /// Release page
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub assets: Vec<ReleaseAsset>,
}

impl From<GitHubRelease> for ReleaseInfo {
    fn from(raw: GitHubRelease) -> Self {
        let version = raw
            .tag_name
            .strip_prefix('v')
            .unwrap_or(&raw.tag_name)
            .to_string();
        Self {
            version,
            url: raw.html_url,
            published_at: raw.published_at,
            assets: raw
                .assets
                .into_iter()
                .map(|a| ReleaseAsset {
                    name: a.name,
                    url: a.browser_download_url,
                })
                .collect(),
        }
    }
}

impl ReleaseInfo {
    /// Parse the body of a GitHub release API response
    pub fn from_github_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<GitHubRelease>(json).map(Self::from)
    }

    /// Download URL of the firmware asset for `hub_type`, if this release has one
    pub fn firmware_download_url(&self, hub_type: HubType) -> Option<&str> {
        let filename = firmware_filename(hub_type, &self.version)?;
        self.assets
            .iter()
            .find(|a| a.name == filename)
            .map(|a| a.url.as_str())
    }
}

/// GitHub releases API client
#[derive(Debug, Clone)]
pub struct ReleaseClient {
    http: reqwest::Client,
    latest_url: String,
    user_agent: String,
}

impl Default for ReleaseClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReleaseClient {
    pub fn new() -> Self {
        Self::with_endpoint(LATEST_RELEASE_URL)
    }

    /// Client against a different latest-release endpoint
    pub fn with_endpoint(latest_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            latest_url: latest_url.into(),
            user_agent: format!("llll/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Fetch the latest release
    pub async fn latest_release(&self) -> Result<ReleaseInfo, FirmwareError> {
        let url = self.latest_url.as_str();
        debug!("Fetching {}", url);

        let response = self
            .http
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/vnd.github.v3+json")
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|source| FirmwareError::Http {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FirmwareError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let release: GitHubRelease =
            response.json().await.map_err(|source| FirmwareError::Http {
                url: url.to_string(),
                source,
            })?;

        Ok(release.into())
    }

    /// Compare `current` against the latest release
    pub async fn check_update_available(&self, current: &str, hub_type: HubType) -> UpdateCheck {
        let release = self.latest_release().await;
        if let Err(e) = &release {
            warn!("Release lookup failed: {}", e);
        }
        evaluate_update(current, hub_type, release)
    }

    /// Download the latest firmware for `hub_type` into `dest_dir`, returning the file path
    pub async fn download_latest_firmware(
        &self,
        hub_type: HubType,
        dest_dir: &Path,
    ) -> Result<std::path::PathBuf, FirmwareError> {
        let release = self.latest_release().await?;
        let filename = firmware_filename(hub_type, &release.version)
            .ok_or(FirmwareError::UnsupportedHub(hub_type))?;
        let url = release
            .firmware_download_url(hub_type)
            .ok_or_else(|| FirmwareError::AssetNotFound {
                version: release.version.clone(),
                hub_type,
            })?;

        let dest = dest_dir.join(filename);
        self.download(url, &dest).await?;
        Ok(dest)
    }

    /// Download `url` to `dest`; the file appears only once complete
    pub async fn download(&self, url: &str, dest: &Path) -> Result<(), FirmwareError> {
        let mut response = self
            .http
            .get(url)
            .header("User-Agent", &self.user_agent)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|source| FirmwareError::Http {
                url: url.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FirmwareError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let write_err = |source: std::io::Error| FirmwareError::Write {
            path: dest.display().to_string(),
            source,
        };

        // An early return drops `file`, which removes the partial temp file
        let mut file = AtomicFile::create(dest).map_err(write_err)?;
        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await.map_err(|source| FirmwareError::Http {
            url: url.to_string(),
            source,
        })? {
            file.write_all(&chunk).map_err(write_err)?;
            written += chunk.len();
        }
        file.commit().map_err(write_err)?;

        info!("Downloaded {} ({} bytes)", dest.display(), written);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATEST_JSON: &str = r#"{
        "tag_name": "v3.6.1",
        "html_url": "https://github.com/pybricks/pybricks-micropython/releases/tag/v3.6.1",
        "published_at": "2025-03-11T10:00:00Z",
        "prerelease": false,
        "assets": [
            {"name": "pybricks-primehub-v3.6.1.zip", "browser_download_url": "https://github.com/dl/primehub.zip", "size": 1},
            {"name": "pybricks-cityhub-v3.6.1.zip", "browser_download_url": "https://github.com/dl/cityhub.zip", "size": 1}
        ]
    }"#;

    #[test]
    fn test_parse_github_release() {
        let release = ReleaseInfo::from_github_json(LATEST_JSON).unwrap();

        assert_eq!(release.version, "3.6.1");
        assert_eq!(
            release.url.as_deref(),
            Some("https://github.com/pybricks/pybricks-micropython/releases/tag/v3.6.1")
        );
        assert_eq!(release.assets.len(), 2);
        assert_eq!(release.published_at.as_deref(), Some("2025-03-11T10:00:00Z"));
    }

    #[test]
    fn test_firmware_download_url() {
        let release = ReleaseInfo::from_github_json(LATEST_JSON).unwrap();

        assert_eq!(
            release.firmware_download_url(HubType::InventorHub),
            Some("https://github.com/dl/primehub.zip")
        );
        assert_eq!(
            release.firmware_download_url(HubType::CityHub),
            Some("https://github.com/dl/cityhub.zip")
        );
        assert_eq!(release.firmware_download_url(HubType::TechnicHub), None);
        assert_eq!(release.firmware_download_url(HubType::Unknown), None);
    }

    #[test]
    fn test_tag_without_prefix() {
        let release = ReleaseInfo::from_github_json(r#"{"tag_name": "3.5.0"}"#).unwrap();
        assert_eq!(release.version, "3.5.0");
        assert!(release.assets.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_registry_reports_fetch_failure() {
        let client = ReleaseClient::with_endpoint("http://127.0.0.1:9/releases/latest");

        let check = client.check_update_available("3.5.0", HubType::PrimeHub).await;

        assert!(!check.available);
        assert_eq!(check.error.as_deref(), Some("could not fetch latest release"));
    }

    /// Serve one canned HTTP response on a local port, writing the body in
    /// small pieces
    async fn serve_once(status: &'static str, body: &'static [u8]) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for piece in body.chunks(5) {
                socket.write_all(piece).await.unwrap();
                socket.flush().await.unwrap();
            }
            let _ = socket.shutdown().await;
        });
        format!("http://{}/pybricks-primehub-v3.6.1.zip", addr)
    }

    #[tokio::test]
    async fn test_download_streams_body_to_dest() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("pybricks-primehub-v3.6.1.zip");
        let url = serve_once("200 OK", b"PK firmware image bytes").await;

        ReleaseClient::new().download(&url, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"PK firmware image bytes");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_download_error_status_writes_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let dest = dir.path().join("fw.zip");
        let url = serve_once("404 Not Found", b"missing").await;

        let err = ReleaseClient::new().download(&url, &dest).await.unwrap_err();

        assert!(matches!(err, FirmwareError::Status { status: 404, .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

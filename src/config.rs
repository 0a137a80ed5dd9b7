//! Configuration types for portal-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Which persistence backend(s) receive retrieved documents
///
/// Fixed for the whole run at startup; there is no per-document override.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Write documents to the local filesystem only
    #[default]
    Local,
    /// Upload documents to the object store; fall back to local on failure
    Remote,
    /// Write locally and upload remotely, unconditionally, for every document
    Both,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StorageMode::Local => "local",
            StorageMode::Remote => "remote",
            StorageMode::Both => "both",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(StorageMode::Local),
            "remote" => Ok(StorageMode::Remote),
            "both" => Ok(StorageMode::Both),
            other => Err(format!(
                "unknown storage mode '{}' (expected local, remote, or both)",
                other
            )),
        }
    }
}

/// Portal endpoint configuration (base address, paths, browser identity)
///
/// Groups settings describing the council portal being scraped.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Base URL of the portal (default: "https://planning.example.gov.uk")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path template for the disclaimer page; `{id}` is replaced with the
    /// application id (default: "/docs/ShowDocsList.aspx?AppNo={id}")
    #[serde(default = "default_disclaimer_path")]
    pub disclaimer_path: String,

    /// Substring identifying a "view files" link in the file-listing table
    /// (default: "ViewFiles")
    #[serde(default = "default_view_files_marker")]
    pub view_files_marker: String,

    /// User-Agent header sent on every request; portals reject obvious bots
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Accept-Language header sent on every request (default: "en-GB,en;q=0.9")
    #[serde(default = "default_accept_language")]
    pub accept_language: String,

    /// Timeout for HTML/metadata fetches (default: 30 seconds)
    #[serde(default = "default_html_timeout", with = "duration_serde")]
    pub html_timeout: Duration,

    /// Timeout for binary document downloads (default: 60 seconds)
    #[serde(default = "default_binary_timeout", with = "duration_serde")]
    pub binary_timeout: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            disclaimer_path: default_disclaimer_path(),
            view_files_marker: default_view_files_marker(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            html_timeout: default_html_timeout(),
            binary_timeout: default_binary_timeout(),
        }
    }
}

impl PortalConfig {
    /// Build the absolute disclaimer URL for an application id
    pub fn disclaimer_url(&self, application_id: &str) -> String {
        let path = self.disclaimer_path.replace("{id}", application_id);
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Local storage configuration (download and diagnostics directories)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage mode for the run (default: local)
    #[serde(default)]
    pub mode: StorageMode,

    /// Root directory for downloaded documents; one subdirectory is created
    /// per application id (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Directory for diagnostic artifacts dumped on resolution failures
    /// (default: "./debug")
    #[serde(default = "default_debug_dir")]
    pub debug_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::default(),
            download_dir: default_download_dir(),
            debug_dir: default_debug_dir(),
        }
    }
}

/// Remote object-store configuration
///
/// Only consulted when the storage mode is `remote` or `both`.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RemoteStorageConfig {
    /// Bucket name (default: "planning-documents")
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Bucket region (default: "eu-west-2")
    #[serde(default = "default_region")]
    pub region: String,

    /// Key prefix under which objects are stored (default: "applications")
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Source-system tag recorded in object metadata (default: "portal-dl")
    #[serde(default = "default_source_tag")]
    pub source_tag: String,
}

impl Default for RemoteStorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            prefix: default_prefix(),
            source_tag: default_source_tag(),
        }
    }
}

impl RemoteStorageConfig {
    /// Object key for a document: `{prefix}/{application_id}/{filename}`
    pub fn object_key(&self, application_id: &str, filename: &str) -> String {
        format!(
            "{}/{}/{}",
            self.prefix.trim_matches('/'),
            application_id,
            filename
        )
    }
}

/// Batch behavior configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Politeness delay inserted between consecutive documents, in
    /// milliseconds (default: 1000). Fixed; never data-dependent.
    #[serde(default = "default_politeness_delay", with = "duration_ms_serde")]
    pub politeness_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            politeness_delay: default_politeness_delay(),
        }
    }
}

/// Main configuration for PortalDownloader
///
/// Fields are organized into logical sub-configs:
/// - [`portal`](PortalConfig) - portal address, paths, browser identity, timeouts
/// - [`storage`](StorageConfig) - storage mode and local directories
/// - [`remote`](RemoteStorageConfig) - bucket, region, prefix, source tag
/// - [`batch`](BatchConfig) - politeness delay
///
/// All sub-config fields are flattened for a flat JSON/TOML surface.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Portal endpoint settings
    #[serde(flatten)]
    pub portal: PortalConfig,

    /// Storage mode and local directories
    #[serde(flatten)]
    pub storage: StorageConfig,

    /// Remote object-store settings
    #[serde(flatten)]
    pub remote: RemoteStorageConfig,

    /// Batch pacing settings
    #[serde(flatten)]
    pub batch: BatchConfig,
}

// Convenience accessors so call sites can use `config.download_dir()` etc.
// without reaching through the sub-config structs.
impl Config {
    /// Root directory for downloaded documents
    pub fn download_dir(&self) -> &PathBuf {
        &self.storage.download_dir
    }

    /// Storage mode for the run
    pub fn storage_mode(&self) -> StorageMode {
        self.storage.mode
    }
}

fn default_base_url() -> String {
    "https://planning.example.gov.uk".to_string()
}

fn default_disclaimer_path() -> String {
    "/docs/ShowDocsList.aspx?AppNo={id}".to_string()
}

fn default_view_files_marker() -> String {
    "ViewFiles".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_accept_language() -> String {
    "en-GB,en;q=0.9".to_string()
}

fn default_html_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_binary_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_debug_dir() -> PathBuf {
    PathBuf::from("./debug")
}

fn default_bucket() -> String {
    "planning-documents".to_string()
}

fn default_region() -> String {
    "eu-west-2".to_string()
}

fn default_prefix() -> String {
    "applications".to_string()
}

fn default_source_tag() -> String {
    "portal-dl".to_string()
}

fn default_politeness_delay() -> Duration {
    Duration::from_millis(1000)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds, for sub-second delays)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_local_mode() {
        let config = Config::default();
        assert_eq!(config.storage_mode(), StorageMode::Local);
        assert_eq!(config.download_dir(), &PathBuf::from("./downloads"));
    }

    #[test]
    fn disclaimer_url_substitutes_application_id() {
        let portal = PortalConfig {
            base_url: "https://planning.borough.gov.uk/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            portal.disclaimer_url("24/01234/FUL"),
            "https://planning.borough.gov.uk/docs/ShowDocsList.aspx?AppNo=24/01234/FUL"
        );
    }

    #[test]
    fn object_key_joins_prefix_app_and_filename() {
        let remote = RemoteStorageConfig::default();
        assert_eq!(
            remote.object_key("APP123", "100_site_plan.pdf"),
            "applications/APP123/100_site_plan.pdf"
        );

        let remote = RemoteStorageConfig {
            prefix: "/archive/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            remote.object_key("APP123", "a.pdf"),
            "archive/APP123/a.pdf"
        );
    }

    #[test]
    fn storage_mode_parses_case_insensitively() {
        assert_eq!("local".parse::<StorageMode>().unwrap(), StorageMode::Local);
        assert_eq!("REMOTE".parse::<StorageMode>().unwrap(), StorageMode::Remote);
        assert_eq!("Both".parse::<StorageMode>().unwrap(), StorageMode::Both);
        assert!("s3".parse::<StorageMode>().is_err());
    }

    #[test]
    fn storage_mode_round_trips_through_display() {
        for mode in [StorageMode::Local, StorageMode::Remote, StorageMode::Both] {
            assert_eq!(mode.to_string().parse::<StorageMode>().unwrap(), mode);
        }
    }

    #[test]
    fn config_deserializes_from_flat_json() {
        let json = serde_json::json!({
            "base_url": "https://planning.city.gov.uk",
            "mode": "both",
            "bucket": "city-docs",
            "politeness_delay": 250
        });
        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.portal.base_url, "https://planning.city.gov.uk");
        assert_eq!(config.storage.mode, StorageMode::Both);
        assert_eq!(config.remote.bucket, "city-docs");
        assert_eq!(config.batch.politeness_delay, Duration::from_millis(250));
        // Unset fields take defaults
        assert_eq!(config.portal.html_timeout, Duration::from_secs(30));
    }
}

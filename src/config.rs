//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. the `--config` command-line argument
//! 2. `$RR2OPML_CONFIG` (environment variable)
//! 3. `~/.config/rr2opml/config.toml` (Linux/macOS)
//!    `%APPDATA%\rr2opml\config.toml` (Windows)
//!
//! A missing file is created with defaults by [`ensure_config`]. Unlike a
//! viewer, a daemon must not run on guessed settings, so parse errors are
//! returned rather than replaced by defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, Rr2OpmlError};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "RR2OPML_CONFIG";

/// Servers may drop an IDLE session after 30 minutes (RFC 2177).
const MAX_REARM_SECS: u64 = 29 * 60;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging and cache settings.
    pub general: GeneralConfig,
    /// Mailbox account settings.
    pub mail: MailConfig,
    /// Story database and output locations.
    pub storage: StorageConfig,
    /// Serialized-fiction site the notifications come from.
    pub site: SiteConfig,
    /// Watch loop timing.
    pub watch: WatchConfig,
}

/// Logging and cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
}

/// Mailbox account settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port (implicit TLS).
    pub port: u16,
    /// Folder that receives the notification emails.
    pub folder: String,
    /// Connect and read timeout for the mail socket, in seconds.
    pub timeout_secs: u64,
}

/// Story database and output locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database location: `sqlite:///path`, a bare path, or `:memory:`.
    pub database: String,
    /// Directory the outline document is written to.
    pub feeds_directory: PathBuf,
    /// File name of the outline document inside `feeds_directory`.
    pub outline_file: String,
}

/// Serialized-fiction site the notifications come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Scheme and host of the site, without a trailing slash.
    pub base_url: String,
    /// Sender address of the notification emails.
    pub sender: String,
    /// Fragment every notification subject contains.
    pub subject: String,
    /// User agent sent when following notification links.
    pub user_agent: String,
    /// Whole-request timeout for link resolution, in seconds.
    pub http_timeout_secs: u64,
}

/// Watch loop timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Maximum lifetime of one IDLE before it is ended and re-issued.
    pub rearm_interval_secs: u64,
    /// Longest single blocking read while idling.
    pub poll_interval_secs: u64,
    /// Pause after a swallowed fault before re-arming.
    pub fault_pause_secs: u64,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            cache_dir: None,
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            host: String::new(),
            port: 993,
            folder: "INBOX".to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: "sqlite:///rr2opml.sqlite".to_string(),
            feeds_directory: PathBuf::from("feeds"),
            outline_file: "subscriptions.xml".to_string(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.royalroad.com".to_string(),
            sender: "noreply@royalroad.com".to_string(),
            subject: "New Chapter of".to_string(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:92.0) Gecko/20100101 Firefox/92.0"
                .to_string(),
            http_timeout_secs: 30,
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            rearm_interval_secs: 10 * 60,
            poll_interval_secs: 30,
            fault_pause_secs: 5,
        }
    }
}

// ── Derived values ──────────────────────────────────────────────

impl Config {
    /// Check the settings the mailbox commands depend on.
    pub fn validate(&self) -> Result<()> {
        if self.mail.host.trim().is_empty() {
            return Err(Rr2OpmlError::Config("mail.host is empty".to_string()));
        }
        if self.mail.username.trim().is_empty() {
            return Err(Rr2OpmlError::Config("mail.username is empty".to_string()));
        }
        if self.mail.folder.trim().is_empty() {
            return Err(Rr2OpmlError::Config("mail.folder is empty".to_string()));
        }
        self.watch.validate()
    }

    /// Full path of the outline document.
    pub fn outline_path(&self) -> PathBuf {
        self.storage.feeds_directory.join(&self.storage.outline_file)
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl SiteConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl WatchConfig {
    /// Reject timings that would let the server drop the session or never wake.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(Rr2OpmlError::Config(
                "watch.poll_interval_secs must be positive".to_string(),
            ));
        }
        if self.rearm_interval_secs == 0 || self.rearm_interval_secs >= MAX_REARM_SECS {
            return Err(Rr2OpmlError::Config(format!(
                "watch.rearm_interval_secs must be between 1 and {}",
                MAX_REARM_SECS - 1
            )));
        }
        if self.poll_interval_secs > self.rearm_interval_secs {
            return Err(Rr2OpmlError::Config(
                "watch.poll_interval_secs exceeds watch.rearm_interval_secs".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rearm_interval(&self) -> Duration {
        Duration::from_secs(self.rearm_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn fault_pause(&self) -> Duration {
        Duration::from_secs(self.fault_pause_secs)
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Parse configuration text. Missing fields take their defaults.
pub fn parse_config(contents: &str) -> std::result::Result<Config, toml::de::Error> {
    toml::from_str(contents)
}

/// Read and parse the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| Rr2OpmlError::io(path, e))?;
    let cfg = parse_config(&contents).map_err(|source| Rr2OpmlError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(cfg)
}

/// Create the config file with default values if it does not exist yet.
///
/// Safe to call before every load. Returns `true` if a file was written.
pub fn ensure_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    save_config(path, &Config::default())?;
    tracing::info!(path = %path.display(), "Created default config");
    Ok(true)
}

/// Write configuration to `path`, replacing it atomically.
pub fn save_config(path: &Path, config: &Config) -> Result<()> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| Rr2OpmlError::Config(format!("could not render config: {e}")))?;
    crate::fsutil::atomic_write(path, contents.as_bytes())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("rr2opml").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rr2opml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "info");
        assert_eq!(cfg.mail.port, 993);
        assert_eq!(cfg.storage.database, "sqlite:///rr2opml.sqlite");
        assert_eq!(cfg.site.base_url, "https://www.royalroad.com");
        assert_eq!(cfg.watch.rearm_interval_secs, 600);
        assert_eq!(cfg.watch.poll_interval_secs, 30);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[mail]
username = "reader"
host = "imap.example.org"

[storage]
feeds_directory = "/srv/feeds"
"#;
        let cfg = parse_config(partial).expect("parse partial");
        assert_eq!(cfg.mail.username, "reader");
        assert_eq!(cfg.mail.host, "imap.example.org");
        assert_eq!(cfg.mail.folder, "INBOX");
        assert_eq!(
            cfg.outline_path(),
            PathBuf::from("/srv/feeds/subscriptions.xml")
        );
        assert_eq!(cfg.site.sender, "noreply@royalroad.com");
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        assert!(parse_config("[mail]\nport = \"imaps\"\n").is_err());
    }

    #[test]
    fn test_validate_requires_host_and_user() {
        let mut cfg = Config::default();
        assert!(matches!(cfg.validate(), Err(Rr2OpmlError::Config(_))));

        cfg.mail.host = "imap.example.org".to_string();
        cfg.mail.username = "reader".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_watch_timing_limits() {
        let mut watch = WatchConfig::default();
        assert!(watch.validate().is_ok());

        watch.rearm_interval_secs = 30 * 60;
        assert!(watch.validate().is_err());

        watch.rearm_interval_secs = 20;
        watch.poll_interval_secs = 30;
        assert!(watch.validate().is_err());

        watch.poll_interval_secs = 0;
        assert!(watch.validate().is_err());
    }

    #[test]
    fn test_ensure_config_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rr2opml.toml");

        assert!(ensure_config(&path).unwrap());
        let first = std::fs::read_to_string(&path).unwrap();
        assert_eq!(load_config(&path).unwrap(), Config::default());

        // A user edit must survive a second call.
        let edited = first.replace("username = \"\"", "username = \"reader\"");
        std::fs::write(&path, &edited).unwrap();
        assert!(!ensure_config(&path).unwrap());
        assert_eq!(load_config(&path).unwrap().mail.username, "reader");
    }

    #[test]
    fn test_load_config_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[mail\nhost = 1").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(Rr2OpmlError::ConfigParse { .. })
        ));
    }
}

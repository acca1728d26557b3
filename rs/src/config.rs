//! Service configuration, loadable from a TOML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::SyncOptions;
use crate::types::Signature;
use crate::write::{WriteOptions, DEFAULT_MESSAGE_PREFIX};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// The working copy served by the store.
    pub repo_dir: PathBuf,
    pub git: GitConfig,
    pub auth: AuthConfig,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            repo_dir: PathBuf::from("repo"),
            git: GitConfig::default(),
            auth: AuthConfig::default(),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Version-control behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Upstream remote URL, cloned when the working copy is missing.
    pub remote: Option<String>,
    /// Commit after each write.
    pub commit: bool,
    /// Pull before each write and on the sync timer.
    pub pull: bool,
    /// Push after each commit.
    pub push: bool,
    /// Seconds between background syncs.
    pub sync_interval_secs: u64,
    pub message_prefix: String,
    /// Run this script (with the remote as its only argument) instead of the
    /// built-in clone/pull.
    pub sync_script: Option<PathBuf>,
    pub author_name: String,
    pub author_email: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        let signature = Signature::default();
        Self {
            remote: None,
            commit: false,
            pull: false,
            push: false,
            sync_interval_secs: 5 * 60,
            message_prefix: DEFAULT_MESSAGE_PREFIX.into(),
            sync_script: None,
            author_name: signature.name,
            author_email: signature.email,
        }
    }
}

impl GitConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            enabled: self.pull,
            remote: self.remote.clone(),
            script: self.sync_script.clone(),
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            commit: self.commit,
            push: self.push,
            message_prefix: self.message_prefix.clone(),
            signature: Signature {
                name: self.author_name.clone(),
                email: self.author_email.clone(),
            },
        }
    }
}

/// Request authentication.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared bearer token. `None` disables authentication.
    pub key: Option<String>,
}

impl Config {
    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&content)
            .map_err(|e| Error::config(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Reject combinations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.git.pull && self.git.remote.is_none() {
            return Err(Error::config("git.pull requires git.remote"));
        }
        if self.git.push && !self.git.commit {
            return Err(Error::config("git.push requires git.commit"));
        }
        if self.git.sync_interval_secs == 0 {
            return Err(Error::config("git.sync_interval_secs must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_read_only_friendly() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert!(!config.git.commit && !config.git.pull && !config.git.push);
        assert_eq!(config.git.sync_interval(), Duration::from_secs(300));
        assert!(config.auth.key.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            repo_dir = "/srv/content"

            [git]
            remote = "https://example.com/site.git"
            commit = true
            pull = true

            [auth]
            key = "s3cret"
            "#,
        )
        .unwrap();
        assert_eq!(config.repo_dir, PathBuf::from("/srv/content"));
        assert_eq!(config.port, 8000);
        assert!(config.git.commit && config.git.pull && !config.git.push);
        assert_eq!(config.git.message_prefix, DEFAULT_MESSAGE_PREFIX);
        assert_eq!(config.auth.key.as_deref(), Some("s3cret"));
        config.validate().unwrap();

        let write = config.git.write_options();
        assert!(write.commit);
        assert_eq!(write.signature, Signature::default());
        let sync = config.git.sync_options();
        assert!(sync.enabled);
        assert_eq!(sync.remote.as_deref(), Some("https://example.com/site.git"));
    }

    #[test]
    fn validate_rejects_pull_without_remote() {
        let mut config = Config::default();
        config.git.pull = true;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn validate_rejects_push_without_commit() {
        let mut config = Config::default();
        config.git.push = true;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/nonexistent/repo-api.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}

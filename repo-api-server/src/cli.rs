use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::Parser;

use repo_api::Config;

/// Serve a git working copy as a read/write content store.
///
/// Settings come from the optional TOML file first; flags and their
/// environment variables override it.
#[derive(Debug, Parser)]
#[command(name = "repo-api-server", version)]
pub struct Args {
    /// TOML configuration file
    #[arg(long, env = "REPO_API_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(long, env = "APP_PORT")]
    pub port: Option<u16>,

    /// Working copy to serve
    #[arg(long, env = "REPO_DIR")]
    pub repo_dir: Option<PathBuf>,

    /// Upstream remote, cloned when the working copy is missing
    #[arg(long, env = "GIT_REMOTE")]
    pub remote: Option<String>,

    /// Commit after each write
    #[arg(long, env = "GIT_COMMIT", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub commit: Option<bool>,

    /// Pull before each write and on the sync timer
    #[arg(long, env = "GIT_PULL", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub pull: Option<bool>,

    /// Push after each commit
    #[arg(long, env = "GIT_PUSH", num_args = 0..=1, default_missing_value = "true", value_parser = BoolishValueParser::new())]
    pub push: Option<bool>,

    /// Seconds between background syncs
    #[arg(long, env = "GIT_SYNC_INTERVAL")]
    pub sync_interval: Option<u64>,

    /// Prefix for commit messages
    #[arg(long, env = "GIT_MESSAGE_PREFIX")]
    pub message_prefix: Option<String>,

    /// Script run as `<script> <remote>` instead of the built-in clone/pull
    #[arg(long, env = "SYNC_SCRIPT")]
    pub sync_script: Option<PathBuf>,

    /// Bearer token required on API routes
    #[arg(long, env = "AUTH_KEY", hide_env_values = true)]
    pub auth_key: Option<String>,

    /// Largest accepted request body, in bytes
    #[arg(long, env = "MAX_BODY_BYTES")]
    pub max_body_bytes: Option<usize>,

    /// Sync on startup and then periodically
    #[arg(long)]
    pub sync: bool,
}

impl Args {
    /// The file configuration (or defaults) with every given flag applied.
    pub fn load_config(&self) -> repo_api::Result<Config> {
        let mut config = match self.config {
            Some(ref path) => Config::load(path)?,
            None => Config::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref dir) = self.repo_dir {
            config.repo_dir = dir.clone();
        }
        if let Some(ref remote) = self.remote {
            config.git.remote = Some(remote.clone());
        }
        if let Some(commit) = self.commit {
            config.git.commit = commit;
        }
        if let Some(pull) = self.pull {
            config.git.pull = pull;
        }
        if let Some(push) = self.push {
            config.git.push = push;
        }
        if let Some(secs) = self.sync_interval {
            config.git.sync_interval_secs = secs;
        }
        if let Some(ref prefix) = self.message_prefix {
            config.git.message_prefix = prefix.clone();
        }
        if let Some(ref script) = self.sync_script {
            config.git.sync_script = Some(script.clone());
        }
        if let Some(ref key) = self.auth_key {
            config.auth.key = Some(key.clone());
        }
        if let Some(limit) = self.max_body_bytes {
            config.max_body_bytes = limit;
        }
    }
}

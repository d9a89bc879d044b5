//! Per-application configuration: where one hosted application's daemon
//! socket and log live on disk (spec.md §6).

use anyhow::{Context, Result};
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Resolves the filesystem layout `<home>/<app_name>/{control.sock,log}` for
/// one hosted application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    app_name: String,
    home_dir: PathBuf,
}

impl AppConfig {
    /// Resolves `app_name`'s directory under the current user's home.
    pub fn new(app_name: impl Into<String>) -> Result<Self> {
        let home_dir = BaseDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .context("could not determine the current user's home directory")?;
        Ok(Self {
            app_name: app_name.into(),
            home_dir,
        })
    }

    /// Builds a config rooted at an explicit directory, for tests that need
    /// isolation from the real `$HOME`.
    pub fn with_home(app_name: impl Into<String>, home_dir: impl AsRef<Path>) -> Self {
        Self {
            app_name: app_name.into(),
            home_dir: home_dir.as_ref().to_path_buf(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn app_dir(&self) -> PathBuf {
        self.home_dir.join(&self.app_name)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.app_dir().join("control.sock")
    }

    pub fn log_path(&self) -> PathBuf {
        self.app_dir().join("log")
    }
}

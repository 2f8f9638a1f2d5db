// Local sync target
//
// The feed lives at ${cache_dir}/http${resource}. Each publish writes
// ${canonical}.N and renames it over the canonical file, so readers never
// see a half-written document.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::codec;
use crate::destination::Destination;
use crate::event_log::EventLog;

use super::SyncError;

/// Settings consulted only when publishing locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettings {
    /// Directory holding the `http` feed tree
    pub cache_dir: PathBuf,
    /// Host name used in the public feed URL
    pub server_name: String,
    /// Port used in the public feed URL
    pub server_port: u16,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("/var/cache/cups"),
            server_name: "localhost".to_string(),
            server_port: 631,
        }
    }
}

impl LocalSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = server_name.into();
        self
    }

    pub fn with_server_port(mut self, server_port: u16) -> Self {
        self.server_port = server_port;
        self
    }
}

/// Publishes the feed by atomic file replacement
#[derive(Debug)]
pub struct LocalTarget {
    canonical: PathBuf,
    staging: PathBuf,
    feed_url: String,
}

impl LocalTarget {
    pub fn new(destination: &Destination, settings: &LocalSettings) -> Self {
        let canonical = settings
            .cache_dir
            .join("http")
            .join(destination.resource_path().trim_start_matches('/'));

        let mut staging = OsString::from(canonical.as_os_str());
        staging.push(".N");

        Self {
            canonical,
            staging: PathBuf::from(staging),
            feed_url: format!(
                "http://{}:{}/http{}",
                settings.server_name, settings.server_port, destination.resource
            ),
        }
    }

    pub fn canonical(&self) -> &Path {
        &self.canonical
    }

    pub fn staging(&self) -> &Path {
        &self.staging
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Make sure the feed directory exists; the canonical file is the baseline
    pub async fn prime(&mut self) -> Result<(), SyncError> {
        if let Some(parent) = self.canonical.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| SyncError::CacheDir {
                    path: parent.display().to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    pub async fn publish(&mut self, log: &EventLog) -> Result<(), SyncError> {
        codec::save_file(&self.staging, log).await?;

        if let Err(source) = tokio::fs::rename(&self.staging, &self.canonical).await {
            if let Err(e) = tokio::fs::remove_file(&self.staging).await {
                tracing::error!(
                    path = %self.staging.display(),
                    error = %e,
                    "Unable to remove staging file"
                );
            }
            return Err(SyncError::Rename {
                from: self.staging.display().to_string(),
                to: self.canonical.display().to_string(),
                source,
            });
        }

        tracing::debug!(
            path = %self.canonical.display(),
            events = log.len(),
            "Published feed"
        );
        Ok(())
    }
}

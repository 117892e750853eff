// SPDX-License-Identifier: MIT OR Apache-2.0
//! The `Downloader` capability boundary (spec §1: agent binary download is
//! out of scope for the core; callers supply an implementation).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use scout_error::ScoutError;

/// Options passed to [`Downloader::download`], derived from the resolved
/// [`scout_config::ScoutConfig`].
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Directory the binary should be cached/unpacked under.
    pub cache_dir: PathBuf,
    /// Base URL to fetch the release archive from.
    pub download_url: String,
    /// Mirrors `!coreAgentDownload`: when `true`, the downloader must not
    /// reach the network and should only return a binary already present on
    /// disk (or fail).
    pub disallow_download: bool,
}

/// Obtains a core agent binary for a given version, fetching it if
/// necessary. The core crate does not implement binary verification or
/// retrieval itself; embedding programs supply this.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Resolve `version` to a local executable path under `options.cache_dir`.
    async fn download(
        &self,
        version: &str,
        options: &DownloadOptions,
    ) -> Result<PathBuf, ScoutError>;
}

/// The conventional on-disk layout for a downloaded core agent binary:
/// `<cacheDir>/scout_apm_core-v<version>-<triple>/core-agent` (spec §6).
#[must_use]
pub fn binary_path(cache_dir: &Path, version: &str, triple: &str) -> PathBuf {
    cache_dir
        .join(format!("scout_apm_core-v{version}-{triple}"))
        .join("core-agent")
}

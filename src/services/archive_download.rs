//! Downloads yearly archive bundles and unpacks their XML documents.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use zip::ZipArchive;

use crate::config::ArchiveConfig;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("archive endpoint returned {status} for {year}")]
    Status { year: i32, status: StatusCode },

    #[error("invalid zip bundle: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("bundle for {0} contains no XML document")]
    Empty(i32),

    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub struct ArchiveDownloader {
    client: Client,
    base_url: String,
    dir: PathBuf,
}

impl ArchiveDownloader {
    pub fn new(config: &ArchiveConfig, timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            dir: config.dir.clone(),
        })
    }

    /// Fetch one year's bundle and extract its XML files into the archive dir
    pub async fn download_year(&self, year: i32) -> Result<Vec<PathBuf>, DownloadError> {
        let url = format!("{}/{}", self.base_url, year);
        tracing::info!(year, url = %url, "Downloading archive bundle");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status { year, status });
        }

        let bytes = response.bytes().await?;
        tracing::debug!(year, size = bytes.len(), "Bundle downloaded, extracting");

        let dir = self.dir.clone();
        let files = tokio::task::spawn_blocking(move || extract_xml(&bytes, &dir)).await??;
        if files.is_empty() {
            return Err(DownloadError::Empty(year));
        }

        tracing::info!(year, files = files.len(), "Archive bundle extracted");
        Ok(files)
    }
}

/// Write every `.xml` entry of a zip bundle into `dir`, flattening paths
pub fn extract_xml(bundle: &[u8], dir: &Path) -> Result<Vec<PathBuf>, DownloadError> {
    let mut archive = ZipArchive::new(Cursor::new(bundle))?;
    fs::create_dir_all(dir)?;

    let mut written = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        // Entries escaping the bundle root are ignored
        let Some(name) = entry
            .enclosed_name()
            .and_then(|p| p.file_name())
            .map(|n| n.to_os_string())
        else {
            continue;
        };

        let is_xml = Path::new(&name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"));
        if !is_xml {
            continue;
        }

        let target = dir.join(&name);
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        written.push(target);
    }

    Ok(written)
}

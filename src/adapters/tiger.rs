//! TIGER/Line ZCTA archive acquisition: candidate years, resilient download
//! and extraction.

use crate::config::TigerConfig;
use crate::utils::error::{EtlError, Result};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const PROGRESS_STEP_BYTES: u64 = 5 * 1024 * 1024;

/// One downloadable archive version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveCandidate {
    pub year: u16,
    pub file_name: String,
    pub url: String,
}

impl ArchiveCandidate {
    pub fn new(base_url: &str, year: u16) -> Self {
        let file_name = format!("tl_{}_us_zcta520.zip", year);
        let url = format!(
            "{}/TIGER{}/ZCTA5/{}",
            base_url.trim_end_matches('/'),
            year,
            file_name
        );
        Self {
            year,
            file_name,
            url,
        }
    }

    /// Shapefile name inside the archive.
    pub fn shp_name(&self) -> String {
        format!("tl_{}_us_zcta520.shp", self.year)
    }
}

/// Configured year first, then up to `fallback_years` earlier years, never
/// below `min_year`.
pub fn archive_candidates(config: &TigerConfig) -> Vec<ArchiveCandidate> {
    let mut candidates = vec![ArchiveCandidate::new(&config.base_url, config.year)];
    for offset in 1..=config.fallback_years {
        let Some(year) = config.year.checked_sub(offset) else {
            break;
        };
        if year < config.min_year {
            break;
        }
        candidates.push(ArchiveCandidate::new(&config.base_url, year));
    }
    candidates
}

pub struct TigerDownloader {
    client: Client,
    config: TigerConfig,
}

impl TigerDownloader {
    pub fn new(config: TigerConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()?;
        Ok(Self { client, config })
    }

    /// Returns the first candidate already on disk, otherwise downloads the
    /// first one that succeeds.
    pub async fn fetch_archive(
        &self,
        candidates: &[ArchiveCandidate],
        raw_dir: &Path,
    ) -> Result<(ArchiveCandidate, PathBuf)> {
        for candidate in candidates {
            let path = raw_dir.join(&candidate.file_name);
            if path.exists() {
                tracing::info!("♻️ Using existing archive {}", path.display());
                return Ok((candidate.clone(), path));
            }
        }

        tokio::fs::create_dir_all(raw_dir).await?;
        let mut failed = Vec::new();
        for candidate in candidates {
            let path = raw_dir.join(&candidate.file_name);
            match self.download(&candidate.url, &path).await {
                Ok(()) => return Ok((candidate.clone(), path)),
                Err(e) => {
                    tracing::warn!("⚠️ TIGER {} unavailable: {}", candidate.year, e);
                    failed.push(candidate.url.clone());
                }
            }
        }

        Err(EtlError::DownloadFailed { urls: failed })
    }

    /// Downloads `url` to `dest` with retries. A 404 gives up immediately.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let attempts = self.config.retry_attempts.max(1);
        let mut timeout = Duration::from_secs(self.config.read_timeout_seconds);
        let mut attempt = 1;

        loop {
            tracing::info!("📥 Downloading {} (attempt {}/{})", url, attempt, attempts);
            let error = match self.download_once(url, dest, timeout).await {
                Ok(bytes) => {
                    tracing::info!(
                        "Downloaded {:.1} MB to {}",
                        bytes as f64 / 1_048_576.0,
                        dest.display()
                    );
                    return Ok(());
                }
                Err(e) => e,
            };

            if let EtlError::ApiError(e) = &error {
                if e.status() == Some(StatusCode::NOT_FOUND) {
                    return Err(error);
                }
                if e.is_timeout() {
                    timeout = Duration::from_secs(self.config.extended_read_timeout_seconds);
                }
            }
            if attempt >= attempts {
                return Err(error);
            }

            tracing::warn!(
                "Attempt {}/{} for {} failed: {}. Retrying in {}s",
                attempt,
                attempts,
                url,
                error,
                self.config.retry_delay_seconds
            );
            tokio::time::sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
            attempt += 1;
        }
    }

    async fn download_once(&self, url: &str, dest: &Path, timeout: Duration) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;

        let part_path = part_path(dest);
        let result = async {
            let mut file = tokio::fs::File::create(&part_path).await?;
            let mut written: u64 = 0;
            let mut next_report = PROGRESS_STEP_BYTES;
            while let Some(chunk) = response.chunk().await? {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
                if written >= next_report {
                    tracing::info!("  ... {} MB", written / 1_048_576);
                    next_report += PROGRESS_STEP_BYTES;
                }
            }
            file.flush().await?;
            Ok::<u64, EtlError>(written)
        }
        .await;

        match result {
            Ok(written) => {
                tokio::fs::rename(&part_path, dest).await?;
                Ok(written)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&part_path).await;
                Err(e)
            }
        }
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

/// Extracts `archive` into `dir` unless `shp_name` is already there.
pub fn extract_archive(archive: &Path, dir: &Path, shp_name: &str) -> Result<PathBuf> {
    let shp_path = dir.join(shp_name);
    if shp_path.exists() {
        tracing::info!("♻️ Shapefile already extracted at {}", shp_path.display());
        return Ok(shp_path);
    }

    std::fs::create_dir_all(dir)?;
    tracing::info!("📦 Extracting {} to {}", archive.display(), dir.display());
    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file)?;
    zip.extract(dir)?;

    if !shp_path.exists() {
        return Err(EtlError::ProcessingError {
            message: format!(
                "{} does not contain {}",
                archive.display(),
                shp_name
            ),
        });
    }
    Ok(shp_path)
}

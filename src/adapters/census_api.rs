//! Census Data API client for ACS estimates by ZCTA.

use crate::config::CensusConfig;
use crate::domain::table::RawTable;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::time::Duration;

pub struct CensusClient {
    client: Client,
    config: CensusConfig,
    api_key: String,
}

impl CensusClient {
    /// Fails with `MissingApiKey` before any request when no key is set.
    pub fn new(config: CensusConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(EtlError::MissingApiKey)?
            .to_string();
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn endpoint(&self) -> String {
        format!(
            "{}/data/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.year,
            self.config.dataset
        )
    }

    /// One request for up to `max_vars_per_request` codes. `Ok(None)` means
    /// the API answered with headers only.
    pub async fn fetch_chunk(&self, variables: &[String]) -> Result<Option<RawTable>> {
        let geography = format!("{}:*", self.config.geography);
        let response = self
            .client
            .get(self.endpoint())
            .query(&[
                ("get", variables.join(",").as_str()),
                ("for", geography.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Census API returned {}: {}", status, body.trim());
            return Err(EtlError::ProcessingError {
                message: format!("Census API returned {}", status),
            });
        }

        let json: serde_json::Value = response.json().await?;
        RawTable::from_json_rows(json)
    }

    /// Fetches every chunk in order with a pause between requests. Failed
    /// or empty chunks are logged and skipped; only a run where nothing
    /// came back is an error.
    pub async fn fetch_chunks(&self, chunks: &[Vec<String>]) -> Result<Vec<RawTable>> {
        let pause = Duration::from_millis(self.config.rate_limit_ms);
        let mut tables = Vec::with_capacity(chunks.len());

        for (index, chunk) in chunks.iter().enumerate() {
            if index > 0 && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            tracing::info!(
                "🌐 Fetching chunk {}/{} ({} variables)",
                index + 1,
                chunks.len(),
                chunk.len()
            );

            match self.fetch_chunk(chunk).await {
                Ok(Some(table)) => {
                    tracing::debug!("Chunk {} returned {} rows", index + 1, table.len());
                    tables.push(table);
                }
                Ok(None) => {
                    tracing::warn!("⚠️ Chunk {} returned no data rows", index + 1);
                }
                Err(e) => {
                    tracing::error!("❌ Chunk {} failed: {}", index + 1, e);
                }
            }
        }

        if tables.is_empty() {
            return Err(EtlError::NoChunksFetched {
                attempted: chunks.len(),
            });
        }
        tracing::info!("Fetched {}/{} chunks", tables.len(), chunks.len());
        Ok(tables)
    }
}

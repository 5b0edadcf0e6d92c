use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::{MempoolInfo, MempoolStats, MempoolUpstream, RawTransaction, UpstreamError};
use crate::{configuration::UpstreamSettings, mempool_engine::Txid};

/// REST client for an esplora-style node endpoint, the same API family the
/// public mempool explorers serve.
pub struct EsploraClient {
    http: reqwest::Client,
    base_url: String,
}

impl EsploraClient {
    pub fn build(settings: &UpstreamSettings) -> Result<EsploraClient, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn get(&self, endpoint: &str) -> Result<reqwest::Response, UpstreamError> {
        let url = format!("{}/api/{}", self.base_url, endpoint);
        let response = self.http.get(url).send().await?;
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, UpstreamError> {
        let response = self.get(endpoint).await?;
        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                status: response.status(),
                endpoint: endpoint.to_owned(),
            });
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MempoolUpstream for EsploraClient {
    async fn list_pending_ids(&self) -> Result<Vec<Txid>, UpstreamError> {
        self.get_json("mempool/txids").await
    }

    async fn get_transaction(&self, txid: &Txid) -> Result<Option<RawTransaction>, UpstreamError> {
        let endpoint = format!("tx/{txid}");
        let response = self.get(&endpoint).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(UpstreamError::Status {
                status: response.status(),
                endpoint,
            });
        }
        Ok(Some(response.json::<RawTransaction>().await?))
    }

    async fn get_mempool_info(&self) -> Result<MempoolInfo, UpstreamError> {
        let stats: MempoolStats = self.get_json("mempool").await?;
        Ok(stats.into())
    }
}

//! Ingest and hunt administration client.

use reqwest::Client;
use url::Url;

use super::{ClientError, parse_response};
use crate::objects::{HuntRecord, IngestResponse, Row};

/// Typed HTTP client for the daemon's REST endpoints.
#[derive(Debug, Clone)]
pub struct HunterClient {
    http: Client,
    base_url: Url,
}

impl HunterClient {
    /// * `base_url` – root URL of the hunter daemon.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `POST /monitoring/{artifact}` – publish rows for an artifact.
    pub async fn publish_rows(
        &self,
        artifact: &str,
        rows: &[Row],
    ) -> Result<IngestResponse, ClientError> {
        let url = self.base_url.join(&format!("/monitoring/{artifact}"))?;
        let resp = self.http.post(url).json(rows).send().await?;
        parse_response(resp).await
    }

    /// `GET /hunts` – all hunts ordered by id.
    pub async fn list_hunts(&self) -> Result<Vec<HuntRecord>, ClientError> {
        let url = self.base_url.join("/hunts")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /hunts/{hunt_id}`.
    pub async fn get_hunt(&self, hunt_id: &str) -> Result<HuntRecord, ClientError> {
        let url = self.base_url.join(&format!("/hunts/{hunt_id}"))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `PUT /hunts/{hunt_id}` – create or replace a hunt.
    pub async fn put_hunt(&self, record: &HuntRecord) -> Result<HuntRecord, ClientError> {
        let url = self.base_url.join(&format!("/hunts/{}", record.hunt_id))?;
        let resp = self.http.put(url).json(record).send().await?;
        parse_response(resp).await
    }
}

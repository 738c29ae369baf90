//! [`RemoteStore`] over the Lockbox HTTP API.
//!
//! The adapter is bound to one account through its bearer token. The engine
//! never sees the token; every request carries it.

use crate::adapter::RemoteStore;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    ErrorBody, ErrorCode, FetchRequest, HealthResponse, InsertRequest, InsertResponse,
    UpdateRequest, entries_path, fetch_path, summaries_path,
};
use async_trait::async_trait;
use lockbox_types::{EntityClass, NewEntry, RemoteId, ServerEntry, ServerSummary};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Connection settings for a Lockbox server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the server (e.g. `https://vault.example.com`).
    pub base_url: String,
    /// Bearer token of the account.
    pub token: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl RemoteConfig {
    /// Creates a config with the default timeout.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// HTTP client for one account on a Lockbox server.
pub struct HttpRemoteStore {
    config: RemoteConfig,
    client: Client,
}

impl HttpRemoteStore {
    /// Creates a new remote store.
    pub fn new(config: RemoteConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Checks that the server is reachable and speaks a compatible protocol.
    pub async fn health(&self) -> SyncResult<HealthResponse> {
        let request = self.client.get(self.url("/health"));
        send(request, "health").await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn get(&self, path: String) -> RequestBuilder {
        self.client.get(self.url(&path)).bearer_auth(&self.config.token)
    }

    fn post(&self, path: String) -> RequestBuilder {
        self.client.post(self.url(&path)).bearer_auth(&self.config.token)
    }

    fn put(&self, path: String) -> RequestBuilder {
        self.client.put(self.url(&path)).bearer_auth(&self.config.token)
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn summaries(&self, class: EntityClass) -> SyncResult<Vec<ServerSummary>> {
        send(self.get(summaries_path(class)), "summaries").await
    }

    async fn all_entries(&self, class: EntityClass) -> SyncResult<Vec<ServerEntry>> {
        send(self.get(entries_path(class)), "entry list").await
    }

    async fn entries_by_ids(
        &self,
        class: EntityClass,
        ids: &[RemoteId],
    ) -> SyncResult<Vec<ServerEntry>> {
        let body = FetchRequest { ids: ids.to_vec() };
        send(self.post(fetch_path(class)).json(&body), "entry fetch").await
    }

    async fn insert_entries(
        &self,
        class: EntityClass,
        entries: Vec<NewEntry>,
    ) -> SyncResult<Vec<RemoteId>> {
        let count = entries.len();
        let body = InsertRequest { entries };
        let response: InsertResponse =
            send(self.post(entries_path(class)).json(&body), "entry insert").await?;
        debug!("Server assigned {} ids for {} {} entries", response.ids.len(), count, class);
        Ok(response.ids)
    }

    async fn update_entries(
        &self,
        class: EntityClass,
        entries: Vec<ServerEntry>,
    ) -> SyncResult<()> {
        let body = UpdateRequest { entries };
        let response = dispatch(self.put(entries_path(class)).json(&body), "entry update").await?;
        check_status(response, "entry update").await?;
        Ok(())
    }
}

async fn dispatch(request: RequestBuilder, what: &str) -> SyncResult<Response> {
    request.send().await.map_err(|e| {
        if e.is_timeout() {
            SyncError::Timeout
        } else {
            SyncError::Network(format!("{what} request failed: {e}"))
        }
    })
}

async fn send<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> SyncResult<T> {
    let response = dispatch(request, what).await?;
    let response = check_status(response, what).await?;
    response
        .json()
        .await
        .map_err(|e| SyncError::Protocol(format!("failed to parse {what} response: {e}")))
}

/// Maps a non-2xx response to the matching error.
async fn check_status(response: Response, what: &str) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: Option<ErrorBody> = serde_json::from_str(&text).ok();
    let message = body
        .as_ref()
        .map_or_else(|| text.clone(), |b| b.error.clone());

    Err(match (status, body.map(|b| b.code)) {
        (StatusCode::UNAUTHORIZED, _) => SyncError::Auth(format!("{what} rejected: {message}")),
        (_, Some(ErrorCode::InvalidEntityClass)) => SyncError::InvalidEntityClass(message),
        (_, Some(ErrorCode::NotFound)) => SyncError::NotFound(message),
        (_, Some(ErrorCode::Conflict)) => SyncError::Conflict(message),
        (_, Some(ErrorCode::BadRequest)) => SyncError::Protocol(format!("{what} rejected: {message}")),
        _ => SyncError::Network(format!("{what} failed ({status}): {message}")),
    })
}

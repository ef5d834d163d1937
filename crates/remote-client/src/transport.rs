//! Transport — the HTTP seam between the controller and the server.
//!
//! `HttpTransport` talks to a real server with reqwest.  Tests substitute
//! scripted implementations.  Every call races the request against a
//! cancellation token so the controller can abandon in-flight work on
//! shutdown.

use std::future::Future;

use remote_proto::config::ServerConfig;
use remote_proto::protocol::{paths, ActionList, Payload, StatusResponse};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::TransportError;

pub trait Transport: Send + Sync + 'static {
    /// `GET /api/main/status?actionId=<action_id>`
    fn status(
        &self,
        action_id: i64,
    ) -> impl Future<Output = Result<StatusResponse, TransportError>> + Send;

    /// POST a form-encoded command, returning the raw response body.
    fn post(
        &self,
        path: &str,
        payload: &Payload,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;

    fn action_list(&self) -> impl Future<Output = Result<ActionList, TransportError>> + Send;

    fn location_list(&self) -> impl Future<Output = Result<Vec<String>, TransportError>> + Send;
}

/// Run `fut` unless `cancel` fires first.
pub async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        res = fut => res,
    }
}

pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ServerConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("remote-panel/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, TransportError> {
        let resp = self.client.get(self.url(path)).query(query).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

impl Transport for HttpTransport {
    async fn status(&self, action_id: i64) -> Result<StatusResponse, TransportError> {
        trace!("GET {} actionId={}", paths::STATUS, action_id);
        self.get_json(paths::STATUS, &[("actionId", action_id.to_string())])
            .await
    }

    async fn post(&self, path: &str, payload: &Payload) -> Result<String, TransportError> {
        trace!("POST {} {:?}", path, payload.fields());
        let resp = self
            .client
            .post(self.url(path))
            .form(payload)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        Ok(resp.text().await?)
    }

    async fn action_list(&self) -> Result<ActionList, TransportError> {
        self.get_json(paths::ACTION_LIST, &[]).await
    }

    async fn location_list(&self) -> Result<Vec<String>, TransportError> {
        self.get_json(paths::LOCATION_LIST, &[]).await
    }
}

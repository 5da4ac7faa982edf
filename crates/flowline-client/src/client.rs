// HTTP client wrapper for the Flowline API

use std::time::Duration;

use futures::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use uuid::Uuid;

use flowline_core::{Event, Execution, NewEvent};
use flowline_protocol::StreamEvent;

use crate::stream::decode_stream;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found")]
    NotFound,

    #[error("Timed out after {0:?} waiting for completion")]
    WaitTimeout(Duration),
}

impl From<std::convert::Infallible> for ClientError {
    fn from(infallible: std::convert::Infallible) -> Self {
        match infallible {}
    }
}

pub struct Client {
    base_url: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    // ============================================
    // Events (producer write path + catch-up reads)
    // ============================================

    /// Emit one event into a workspace log.
    pub async fn emit_event(&self, event: &NewEvent) -> Result<Event, ClientError> {
        let path = format!("/v1/workspaces/{}/events", event.workspace_id);
        self.post(&path, event).await
    }

    /// Catch up on a workspace log after a known sequence number.
    pub async fn list_events(
        &self,
        workspace_id: Uuid,
        after_sequence: i64,
    ) -> Result<Vec<Event>, ClientError> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            data: Vec<Event>,
        }
        let envelope: Envelope = self
            .get(&format!(
                "/v1/workspaces/{}/events?after_sequence={}",
                workspace_id, after_sequence
            ))
            .await?;
        Ok(envelope.data)
    }

    // ============================================
    // Executions
    // ============================================

    /// Get the status of an execution.
    pub async fn get_execution(&self, execution_id: Uuid) -> Result<Execution, ClientError> {
        self.get(&format!("/v1/executions/{}", execution_id)).await
    }

    /// Poll an execution until it reaches a terminal status.
    pub async fn wait_for_completion(
        &self,
        execution_id: Uuid,
        timeout: Duration,
    ) -> Result<Execution, ClientError> {
        let poll_interval = Duration::from_secs(1);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let execution = self.get_execution(execution_id).await?;
            if execution.status.is_terminal() {
                return Ok(execution);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ClientError::WaitTimeout(timeout));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Stream execution events, starting at `from_index` so a reconnect
    /// never re-receives already-seen events. The stream ends at the
    /// `[DONE]` sentinel or a terminal event.
    pub async fn stream_execution(
        &self,
        execution_id: Uuid,
        from_index: i64,
    ) -> Result<impl Stream<Item = Result<StreamEvent, ClientError>>, ClientError> {
        let url = format!("{}/v1/executions/{}/stream", self.base_url, execution_id);
        let response = self
            .http
            .get(&url)
            .query(&[("fromIndex", from_index)])
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(decode_stream(response.bytes_stream().boxed()))
    }

    // ============================================
    // Plumbing
    // ============================================

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.post(&url).json(body).send().await?;
        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.json().await?;
        Ok(body)
    }
}

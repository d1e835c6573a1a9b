// src/client/http.rs

//! `reqwest`-backed implementation of [`TaskBackend`].

use std::time::Duration;

use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::client::backend::{BackendFuture, TaskBackend};
use crate::client::envelope::error_message;
use crate::config::ConfigFile;
use crate::errors::{Result, TrackerError};
use crate::model::{FailedTask, FailedTaskPage, GenerationRequest, SubmittedTask, Task};

const SUBMIT_PATH: [&str; 2] = ["synthetic", "generate-synthetic-data"];
const STATUS_PATH: [&str; 2] = ["synthetic", "task-status"];
const FAILED_TASKS_PATH: [&str; 2] = ["synthetic", "failed-tasks"];
const TASKS_PATH: [&str; 2] = ["synthetic", "tasks"];

/// HTTP client for the generation backend.
///
/// Every request carries the configured timeout; hitting it surfaces as
/// `TrackerError::Transport`.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    base_url: Url,
    http_client: Client,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let raw = base_url.into();
        let base_url = Url::parse(raw.trim())
            .map_err(|e| TrackerError::ConfigError(format!("invalid base URL '{raw}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(TrackerError::ConfigError(format!(
                "base URL '{raw}' cannot carry a path"
            )));
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::ConfigError(format!("building HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Self::new(cfg.base_url.clone(), cfg.request_timeout)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `base_url` followed by `route` and then `tail`. Each element is
    /// percent-encoded as one path segment, so an id containing `/`, `?` or
    /// `#` cannot leave its segment.
    fn url(&self, route: &[&str], tail: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // `new` rejected cannot-be-a-base URLs.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(route).extend(tail);
        }
        url
    }
}

/// Turn a response into `T`, mapping non-2xx replies and bad bodies onto the
/// error taxonomy.
async fn decode_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = check_status(response).await?;
    serde_json::from_slice::<T>(&body).map_err(|e| TrackerError::Decode(e.to_string()))
}

async fn check_status(response: Response) -> Result<Vec<u8>> {
    let status = response.status();
    let body = response.bytes().await?.to_vec();

    if status.is_success() {
        return Ok(body);
    }

    let message = error_message(&body, status.canonical_reason().unwrap_or("request failed"));
    debug!(status = status.as_u16(), %message, "backend returned error status");

    if status == StatusCode::NOT_FOUND {
        Err(TrackerError::NotFound(message))
    } else {
        Err(TrackerError::Service {
            status: status.as_u16(),
            message,
        })
    }
}

impl TaskBackend for HttpBackend {
    fn submit<'a>(&'a self, request: &'a GenerationRequest) -> BackendFuture<'a, SubmittedTask> {
        Box::pin(async move {
            let response = self
                .http_client
                .post(self.url(&SUBMIT_PATH, &[]))
                .json(request)
                .send()
                .await?;
            decode_response::<SubmittedTask>(response).await
        })
    }

    fn fetch_status<'a>(&'a self, task_id: &'a str) -> BackendFuture<'a, Task> {
        Box::pin(async move {
            let url = self.url(&STATUS_PATH, &[task_id]);
            let response = self.http_client.get(url).send().await?;
            let mut task = decode_response::<Task>(response).await?;
            if task.id.is_empty() {
                task.id = task_id.to_string();
            }
            Ok(task.normalize())
        })
    }

    fn list_failed_tasks(&self, limit: u32, offset: u32) -> BackendFuture<'_, Vec<FailedTask>> {
        Box::pin(async move {
            let response = self
                .http_client
                .get(self.url(&FAILED_TASKS_PATH, &[]))
                .query(&[("limit", limit), ("offset", offset)])
                .send()
                .await?;
            let page = decode_response::<FailedTaskPage>(response).await?;
            Ok(page.failed_tasks)
        })
    }

    fn retry_failed_task<'a>(
        &'a self,
        failed_task_id: &'a str,
    ) -> BackendFuture<'a, SubmittedTask> {
        Box::pin(async move {
            let url = self.url(&FAILED_TASKS_PATH, &[failed_task_id, "retry"]);
            let response = self.http_client.post(url).send().await?;
            decode_response::<SubmittedTask>(response).await
        })
    }

    fn cancel_task<'a>(&'a self, task_id: &'a str) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let url = self.url(&TASKS_PATH, &[task_id, "cancel"]);
            let response = self.http_client.post(url).send().await?;
            check_status(response).await?;
            Ok(())
        })
    }
}

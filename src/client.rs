use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::{Result, WeightsError};
use crate::types::*;

/// Environment variable overriding the default API endpoint.
pub const ENDPOINT_ENV: &str = "WEIGHTS_UNOFFICIAL_ENDPOINT";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "WEIGHTS_API_KEY";

/// Endpoint used when no override is configured.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:3000";

const API_KEY_HEADER: &str = "x-api-key";

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// How [`WeightsClient::generate_progressive_with`] polls for completion.
///
/// The default matches the service's reference client: a 100 ms interval
/// and no deadline, so the loop only ends when the job reaches a terminal
/// status. Callers that cannot tolerate an unbounded wait should set a
/// deadline or share a cancellation flag; both are checked at each loop
/// iteration boundary.
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Time slept between consecutive status polls.
    pub interval: Duration,

    /// Give up with [`WeightsError::Timeout`] once this much time has
    /// passed since the first poll. `None` polls until a terminal status.
    pub deadline: Option<Duration>,

    /// External abort signal, checked before every sleep. When raised the
    /// call returns [`WeightsError::Cancelled`].
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            deadline: None,
            cancel: None,
        }
    }
}

impl PollOptions {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Async client for the Weights image-generation API.
///
/// Every public endpoint method runs a `GET /health` probe before doing
/// real work and fails fast with [`WeightsError::Unreachable`] when the
/// service does not answer. The underlying connection pool lives as long
/// as the client value and is released when it is dropped.
///
/// # Example
/// ```no_run
/// use weights_rs::WeightsClient;
///
/// # async fn example() -> weights_rs::Result<()> {
/// let client = WeightsClient::new("http://localhost:3000").with_api_key("secret");
/// let quota = client.get_quota().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WeightsClient {
    http: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl WeightsClient {
    /// Create a new client pointing at the given Weights API endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
            api_key: None,
        }
    }

    /// Create a client from `WEIGHTS_UNOFFICIAL_ENDPOINT` and
    /// `WEIGHTS_API_KEY`, falling back to `http://localhost:3000`.
    pub fn from_env() -> Self {
        let endpoint =
            std::env::var(ENDPOINT_ENV).unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let mut client = Self::new(endpoint);
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            client = client.with_api_key(key);
        }
        client
    }

    /// Set the API key sent as `x-api-key` on every request.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Use a custom `reqwest::Client` (for connection pooling, timeouts, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.get(url);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }
        req
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut req = self.http.post(url);
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key);
        }
        req
    }

    fn unreachable(&self, cause: impl std::fmt::Display) -> WeightsError {
        WeightsError::Unreachable {
            endpoint: self.endpoint.clone(),
            cause: cause.to_string(),
        }
    }

    async fn check_status(&self, resp: reqwest::Response) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            Err(WeightsError::Http { status, body })
        }
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Probe `GET /health`. Succeeds silently on any 2xx response; the
    /// body is ignored. Any transport failure or non-success status maps
    /// to [`WeightsError::Unreachable`] carrying the original cause.
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.endpoint);
        let resp = self
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !resp.status().is_success() {
            return Err(self.unreachable(format!(
                "health probe returned HTTP {}",
                resp.status().as_u16()
            )));
        }
        Ok(())
    }

    // ── Status ──────────────────────────────────────────────────────

    /// Fetch the current snapshot of a job via `GET /status/{imageId}`.
    pub async fn get_status(&self, image_id: &str) -> Result<StatusSnapshot> {
        self.health().await?;
        self.fetch_status(image_id).await
    }

    async fn fetch_status(&self, image_id: &str) -> Result<StatusSnapshot> {
        let url = format!("{}/status/{}", self.endpoint, image_id);
        let resp = self
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = self.check_status(resp).await?;

        let mut snapshot: StatusSnapshot = resp.json().await.map_err(|e| {
            WeightsError::InvalidResponse(format!("Failed to parse /status response: {}", e))
        })?;
        if snapshot.image_id.is_empty() {
            snapshot.image_id = image_id.to_string();
        }
        Ok(snapshot)
    }

    // ── Quota ───────────────────────────────────────────────────────

    /// Retrieve quota information via `GET /quota`.
    ///
    /// The body is returned as raw text, never run through JSON parsing.
    pub async fn get_quota(&self) -> Result<String> {
        self.health().await?;
        let url = format!("{}/quota", self.endpoint);
        let resp = self
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = self.check_status(resp).await?;
        resp.text().await.map_err(|e| self.unreachable(e))
    }

    // ── Lora search ─────────────────────────────────────────────────

    /// Search for Lora models via `POST /search-loras`.
    pub async fn search_loras(&self, query: &str) -> Result<Vec<LoraSearchResult>> {
        self.health().await?;
        let url = format!("{}/search-loras", self.endpoint);
        let body = serde_json::json!({ "query": query });
        let resp = self
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = self.check_status(resp).await?;

        let json: Value = resp.json().await.map_err(|e| {
            WeightsError::InvalidResponse(format!("Failed to parse /search-loras response: {}", e))
        })?;
        Ok(parse_lora_results(&json))
    }

    // ── Generation ──────────────────────────────────────────────────

    /// Submit a generation job via `POST /generateImage`. Returns a
    /// ticket carrying the job's `imageId`; completion must be observed
    /// separately via [`get_status`](Self::get_status) or driven by
    /// [`generate_progressive`](Self::generate_progressive).
    pub async fn generate_image(
        &self,
        prompt: &str,
        lora_name: Option<&str>,
    ) -> Result<GenerationTicket> {
        self.health().await?;
        self.submit(prompt, lora_name).await
    }

    async fn submit(&self, prompt: &str, lora_name: Option<&str>) -> Result<GenerationTicket> {
        let url = format!("{}/generateImage", self.endpoint);
        let mut body = serde_json::json!({ "prompt": prompt });
        if let Some(lora) = lora_name {
            body["loraName"] = Value::from(lora);
        }

        let resp = self
            .post(&url)
            .timeout(Duration::from_secs(30))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = self.check_status(resp).await?;

        let json: Value = resp.json().await.map_err(|e| {
            WeightsError::InvalidResponse(format!("Failed to parse /generateImage response: {}", e))
        })?;

        let image_id = json
            .get("imageId")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| WeightsError::InvalidResponse("Response missing imageId".into()))?;
        let image_url = json.get("url").and_then(|v| v.as_str()).map(String::from);

        Ok(GenerationTicket {
            image_id,
            url: image_url,
        })
    }

    // ── Progressive generation ──────────────────────────────────────

    /// Submit a generation job and poll until it completes or fails,
    /// invoking `on_update` on each observed state transition.
    ///
    /// Polls every 100 ms with no deadline; use
    /// [`generate_progressive_with`](Self::generate_progressive_with) to
    /// bound or cancel the wait.
    pub async fn generate_progressive<F>(
        &self,
        prompt: &str,
        lora_name: Option<&str>,
        on_update: F,
    ) -> Result<StatusSnapshot>
    where
        F: FnMut(StatusUpdate),
    {
        self.generate_progressive_with(prompt, lora_name, PollOptions::default(), on_update)
            .await
    }

    /// Submit a generation job and poll until a terminal status, a
    /// deadline, or a cancellation signal.
    ///
    /// `on_update` fires once for the first observation and again each
    /// time the server's `lastModifiedDate` token changes, so the caller
    /// sees a deduplicated stream of transitions rather than one call per
    /// poll. A first poll that already reports completion returns without
    /// ever sleeping. A `FAILED` status raises
    /// [`WeightsError::GenerationFailed`] carrying the server's error
    /// message and stops polling immediately.
    pub async fn generate_progressive_with<F>(
        &self,
        prompt: &str,
        lora_name: Option<&str>,
        options: PollOptions,
        mut on_update: F,
    ) -> Result<StatusSnapshot>
    where
        F: FnMut(StatusUpdate),
    {
        // Fail fast before consuming a generation slot.
        self.health().await?;
        let ticket = self.submit(prompt, lora_name).await?;
        let image_id = ticket.image_id;
        debug!(image_id = %image_id, "generation job submitted");

        // First observation always notifies, changed or not.
        let snapshot = self.get_status(&image_id).await?;
        on_update(StatusUpdate {
            status: snapshot.status,
            image_id: image_id.clone(),
        });
        match snapshot.status {
            JobStatus::Completed => return Ok(snapshot),
            JobStatus::Failed => return Err(generation_failed(snapshot)),
            _ => {}
        }

        let started = Instant::now();
        let mut last_seen = snapshot.last_modified_date;
        loop {
            if let Some(cancel) = &options.cancel {
                if cancel.load(Ordering::Relaxed) {
                    return Err(WeightsError::Cancelled);
                }
            }
            if let Some(deadline) = options.deadline {
                if started.elapsed() > deadline {
                    return Err(WeightsError::Timeout);
                }
            }

            tokio::time::sleep(options.interval).await;

            let snapshot = self.get_status(&image_id).await?;
            if snapshot.last_modified_date != last_seen {
                last_seen = snapshot.last_modified_date.clone();
                trace!(image_id = %image_id, status = ?snapshot.status, "job state changed");
                on_update(StatusUpdate {
                    status: snapshot.status,
                    image_id: image_id.clone(),
                });
            }

            match snapshot.status {
                JobStatus::Completed => return Ok(snapshot),
                JobStatus::Failed => return Err(generation_failed(snapshot)),
                _ => {}
            }
        }
    }
}

fn generation_failed(snapshot: StatusSnapshot) -> WeightsError {
    WeightsError::GenerationFailed(
        snapshot
            .error
            .unwrap_or_else(|| "no error detail provided".to_string()),
    )
}

/// Accept both a bare array and a `{"results": [...]}` wrapper; entries
/// that do not look like a Lora hit are skipped.
fn parse_lora_results(json: &Value) -> Vec<LoraSearchResult> {
    let entries = json
        .as_array()
        .or_else(|| json.get("results").and_then(|v| v.as_array()));
    entries
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

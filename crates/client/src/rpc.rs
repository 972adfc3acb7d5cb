//! Minimal JSON-RPC 2.0 transport over HTTP.
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

use backon::{ExponentialBuilder, Retryable};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, info};
use url::Url;

use crate::{error::RpcCallError, metrics::record_rpc_latency};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, P> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a P,
    id: u64,
}

/// `error` member of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human readable message from the server.
    pub message: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

// `Error` first: an error body must never be read as a `null` result.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonRpcResult<T> {
    Error { error: RpcErrorObject },
    Success { result: T },
}

/// JSON-RPC client with monotonically increasing request ids.
///
/// Transport failures are retried with exponential backoff. JSON-RPC error
/// responses are returned as-is and never retried here.
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: Url,
    next_id: AtomicU64,
    retry: ExponentialBuilder,
}

impl JsonRpcClient {
    /// Client for `url` with the default retry policy (3 retries, 100ms..5s).
    pub fn new(url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            next_id: AtomicU64::new(1),
            retry: ExponentialBuilder::default()
                .with_min_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_secs(5))
                .with_max_times(3),
        }
    }

    /// Overrides the number of transport retries.
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.retry = self.retry.with_max_times(max_retries);
        self
    }

    /// Endpoint this client talks to.
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Sends `method(params)` and decodes the `result` member.
    pub async fn request<P, R>(&self, method: &str, params: P) -> Result<R, RpcCallError>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest { jsonrpc: "2.0", method, params: &params, id };
        let started = Instant::now();

        let send = || async {
            let response = self.http.post(self.url.clone()).json(&request).send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = send
            .retry(&self.retry)
            .notify(|err: &reqwest::Error, dur: Duration| {
                info!(message = "Retrying rpc request", method, error = %err, delay = ?dur);
            })
            .await?;
        record_rpc_latency(method, started.elapsed());

        let parsed: JsonRpcResult<R> = serde_json::from_slice(&body).map_err(|err| {
            RpcCallError::InvalidResponse { status: status.as_u16(), reason: err.to_string() }
        })?;

        match parsed {
            JsonRpcResult::Success { result } => Ok(result),
            JsonRpcResult::Error { error } => {
                debug!(message = "rpc error response", method, code = error.code, error = %error.message);
                Err(RpcCallError::Rpc(error))
            }
        }
    }
}

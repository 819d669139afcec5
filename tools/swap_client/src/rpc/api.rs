use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rpc::retry::{retry_with_timeout, RetryConfig};
use crate::types::{Result, SwapError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ApiStatus {
    Ok,
    Error,
}

/// Envelope shared by the orderbook, relayer and quote services.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: ApiStatus,
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub page: u64,
    #[serde(default)]
    pub total_pages: u64,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub per_page: u64,
}

/// Thin JSON client bound to one service base URL.
#[derive(Clone)]
pub struct ApiClient {
    service: &'static str,
    base: Url,
    client: Client,
    retry: RetryConfig,
}

impl ApiClient {
    pub fn new(service: &'static str, base_url: &str, retry: RetryConfig) -> Result<Self> {
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base = Url::parse(&normalized)
            .map_err(|err| SwapError::Configuration(format!("{service} url {base_url}: {err}")))?;
        let client = Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(|err| SwapError::Configuration(format!("{service} http client: {err}")))?;
        Ok(Self {
            service,
            base,
            client,
            retry,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|err| SwapError::Configuration(format!("{} path {path}: {err}", self.service)))
    }

    /// Idempotent GET, retried on transient failures.
    pub async fn get<T: DeserializeOwned>(&self, path: &str, bearer: Option<&str>) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(service = self.service, %url, "GET");
        retry_with_timeout(self.service, &self.retry, || {
            let request = with_bearer(self.client.get(url.clone()), bearer);
            self.send(request)
        })
        .await
    }

    /// GET where an unknown record (404 or a null result) is `None`.
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        bearer: Option<&str>,
    ) -> Result<Option<T>> {
        let url = self.endpoint(path)?;
        debug!(service = self.service, %url, "GET");
        retry_with_timeout(self.service, &self.retry, || {
            let request = with_bearer(self.client.get(url.clone()), bearer);
            self.send_optional(request)
        })
        .await
    }

    /// Non-idempotent POST: a single attempt, the caller owns retries.
    pub async fn post<B, T>(&self, path: &str, body: &B, bearer: Option<&str>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(service = self.service, %url, "POST");
        retry_with_timeout(self.service, &self.retry.no_retry(), || {
            let request = with_bearer(self.client.post(url.clone()).json(body), bearer);
            self.send(request)
        })
        .await
    }

    /// GET against an endpoint that answers with raw JSON rather than the envelope.
    pub async fn get_raw<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(service = self.service, %url, "GET");
        retry_with_timeout(self.service, &self.retry, || {
            self.send_raw(self.client.get(url.clone()))
        })
        .await
    }

    async fn send_raw<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SwapError::from_status(self.service, status.as_u16(), body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn send_optional<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SwapError::from_status(self.service, status.as_u16(), body));
        }
        envelope_result(self.service, &body)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SwapError::from_status(self.service, status.as_u16(), body));
        }
        unwrap_envelope(self.service, &body)
    }
}

fn with_bearer(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

pub(crate) fn unwrap_envelope<T: DeserializeOwned>(service: &'static str, body: &str) -> Result<T> {
    envelope_result(service, body)?.ok_or_else(|| SwapError::Protocol {
        service,
        message: "missing result".to_string(),
    })
}

fn envelope_result<T: DeserializeOwned>(service: &'static str, body: &str) -> Result<Option<T>> {
    if body.trim().is_empty() {
        return Err(SwapError::Protocol {
            service,
            message: "empty response body".to_string(),
        });
    }
    let envelope: ApiResponse<T> = serde_json::from_str(body).map_err(|err| SwapError::Protocol {
        service,
        message: format!("{err}; body: {body}"),
    })?;
    match envelope.status {
        ApiStatus::Ok => Ok(envelope.result),
        ApiStatus::Error => Err(SwapError::from_service_message(
            service,
            envelope.error.unwrap_or_default(),
        )),
    }
}

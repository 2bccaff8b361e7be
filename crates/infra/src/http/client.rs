use std::time::Duration;

use hearth_domain::constants::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_USER_AGENT, MAX_FEED_BYTES};
use hearth_domain::HearthError;
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use tracing::debug;

use crate::errors::InfraError;

/// HTTP client with bounded timeouts, optional retries, and capped bodies.
///
/// Request URLs are never logged because feed URLs carry secrets.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    max_attempts: usize,
    base_backoff: Duration,
    max_body_bytes: usize,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, HearthError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the provided request builder, retrying connection failures and
    /// server errors while attempts remain.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, HearthError> {
        let attempts = self.max_attempts.max(1);

        for attempt in 0..attempts {
            let cloned_builder = builder.try_clone().ok_or_else(|| {
                HearthError::Internal("request body cannot be cloned for retry".into())
            })?;

            let request = cloned_builder.build().map_err(|err| {
                let infra: InfraError = err.into();
                HearthError::from(infra)
            })?;

            let method = request.method().clone();
            let host = request.url().host_str().unwrap_or_default().to_string();
            debug!(attempt = attempt + 1, %method, %host, "sending HTTP request");

            match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt = attempt + 1, %method, %host, %status, "HTTP response");

                    if status.is_server_error() && attempt + 1 < attempts {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    return Ok(response);
                }
                Err(err) => {
                    let err = err.without_url();
                    debug!(
                        attempt = attempt + 1,
                        %method,
                        %host,
                        error = %err,
                        "HTTP request failed"
                    );

                    if attempt + 1 < attempts && should_retry_error(&err) {
                        self.sleep_with_backoff(attempt + 1).await;
                        continue;
                    }

                    let infra: InfraError = err.into();
                    return Err(HearthError::from(infra));
                }
            }
        }

        Err(HearthError::Internal("http client exhausted retries without a response".into()))
    }

    /// Read the response body as text, failing once it exceeds the size cap.
    pub async fn read_text(&self, mut response: Response) -> Result<String, HearthError> {
        if let Some(length) = response.content_length() {
            if length > self.max_body_bytes as u64 {
                return Err(body_too_large(self.max_body_bytes));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|err| {
            let infra: InfraError = err.into();
            HearthError::from(infra)
        })? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(body_too_large(self.max_body_bytes));
            }
            body.extend_from_slice(&chunk);
        }

        String::from_utf8(body)
            .map_err(|_| HearthError::Parse("feed body is not valid UTF-8".into()))
    }

    fn backoff_delay(&self, retry_number: usize) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8) as u32;
        let multiplier = 1u32 << shift;
        self.base_backoff.saturating_mul(multiplier)
    }

    async fn sleep_with_backoff(&self, retry_number: usize) {
        let delay = self.backoff_delay(retry_number);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("max_attempts", &self.max_attempts)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish_non_exhaustive()
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Duration,
    max_attempts: usize,
    base_backoff: Duration,
    user_agent: String,
    max_body_bytes: usize,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            max_attempts: 1,
            base_backoff: Duration::from_millis(200),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: MAX_FEED_BYTES,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configure the total number of attempts (initial try + retries).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn build(self) -> Result<HttpClient, HearthError> {
        let client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .no_proxy()
            .build()
            .map_err(|err| {
                let infra: InfraError = err.into();
                HearthError::from(infra)
            })?;

        Ok(HttpClient {
            client,
            max_attempts: self.max_attempts.max(1),
            base_backoff: self.base_backoff,
            max_body_bytes: self.max_body_bytes,
        })
    }
}

fn should_retry_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn body_too_large(limit: usize) -> HearthError {
    HearthError::Transport(format!("feed body exceeds {limit} bytes"))
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn get(client: &HttpClient, url: String) -> Response {
        client.send(client.request(Method::GET, url)).await.expect("response")
    }

    #[tokio::test]
    async fn feed_fetches_are_not_retried_by_default() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new().expect("http client");
        let response = get(&client, format!("{}/feed.ics", server.uri())).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn flaky_upstream_recovers_within_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.ics"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/feed.ics"))
            .respond_with(ResponseTemplate::new(200).set_body_string("BEGIN:VCALENDAR"))
            .mount(&server)
            .await;

        let client = HttpClient::builder()
            .max_attempts(2)
            .base_backoff(Duration::from_millis(5))
            .build()
            .expect("http client");
        let response = get(&client, format!("{}/feed.ics", server.uri())).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(client.read_text(response).await.unwrap(), "BEGIN:VCALENDAR");
    }

    #[tokio::test]
    async fn gone_feed_is_returned_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(410))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::builder().max_attempts(3).build().expect("http client");
        let response = get(&client, format!("{}/feed.ics", server.uri())).await;

        assert_eq!(response.status(), StatusCode::GONE);
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let client = HttpClient::new().expect("http client");
        let result = client.send(client.request(Method::GET, format!("http://{addr}/x.ics"))).await;

        assert!(matches!(result, Err(HearthError::Transport(_))), "got {result:?}");
    }

    #[tokio::test]
    async fn oversized_feed_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
            .mount(&server)
            .await;

        let client = HttpClient::builder().max_body_bytes(16).build().expect("http client");
        let response = get(&client, server.uri()).await;

        assert!(matches!(client.read_text(response).await, Err(HearthError::Transport(_))));
    }

    #[tokio::test]
    async fn non_utf8_feed_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xff, 0xfe, 0x00]))
            .mount(&server)
            .await;

        let client = HttpClient::new().expect("http client");
        let response = get(&client, server.uri()).await;

        assert!(matches!(client.read_text(response).await, Err(HearthError::Parse(_))));
    }
}

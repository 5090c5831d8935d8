//! HTTP probe client
//!
//! [`ProbeClient`] is the only way checks talk to the network. It resolves
//! paths against the target, applies the per-client rate limit, enforces the
//! request timeout and aborts promptly when the scan is cancelled. The wire
//! work itself sits behind the [`Transport`] trait; [`ReqwestTransport`] is
//! the production implementation.

use crate::ratelimit::RateLimiter;
use crate::ScanConfig;
use async_trait::async_trait;
use reqwest::{header, redirect, Client, Method};
use std::error::Error as StdError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;
use webprobe_core::{Error, ProbeError, Result, Target};

/// HTTP response wrapper
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers in received order (repeated names allowed)
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: String,
    /// Final URL (after redirects)
    pub final_url: String,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

impl HttpResponse {
    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response is redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    /// Get header value (case-insensitive, first occurrence)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values of a header (e.g. every `Set-Cookie`)
    pub fn header_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Lowercased content type, empty when absent
    pub fn content_type(&self) -> String {
        self.header("content-type")
            .map(|ct| ct.to_lowercase())
            .unwrap_or_default()
    }

    /// Images and opaque binary payloads
    pub fn is_binary(&self) -> bool {
        let ct = self.content_type();
        ct.starts_with("image/") || ct.contains("application/octet-stream")
    }

    /// At most `max` characters of the body, with an ellipsis if truncated
    pub fn body_preview(&self, max: usize) -> String {
        if self.body.chars().count() > max {
            let head: String = self.body.chars().take(max).collect();
            format!("{}...", head)
        } else {
            self.body.clone()
        }
    }
}

/// A fully resolved request handed to a transport
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    /// Overrides the configured redirect policy with "never follow"
    pub follow_redirects: bool,
}

impl ProbeRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
            follow_redirects: true,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn no_redirects(mut self) -> Self {
        self.follow_redirects = false;
        self
    }
}

/// Sends one request over the wire
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ProbeRequest) -> std::result::Result<HttpResponse, ProbeError>;
}

/// reqwest-backed transport honouring the scan's TLS, proxy and header settings
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    no_redirect_client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &ScanConfig) -> Result<Self> {
        let follow = if config.follow_redirects {
            redirect::Policy::limited(config.max_redirects as usize)
        } else {
            redirect::Policy::none()
        };

        Ok(Self {
            client: Self::build_client(config, follow)?,
            no_redirect_client: Self::build_client(config, redirect::Policy::none())?,
            timeout: config.timeout(),
        })
    }

    fn build_client(config: &ScanConfig, policy: redirect::Policy) -> Result<Client> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &config.custom_headers {
            let name = header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::InvalidConfig {
                    key: "custom_headers".into(),
                    message: e.to_string(),
                }
            })?;
            let value = header::HeaderValue::from_str(value).map_err(|e| Error::InvalidConfig {
                key: "custom_headers".into(),
                message: e.to_string(),
            })?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .connect_timeout(config.timeout().min(Duration::from_secs(10)))
            .redirect(policy)
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_tls);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| Error::InvalidConfig {
                key: "proxy".into(),
                message: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }

        builder
            .build()
            .map_err(|e| Error::Orchestrator(format!("failed to build HTTP client: {}", e)))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ProbeRequest) -> std::result::Result<HttpResponse, ProbeError> {
        let start = Instant::now();
        let url = request.url.to_string();

        let client = if request.follow_redirects {
            &self.client
        } else {
            &self.no_redirect_client
        };

        let mut builder = client.request(request.method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(&e, &url, self.timeout))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(&e, &url, self.timeout))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
            final_url,
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Classify a reqwest failure into the probe error taxonomy
fn map_reqwest_error(e: &reqwest::Error, url: &str, timeout: Duration) -> ProbeError {
    if e.is_timeout() {
        return ProbeError::Timeout {
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };
    }
    if e.is_builder() {
        return ProbeError::InvalidUrl(format!("{}: {}", url, e));
    }

    let chain = error_chain(e);
    let lowered = chain.to_lowercase();
    if lowered.contains("certificate") || lowered.contains("tls") || lowered.contains("handshake") {
        return ProbeError::Tls {
            url: url.to_string(),
            message: chain,
        };
    }
    if e.is_connect() {
        return ProbeError::ConnectionFailed {
            url: url.to_string(),
            message: chain,
        };
    }
    ProbeError::Request {
        url: url.to_string(),
        message: chain,
    }
}

fn error_chain(e: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![e.to_string()];
    let mut source = e.source();
    while let Some(s) = source {
        parts.push(s.to_string());
        source = s.source();
    }
    parts.join(": ")
}

/// Rate-limited, cancellable HTTP client shared by every check in a scan
pub struct ProbeClient {
    transport: Arc<dyn Transport>,
    target: Target,
    timeout: Duration,
    limiter: RateLimiter,
    cancel: CancellationToken,
    requests_sent: AtomicU64,
}

impl std::fmt::Debug for ProbeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeClient")
            .field("target", &self.target)
            .field("timeout", &self.timeout)
            .field("limiter", &self.limiter)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("requests_sent", &self.requests_sent())
            .finish()
    }
}

impl ProbeClient {
    /// Create a client backed by reqwest
    pub fn new(target: &Target, config: &ScanConfig, cancel: CancellationToken) -> Result<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(target, config, Arc::new(transport), cancel))
    }

    /// Create a client over an arbitrary transport
    pub fn with_transport(
        target: &Target,
        config: &ScanConfig,
        transport: Arc<dyn Transport>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            target: target.clone(),
            timeout: config.timeout(),
            limiter: RateLimiter::new(config.delay()),
            cancel,
            requests_sent: AtomicU64::new(0),
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Number of requests handed to the transport so far
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent.load(Ordering::Relaxed)
    }

    /// Resolve a path relative to the target, or accept an absolute URL
    pub fn resolve(&self, path_or_url: &str) -> std::result::Result<Url, ProbeError> {
        if path_or_url.contains("://") {
            let url = Url::parse(path_or_url)
                .map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", path_or_url, e)))?;
            return match url.scheme() {
                "http" | "https" => Ok(url),
                other => Err(ProbeError::InvalidUrl(format!("unsupported scheme '{}'", other))),
            };
        }
        self.target
            .join(path_or_url)
            .map_err(|e| ProbeError::InvalidUrl(format!("{}: {}", path_or_url, e)))
    }

    /// Issue a request.
    ///
    /// `path_or_url` is either a path relative to the target or an absolute
    /// URL. No retries are attempted.
    pub async fn send(
        &self,
        method: Method,
        path_or_url: &str,
        headers: &[(String, String)],
        body: Option<&str>,
    ) -> std::result::Result<HttpResponse, ProbeError> {
        let url = self.resolve(path_or_url)?;
        let mut request = ProbeRequest::new(method, url);
        request.headers = headers.to_vec();
        request.body = body.map(str::to_string);
        self.execute(request).await
    }

    /// Issue a prepared request through the limiter, timeout and cancellation
    pub async fn execute(&self, request: ProbeRequest) -> std::result::Result<HttpResponse, ProbeError> {
        self.limiter.acquire(&self.cancel).await?;

        let url = request.url.to_string();
        debug!("{} {}", request.method, url);
        self.requests_sent.fetch_add(1, Ordering::Relaxed);

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Err(ProbeError::Cancelled),
            sent = tokio::time::timeout(self.timeout, self.transport.send(request)) => match sent {
                Ok(result) => result,
                Err(_) => Err(ProbeError::Timeout {
                    url: url.clone(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }),
            },
        };

        self.limiter.complete();
        if let Err(e) = &outcome {
            debug!("{} failed: {}", url, e);
        }
        outcome
    }

    /// Perform a GET request
    pub async fn get(&self, path_or_url: &str) -> std::result::Result<HttpResponse, ProbeError> {
        self.send(Method::GET, path_or_url, &[], None).await
    }

    /// Perform a HEAD request
    pub async fn head(&self, path_or_url: &str) -> std::result::Result<HttpResponse, ProbeError> {
        self.send(Method::HEAD, path_or_url, &[], None).await
    }

    /// Perform a request with a method given by name (e.g. "TRACE")
    pub async fn request(&self, method: &str, path_or_url: &str) -> std::result::Result<HttpResponse, ProbeError> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| ProbeError::InvalidUrl(format!("invalid method '{}'", method)))?;
        self.send(method, path_or_url, &[], None).await
    }

    /// GET without following redirects
    pub async fn get_no_redirect(&self, path_or_url: &str) -> std::result::Result<HttpResponse, ProbeError> {
        let url = self.resolve(path_or_url)?;
        self.execute(ProbeRequest::new(Method::GET, url).no_redirects())
            .await
    }

    /// Check if the target answers at all
    pub async fn is_reachable(&self) -> std::result::Result<(), ProbeError> {
        let base = self.target.base();
        self.get(&base).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn target() -> Target {
        Target::parse("http://example.com/app").unwrap()
    }

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse {
            status: 200,
            headers: vec![
                ("Content-Type".to_string(), "image/png".to_string()),
                ("set-cookie".to_string(), "a=1".to_string()),
                ("Set-Cookie".to_string(), "b=2".to_string()),
            ],
            body: "abcdef".to_string(),
            final_url: "https://example.com".to_string(),
            response_time_ms: 100,
        };

        assert!(response.is_success());
        assert!(!response.is_redirect());
        assert!(response.is_binary());
        assert_eq!(response.header("content-type"), Some("image/png"));
        assert_eq!(response.header_all("set-cookie").count(), 2);
        assert_eq!(response.body_preview(3), "abc...");
        assert_eq!(response.body_preview(10), "abcdef");
    }

    #[test]
    fn test_resolve() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = ProbeClient::with_transport(
            &target(),
            &ScanConfig::default(),
            transport,
            CancellationToken::new(),
        );

        assert_eq!(client.resolve("/x").unwrap().as_str(), "http://example.com/x");
        assert_eq!(client.resolve("y").unwrap().as_str(), "http://example.com/app/y");
        assert_eq!(
            client.resolve("https://other.test/z").unwrap().as_str(),
            "https://other.test/z"
        );
        assert!(matches!(
            client.resolve("ftp://other.test/"),
            Err(ProbeError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limit_spacing() {
        let transport = Arc::new(ScriptedTransport::new());
        let config = ScanConfig::default().with_delay_ms(50);
        let client = ProbeClient::with_transport(&target(), &config, transport.clone(), CancellationToken::new());

        let start = std::time::Instant::now();
        for i in 0..5 {
            client.get(&format!("/p{}", i)).await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_millis(200));
        assert_eq!(client.requests_sent(), 5);
        assert_eq!(transport.request_count(), 5);
    }

    #[tokio::test]
    async fn test_timeout_from_slow_transport() {
        let transport = Arc::new(ScriptedTransport::new().latency(Duration::from_secs(5)));
        let config = ScanConfig::default().with_delay_ms(0).with_timeout_ms(50);
        let client = ProbeClient::with_transport(&target(), &config, transport, CancellationToken::new());

        let err = client.get("/").await.unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_in_flight_request() {
        let transport = Arc::new(ScriptedTransport::new().latency(Duration::from_secs(30)));
        let cancel = CancellationToken::new();
        let config = ScanConfig::default().with_delay_ms(0);
        let client = Arc::new(ProbeClient::with_transport(&target(), &config, transport, cancel.clone()));

        let pending = {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get("/").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.unwrap_err(), ProbeError::Cancelled);

        // nothing further is sent once cancelled
        assert_eq!(client.get("/").await.unwrap_err(), ProbeError::Cancelled);
    }

    #[tokio::test]
    async fn test_reqwest_transport_against_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let body = "hello";
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nX-Frame-Options: DENY\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let target = Target::parse(&format!("http://{}", addr)).unwrap();
        let config = ScanConfig::default().with_delay_ms(0).with_timeout_ms(5_000);
        let client = ProbeClient::new(&target, &config, CancellationToken::new()).unwrap();

        let response = client.get("/").await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "hello");
        assert_eq!(response.header("x-frame-options"), Some("DENY"));
        assert_eq!(response.header_all("set-cookie").count(), 2);
    }

    #[tokio::test]
    async fn test_reqwest_timeout_is_classified() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // accept and never answer
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let target = Target::parse(&format!("http://{}", addr)).unwrap();
        let config = ScanConfig::default().with_delay_ms(0).with_timeout_ms(200);
        let client = ProbeClient::new(&target, &config, CancellationToken::new()).unwrap();

        let err = client.get("/").await.unwrap_err();
        assert!(matches!(err, ProbeError::Timeout { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_connection_refused_is_classified() {
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let target = Target::parse(&format!("http://{}", addr)).unwrap();
        let config = ScanConfig::default().with_delay_ms(0).with_timeout_ms(2_000);
        let client = ProbeClient::new(&target, &config, CancellationToken::new()).unwrap();

        let err = client.get("/").await.unwrap_err();
        assert!(matches!(err, ProbeError::ConnectionFailed { .. }), "got {:?}", err);
        assert!(err.is_unreachable());
    }
}

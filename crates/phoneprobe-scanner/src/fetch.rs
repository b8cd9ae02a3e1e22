//! Proxy-first fetching with a direct fallback.
//!
//! [`FetchStrategy::fetch`] never fails: every transport error, bad status or
//! non-image response collapses into `succeeded = false`. The network itself
//! sits behind [`HttpTransport`] so tests can script responses.

use crate::error::{Result, ScanError};
use crate::fingerprint::{Picker, RandomPicker, UserAgentPool};
use async_trait::async_trait;
use phoneprobe_core::{AppConfig, FetchRoute, ProxyConfig, ScanningConfig};
use reqwest::{header, Client, Proxy};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const ACCEPT_IMAGES: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// A single GET request handed to the transport.
#[derive(Debug, Clone)]
pub struct HttpRequest<'a> {
    /// Target URL
    pub url: &'a str,
    /// Header name/value pairs sent with the request
    pub headers: Vec<(&'static str, String)>,
    /// Whole-request timeout
    pub timeout: Duration,
    /// `None` means a direct connection
    pub proxy: Option<&'a ProxyConfig>,
}

/// Status, content type and body of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw `Content-Type` header, if present
    pub content_type: Option<String>,
    /// Full response body
    pub body: Vec<u8>,
}

/// Why a GET produced no response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request exceeded its timeout
    #[error("request timed out")]
    Timeout,

    /// The connection (to the proxy or the host) could not be opened
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other request or body read failure
    #[error("request failed: {0}")]
    Request(String),

    /// The request named a proxy the transport was not built with
    #[error("no client configured for proxy {0}")]
    UnknownProxy(String),
}

/// HTTP GET capability, optionally through a proxy.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one GET with the given headers, timeout and proxy.
    async fn get(&self, request: HttpRequest<'_>) -> std::result::Result<HttpResponse, TransportError>;
}

/// `reqwest` transport with one pre-built client per distinct proxy entry.
pub struct ReqwestTransport {
    direct: Client,
    /// Keyed by the full entry, credentials included
    proxied: HashMap<ProxyConfig, Client>,
}

impl ReqwestTransport {
    /// Build a direct client plus one client per entry of `proxies`.
    pub fn new(proxies: &[ProxyConfig]) -> Result<Self> {
        let direct = Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| ScanError::Transport(format!("direct client: {e}")))?;

        let mut proxied = HashMap::new();
        for proxy in proxies {
            let mut reqwest_proxy = Proxy::all(proxy.url())
                .map_err(|e| ScanError::Transport(format!("proxy {}: {e}", proxy.url())))?;
            if proxy.has_credentials() {
                reqwest_proxy = reqwest_proxy.basic_auth(&proxy.username, &proxy.password);
            }

            let client = Client::builder()
                .proxy(reqwest_proxy)
                .build()
                .map_err(|e| ScanError::Transport(format!("proxy {}: {e}", proxy.url())))?;
            proxied.insert(proxy.clone(), client);
        }

        Ok(Self { direct, proxied })
    }
}

fn classify(err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest<'_>) -> std::result::Result<HttpResponse, TransportError> {
        let client = match request.proxy {
            Some(proxy) => self
                .proxied
                .get(proxy)
                .ok_or_else(|| TransportError::UnknownProxy(proxy.url()))?,
            None => &self.direct,
        };

        let mut builder = client.get(request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.send().await.map_err(|e| classify(&e))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(|e| classify(&e))?.to_vec();

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

/// Uniform result of one endpoint fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Whether the endpoint served an acceptable response
    pub succeeded: bool,
    /// Content type of the accepted response
    pub content_type: Option<String>,
    /// Body size of the accepted response
    pub byte_size: Option<u64>,
    /// Which attempt succeeded, `Unreachable` on failure
    pub route: FetchRoute,
}

impl FetchOutcome {
    fn failed() -> Self {
        Self {
            succeeded: false,
            content_type: None,
            byte_size: None,
            route: FetchRoute::Unreachable,
        }
    }

    fn from_response(response: HttpResponse, route: FetchRoute) -> Self {
        Self {
            succeeded: true,
            content_type: response.content_type,
            byte_size: Some(u64::try_from(response.body.len()).unwrap_or(u64::MAX)),
            route,
        }
    }
}

/// Timeouts and acceptance rules for [`FetchStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchSettings {
    /// Timeout of the proxied attempt
    pub proxy_timeout: Duration,
    /// Timeout of the direct fallback
    pub direct_timeout: Duration,
    /// Apply the proxied `200 + image/*` rule to the direct fallback as well
    pub verify_direct_content_type: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::from(&ScanningConfig::default())
    }
}

impl From<&ScanningConfig> for FetchSettings {
    fn from(config: &ScanningConfig) -> Self {
        Self {
            proxy_timeout: config.proxy_timeout(),
            direct_timeout: config.direct_timeout(),
            verify_direct_content_type: config.verify_direct_content_type,
        }
    }
}

fn is_image(response: &HttpResponse) -> bool {
    response.status == 200
        && response
            .content_type
            .as_deref()
            .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("image/"))
}

/// Proxy-first, direct-fallback fetcher over immutable proxy and UA pools.
pub struct FetchStrategy {
    transport: Arc<dyn HttpTransport>,
    proxies: Vec<ProxyConfig>,
    user_agents: UserAgentPool,
    picker: Arc<dyn Picker>,
    settings: FetchSettings,
}

impl FetchStrategy {
    /// Create a strategy with the built-in User-Agent pool and a random picker.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        proxies: Vec<ProxyConfig>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            transport,
            proxies,
            user_agents: UserAgentPool::default(),
            picker: Arc::new(RandomPicker),
            settings,
        }
    }

    /// Build a strategy with a `reqwest` transport from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.proxies)?;
        Ok(Self::new(
            Arc::new(transport),
            config.proxies.clone(),
            FetchSettings::from(&config.scanning),
        )
        .with_user_agents(UserAgentPool::new(config.user_agents.clone())))
    }

    /// Replace the random picker, e.g. with a deterministic one in tests.
    #[must_use]
    pub fn with_picker(mut self, picker: Arc<dyn Picker>) -> Self {
        self.picker = picker;
        self
    }

    /// Replace the User-Agent pool.
    #[must_use]
    pub fn with_user_agents(mut self, user_agents: UserAgentPool) -> Self {
        self.user_agents = user_agents;
        self
    }

    /// Fetch `url` through a random proxy, falling back to a direct request.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        if let Some(outcome) = self.fetch_via_proxy(url).await {
            return outcome;
        }
        self.fetch_direct(url).await
    }

    async fn fetch_via_proxy(&self, url: &str) -> Option<FetchOutcome> {
        if self.proxies.is_empty() {
            return None;
        }

        let proxy = &self.proxies[self.picker.pick(self.proxies.len())];
        let request = HttpRequest {
            url,
            headers: self.request_headers(),
            timeout: self.settings.proxy_timeout,
            proxy: Some(proxy),
        };

        match self.transport.get(request).await {
            Ok(response) if is_image(&response) => {
                tracing::debug!("Proxy {} fetched {} ({} bytes)", proxy.url(), url, response.body.len());
                Some(FetchOutcome::from_response(response, FetchRoute::Proxy))
            }
            Ok(response) => {
                tracing::debug!(
                    "Proxy {} got HTTP {} ({:?}) for {}, falling back to direct",
                    proxy.url(),
                    response.status,
                    response.content_type,
                    url
                );
                None
            }
            Err(e) => {
                tracing::warn!("Proxy {} failed for {}: {}, falling back to direct", proxy.url(), url, e);
                None
            }
        }
    }

    async fn fetch_direct(&self, url: &str) -> FetchOutcome {
        let request = HttpRequest {
            url,
            headers: self.request_headers(),
            timeout: self.settings.direct_timeout,
            proxy: None,
        };

        match self.transport.get(request).await {
            Ok(response) => {
                let accepted = if self.settings.verify_direct_content_type {
                    is_image(&response)
                } else {
                    (200..300).contains(&response.status)
                };

                if accepted {
                    tracing::debug!("Direct fetch of {} succeeded", url);
                    FetchOutcome::from_response(response, FetchRoute::Direct)
                } else {
                    tracing::debug!(
                        "Direct fetch of {} rejected: HTTP {} ({:?})",
                        url,
                        response.status,
                        response.content_type
                    );
                    FetchOutcome::failed()
                }
            }
            Err(e) => {
                tracing::debug!("Direct fetch of {} failed: {}", url, e);
                FetchOutcome::failed()
            }
        }
    }

    fn request_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("user-agent", self.user_agents.choose(self.picker.as_ref()).to_string()),
            ("accept", ACCEPT_IMAGES.to_string()),
            ("cache-control", "no-cache, no-store".to_string()),
            ("pragma", "no-cache".to_string()),
        ]
    }
}

use crate::config::service_config::ServiceConfig;
use crate::core::ssrf::SsrfGuard;
use crate::domain::model::{FetchedResource, SafeUrl};
use crate::domain::ports::ImageSource;
use crate::utils::error::{DocError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{redirect, Client};
use std::sync::Arc;
use std::time::Duration;

/// Bounded GET for remote images. Every failure surfaces as `DocError::FetchError`.
pub struct ResourceFetcher {
    client: Client,
    guard: SsrfGuard,
    max_bytes: usize,
    timeout: Duration,
}

impl ResourceFetcher {
    pub fn new(config: Arc<ServiceConfig>) -> Result<Self> {
        let timeout = Duration::from_millis(config.limits.fetch_timeout_ms);
        // Redirects are not followed: a 3xx could point past the guard.
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(concat!("docstamp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DocError::ConfigError {
                message: format!("cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            guard: SsrfGuard::new(Arc::new(config.ssrf.clone())),
            max_bytes: config.limits.max_fetch_bytes,
            timeout,
        })
    }

    pub fn guard(&self) -> &SsrfGuard {
        &self.guard
    }

    pub async fn fetch(&self, url: &SafeUrl) -> Result<FetchedResource> {
        tracing::debug!("Fetching image from: {}", url.as_str());

        // The client timeout covers the body too, but the outer bound keeps a
        // trickling server from holding the request past the budget.
        match tokio::time::timeout(self.timeout, self.download(url)).await {
            Ok(result) => result,
            Err(_) => Err(DocError::fetch(format!(
                "timed out after {} ms",
                self.timeout.as_millis()
            ))),
        }
    }

    async fn download(&self, url: &SafeUrl) -> Result<FetchedResource> {
        let mut response = self
            .client
            .get(url.as_url().clone())
            .send()
            .await
            .map_err(|e| DocError::fetch(describe(&e)))?;

        let status = response.status();
        tracing::debug!("Image response status: {}", status);
        if !status.is_success() {
            return Err(DocError::fetch(format!("server answered {}", status)));
        }

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes as u64 {
                return Err(DocError::fetch(format!(
                    "declared size {} exceeds limit of {} bytes",
                    declared, self.max_bytes
                )));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DocError::fetch(describe(&e)))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(DocError::fetch(format!(
                    "body exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::info!(
            bytes = bytes.len(),
            content_type = content_type.as_deref().unwrap_or("unknown"),
            "📥 Downloaded image"
        );

        Ok(FetchedResource {
            bytes,
            content_type,
            source_url: url.as_str().to_string(),
        })
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

#[async_trait]
impl ImageSource for ResourceFetcher {
    async fn fetch_image(&self, url: &str) -> Result<FetchedResource> {
        let safe = self.guard.validate(url)?;
        self.fetch(&safe).await
    }
}

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
}

#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url` and return the whole body. An empty or missing referer omits the header.
    async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<Bytes, FetchError>;

    async fn fetch_text(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError> {
        let body = self.fetch(url, referer).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

/// reqwest-backed fetcher that always sends the configured user agent and the site origin.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, origin: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_str(user_agent)?);
        headers.insert(header::ORIGIN, HeaderValue::from_str(origin)?);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { client })
    }

    /// Performs the request and also reports the final URL after redirects.
    pub async fn fetch_with_url(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<(String, Bytes), FetchError> {
        let mut request = self.client.get(url);
        if let Some(referer) = referer.filter(|r| !r.is_empty()) {
            request = request.header(header::REFERER, referer);
        }

        debug!("GET {} (referer: {:?})", url, referer);

        let response = request.send().await.map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let final_url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        Ok((final_url, body))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<Bytes, FetchError> {
        let (_, body) = self.fetch_with_url(url, referer).await?;
        Ok(body)
    }
}

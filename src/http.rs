//! `HttpFetch` over reqwest.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::config::SearchConfig;
use crate::error::FetchError;
use crate::suggest::HttpFetch;

#[derive(Debug, Clone)]
pub struct ReqwestFetch {
    client: Client,
}

impl ReqwestFetch {
    /// The timeout policy lives in the fan-out, not in the client.
    pub fn new(config: &SearchConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder();
        if !config.user_agent.is_empty() {
            builder = builder.user_agent(config.user_agent.clone());
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl HttpFetch for ReqwestFetch {
    async fn get(&self, url: &str) -> Result<String, FetchError> {
        let url = Url::parse(url)?;
        debug!(host = url.host_str().unwrap_or(""), "GET suggestions");
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

//! HTTP client utilities.

use reqwest::Client;
use std::sync::Arc;
use url::Url;

use super::retry::{with_retry, RetryConfig};
use crate::config::HttpSettings;
use crate::sources::SourceError;

/// Shared HTTP client carrying the identifying user agent and retry policy
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    retry: RetryConfig,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_settings(&HttpSettings::default())
    }

    /// Create a new HTTP client from configuration
    pub fn with_settings(settings: &HttpSettings) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout())
            .connect_timeout(settings.connect_timeout())
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            retry: settings.retry_config(),
        })
    }

    /// GET `url` and return the body as text.
    ///
    /// Transient failures are retried per the client's [`RetryConfig`]; any
    /// other non-2xx status fails immediately.
    pub async fn get_text(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> Result<String, SourceError> {
        tracing::debug!(%url, "GET");

        with_retry(self.retry, || {
            let client = Arc::clone(&self.client);
            let url = url.clone();
            async move {
                let mut request = client.get(url.clone());
                for (name, value) in headers {
                    request = request.header(*name, *value);
                }

                let response = request.send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(SourceError::Http {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                Ok(response.text().await?)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_client() -> HttpClient {
        let settings = HttpSettings {
            retry_base_delay_ms: 5,
            ..Default::default()
        };
        HttpClient::with_settings(&settings).unwrap()
    }

    #[tokio::test]
    async fn test_get_text_sends_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/page")
            .match_header("user-agent", crate::config::DEFAULT_USER_AGENT)
            .with_body("hello")
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/page", server.url())).unwrap();
        let body = fast_client().get_text(&url, &[]).await.unwrap();

        assert_eq!(body, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_text_retries_server_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flaky")
            .with_status(502)
            .expect(3)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/flaky", server.url())).unwrap();
        let result = fast_client().get_text(&url, &[]).await;

        assert!(matches!(result, Err(SourceError::Http { status: 502, .. })));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_text_does_not_retry_client_errors() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let url = Url::parse(&format!("{}/missing", server.url())).unwrap();
        let result = fast_client().get_text(&url, &[]).await;

        assert!(matches!(result, Err(SourceError::Http { status: 404, .. })));
        mock.assert_async().await;
    }
}

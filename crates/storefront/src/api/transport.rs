//! `reqwest`-backed transport.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{GraphQLError, GraphQLRequest, GraphQLResponse, Transport};
use crate::config::ApiConfig;
use crate::error::{Result, SyncError};

/// GraphQL transport over HTTPS.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<HttpTransportInner>,
}

struct HttpTransportInner {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Build a transport for the configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Network` if the HTTP client cannot be constructed.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("storefront-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpTransportInner {
                client,
                endpoint: config.endpoint.clone(),
            }),
        })
    }

    /// Configured GraphQL endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.inner.endpoint
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.inner.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl Transport for HttpTransport {
    #[instrument(skip(self, request, token), fields(operation = %request.operation_name))]
    async fn send(
        &self,
        request: &GraphQLRequest,
        token: Option<&SecretString>,
    ) -> Result<GraphQLResponse> {
        let mut builder = self
            .inner
            .client
            .post(self.inner.endpoint.clone())
            .header("Content-Type", "application/json")
            .json(request);

        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token.expose_secret()));
        }

        let response = builder.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            warn!(retry_after, "Rate limited by storefront API");
            return Err(SyncError::Network(format!(
                "Rate limited, retry after {retry_after} seconds"
            )));
        }

        let body = response.text().await?;

        // Servers often send GraphQL errors with a non-2xx status; prefer the body.
        match serde_json::from_str::<GraphQLResponse>(&body) {
            Ok(parsed) if parsed.data.is_some() || parsed.errors.is_some() => {
                debug!(%status, "GraphQL response received");
                Ok(parsed)
            }
            _ if status == reqwest::StatusCode::UNAUTHORIZED => {
                Ok(GraphQLResponse::from_errors(vec![GraphQLError::with_code(
                    "Unauthorized",
                    "UNAUTHENTICATED",
                )]))
            }
            _ if !status.is_success() => Err(SyncError::Network(format!("HTTP {status}"))),
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(SyncError::Decode(e.to_string())),
        }
    }
}

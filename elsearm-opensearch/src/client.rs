//! OpenSearch transport implementation.

use crate::{
    config::{OpenSearchConfig, TlsConfig},
    error::{OpenSearchError, Result},
};
use async_trait::async_trait;
use elsearm_core::{Method, Transport, TransportRequest, TransportResponse};
use opensearch::{
    OpenSearch,
    http::{
        headers::{CONTENT_TYPE, HeaderMap, HeaderValue},
        transport::{SingleNodeConnectionPool, TransportBuilder},
    },
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// [`Transport`] over the `opensearch` client.
#[derive(Clone)]
pub struct OpenSearchTransport {
    client: Arc<OpenSearch>,
    config: Arc<OpenSearchConfig>,
}

impl OpenSearchTransport {
    /// Create a new OpenSearch transport.
    pub fn new(config: OpenSearchConfig) -> Result<Self> {
        info!("Initializing OpenSearch transport for: {:?}", config.urls);

        let url = config
            .urls
            .first()
            .ok_or_else(|| OpenSearchError::Validation("No URLs provided".to_string()))?;

        let url = opensearch::http::Url::parse(url)
            .map_err(|e| OpenSearchError::Validation(format!("Invalid URL: {}", e)))?;

        let conn_pool = SingleNodeConnectionPool::new(url);
        let mut builder = TransportBuilder::new(conn_pool).timeout(config.request_timeout);

        if config.disable_proxy {
            builder = builder.disable_proxy();
        }

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder =
                builder.auth(opensearch::auth::Credentials::Basic(user.clone(), pass.clone()));
        }

        if let Some(tls) = &config.tls {
            builder = configure_tls(builder, tls)?;
        }

        let transport = builder
            .build()
            .map_err(|e| OpenSearchError::Connection(e.to_string()))?;

        debug!("OpenSearch transport initialized");

        Ok(Self {
            client: Arc::new(OpenSearch::new(transport)),
            config: Arc::new(config),
        })
    }

    /// Get the underlying OpenSearch client.
    pub fn inner(&self) -> &OpenSearch {
        &self.client
    }

    /// Get the configuration.
    pub fn config(&self) -> &OpenSearchConfig {
        &self.config
    }
}

#[cfg(any(feature = "rustls", feature = "native-tls"))]
fn configure_tls(builder: TransportBuilder, tls: &TlsConfig) -> Result<TransportBuilder> {
    use opensearch::cert::{Certificate, CertificateValidation};

    if tls.danger_accept_invalid_certs {
        warn!("Certificate validation is disabled");
        return Ok(builder.cert_validation(CertificateValidation::None));
    }
    match &tls.ca_cert {
        Some(path) => {
            let pem = std::fs::read(path)?;
            let cert = Certificate::from_pem(&pem)?;
            Ok(builder.cert_validation(CertificateValidation::Full(cert)))
        }
        None => Ok(builder),
    }
}

#[cfg(not(any(feature = "rustls", feature = "native-tls")))]
fn configure_tls(builder: TransportBuilder, _tls: &TlsConfig) -> Result<TransportBuilder> {
    warn!("TLS configuration ignored: no TLS backend enabled");
    Ok(builder)
}

fn method(method: Method) -> opensearch::http::Method {
    match method {
        Method::Get => opensearch::http::Method::Get,
        Method::Head => opensearch::http::Method::Head,
        Method::Post => opensearch::http::Method::Post,
        Method::Put => opensearch::http::Method::Put,
        Method::Delete => opensearch::http::Method::Delete,
    }
}

#[async_trait]
impl Transport for OpenSearchTransport {
    async fn execute(&self, request: TransportRequest) -> elsearm_core::Result<TransportResponse> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(request.content_type.as_str()),
        );
        let params = (!request.params.is_empty()).then_some(&request.params);

        let mut attempt = 0;
        loop {
            let sent = self
                .client
                .send(
                    method(request.method),
                    &request.path,
                    headers.clone(),
                    params,
                    request.body.clone(),
                    None,
                )
                .await;

            match sent {
                Ok(response) => {
                    let status = response.status_code().as_u16();
                    let body = response.text().await.map_err(elsearm_core::Error::transport)?;
                    debug!(
                        "{} {} -> {}",
                        request.method.as_str(),
                        request.path,
                        status
                    );
                    return Ok(TransportResponse::new(status, body));
                }
                Err(err) if attempt < self.config.max_retries && request.is_idempotent() => {
                    let delay = self.config.retry_backoff * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        "{} {} failed ({}), retry {}/{} in {:?}",
                        request.method.as_str(),
                        request.path,
                        err,
                        attempt,
                        self.config.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(elsearm_core::Error::transport(err)),
            }
        }
    }
}

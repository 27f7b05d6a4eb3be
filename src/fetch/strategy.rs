use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, SignatureScheme};
use serde_json::Value;
use thiserror::Error;

/// Upper bound on the duration of a single fetch attempt. Every strategy
/// enforces the same limit; none of them retries internally.
pub const STRATEGY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("TLS configuration failed: {0}")]
    TlsConfig(#[from] rustls::Error),

    #[error("system trust bundle not available: {0}")]
    BundleUnavailable(String),
}

/// One concrete way to perform a GET request against one URL, differing
/// only in how transport-layer certificate validation is configured.
/// Strategies must be Send + Sync so a client holding them can be shared
/// across concurrently dispatched operations.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Identifying name surfaced as `method_used` on success.
    fn name(&self) -> &'static str;

    /// Perform exactly one GET against `url` and parse the body as JSON.
    /// Transport failures and non-2xx statuses both come back as errors.
    async fn attempt(&self, url: &str, headers: &HeaderMap) -> Result<Value, StrategyError>;
}

async fn get_json(client: Client, url: &str, headers: &HeaderMap) -> Result<Value, StrategyError> {
    let response = client
        .get(url)
        .headers(headers.clone())
        .timeout(STRATEGY_TIMEOUT)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.json().await?)
}

/// Standard certificate verification with the stock client.
pub struct DefaultTls;

#[async_trait]
impl FetchStrategy for DefaultTls {
    fn name(&self) -> &'static str {
        "default_tls"
    }

    async fn attempt(&self, url: &str, headers: &HeaderMap) -> Result<Value, StrategyError> {
        let client = Client::builder().build()?;
        get_json(client, url, headers).await
    }
}

/// Certificate verification turned off entirely.
pub struct DisabledVerification;

#[async_trait]
impl FetchStrategy for DisabledVerification {
    fn name(&self) -> &'static str {
        "disabled_verification"
    }

    async fn attempt(&self, url: &str, headers: &HeaderMap) -> Result<Value, StrategyError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        get_json(client, url, headers).await
    }
}

/// Hand-built rustls client config whose verifier skips both hostname
/// checking and chain validation.
pub struct CustomTlsContext;

impl CustomTlsContext {
    fn tls_config() -> Result<rustls::ClientConfig, rustls::Error> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let config = rustls::ClientConfig::builder_with_provider(provider.clone())
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert { provider }))
            .with_no_client_auth();
        Ok(config)
    }
}

#[async_trait]
impl FetchStrategy for CustomTlsContext {
    fn name(&self) -> &'static str {
        "custom_tls_context"
    }

    async fn attempt(&self, url: &str, headers: &HeaderMap) -> Result<Value, StrategyError> {
        let client = Client::builder()
            .use_preconfigured_tls(Self::tls_config()?)
            .build()?;
        get_json(client, url, headers).await
    }
}

/// Certificate verifier that accepts every server certificate. Signature
/// checks still run so the handshake itself stays well-formed.
#[derive(Debug)]
struct AcceptAnyServerCert {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Verification against the platform trust bundle instead of the built-in
/// roots. If the bundle cannot be loaded or is empty, the attempt fails
/// with a distinguishable "bundle not available" error.
pub struct SystemTrustBundle;

#[async_trait]
impl FetchStrategy for SystemTrustBundle {
    fn name(&self) -> &'static str {
        "system_trust_bundle"
    }

    async fn attempt(&self, url: &str, headers: &HeaderMap) -> Result<Value, StrategyError> {
        let certs = rustls_native_certs::load_native_certs()
            .map_err(|e| StrategyError::BundleUnavailable(e.to_string()))?;
        if certs.is_empty() {
            return Err(StrategyError::BundleUnavailable(
                "platform trust store yielded no certificates".to_string(),
            ));
        }

        let mut builder = Client::builder().tls_built_in_root_certs(false);
        for cert in certs {
            builder = builder.add_root_certificate(reqwest::Certificate::from_der(cert.as_ref())?);
        }
        let client = builder.build()?;
        get_json(client, url, headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_strategy_names() {
        assert_eq!(DefaultTls.name(), "default_tls");
        assert_eq!(DisabledVerification.name(), "disabled_verification");
        assert_eq!(CustomTlsContext.name(), "custom_tls_context");
        assert_eq!(SystemTrustBundle.name(), "system_trust_bundle");
    }

    #[test]
    fn test_custom_tls_config_builds() {
        CustomTlsContext::tls_config().unwrap();
    }

    #[test]
    fn test_bundle_unavailable_message_is_distinguishable() {
        let err = StrategyError::BundleUnavailable("no bundle".to_string());
        assert!(err.to_string().contains("system trust bundle not available"));
    }

    #[tokio::test]
    async fn test_default_tls_returns_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .and(header("x-probe", "yes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-probe", "yes".parse().unwrap());

        let url = format!("{}/data", server.uri());
        let payload = DefaultTls.attempt(&url, &headers).await.unwrap();
        assert_eq!(payload["ok"], json!(true));
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let url = format!("{}/data", server.uri());
        let result = DefaultTls.attempt(&url, &HeaderMap::new()).await;
        assert!(matches!(result, Err(StrategyError::Request(_))));
    }

    #[tokio::test]
    async fn test_disabled_verification_works_over_plain_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"n": 1})))
            .mount(&server)
            .await;

        let url = format!("{}/data", server.uri());
        let payload = DisabledVerification
            .attempt(&url, &HeaderMap::new())
            .await
            .unwrap();
        assert_eq!(payload["n"], json!(1));
    }
}

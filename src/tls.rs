//! HTTP client construction for CA endpoints.
//!
//! CMP messages carry their own protection, so TLS is optional here: plain
//! `http://` URLs are accepted, and for `https://` URLs the trust anchors and
//! client identity from [`CmpClientConfig`] apply.

use crate::config::{ClientIdentity, CmpClientConfig, TrustAnchors};
use crate::error::{CmpError, Result};

/// Build a reqwest Client with the configured TLS settings and headers.
///
/// The request timeout is enforced by the transport, not by this client.
pub fn build_http_client(config: &CmpClientConfig) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(crate::USER_AGENT);

    match &config.trust_anchors {
        TrustAnchors::WebPki => {
            builder = builder.tls_built_in_root_certs(true);
        }
        TrustAnchors::Explicit(ca_certs) => {
            builder = builder.tls_built_in_root_certs(false);
            for ca_pem in ca_certs {
                let cert = reqwest::Certificate::from_pem(ca_pem)
                    .map_err(|e| CmpError::tls(format!("Failed to parse CA certificate: {}", e)))?;
                builder = builder.add_root_certificate(cert);
            }
        }
        TrustAnchors::InsecureAcceptAny => {
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder
                .tls_built_in_root_certs(false)
                .danger_accept_invalid_certs(true);
        }
    }

    if let Some(ref identity) = config.client_identity {
        builder = builder.identity(build_reqwest_identity(identity)?);
    }

    builder = builder.min_tls_version(reqwest::tls::Version::TLS_1_2);

    let mut headers = reqwest::header::HeaderMap::new();
    for (name, value) in &config.additional_headers {
        match (
            reqwest::header::HeaderName::try_from(name.as_str()),
            reqwest::header::HeaderValue::try_from(value.as_str()),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => {
                return Err(CmpError::config(format!("Invalid HTTP header '{}'", name)));
            }
        }
    }
    builder = builder.default_headers(headers);

    builder
        .build()
        .map_err(|e| CmpError::tls(format!("Failed to build HTTP client: {}", e)))
}

/// Build a reqwest Identity from PEM-encoded certificate and key.
fn build_reqwest_identity(identity: &ClientIdentity) -> Result<reqwest::Identity> {
    let mut pem_data = identity.cert_pem.clone();
    pem_data.extend_from_slice(b"\n");
    pem_data.extend_from_slice(&identity.key_pem);

    reqwest::Identity::from_pem(&pem_data)
        .map_err(|e| CmpError::tls(format!("Failed to create client identity: {}", e)))
}

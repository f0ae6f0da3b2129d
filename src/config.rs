// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 U.S. Federal Government (in countries where recognized)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration types for the CMPv2 client.
//!
//! Two kinds of configuration live here:
//!
//! - [`CmpClientConfig`]: how the client talks HTTP (timeout, TLS trust,
//!   client identity) and which CA certificates it accepts as signers of
//!   signature-protected responses.
//! - [`Cmpv2Server`]: one CA target record, resolved by the caller from its
//!   CA registry before any protocol work starts.

use std::str::FromStr;
use std::time::Duration;

use url::Url;
use x509_cert::name::Name;
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::error::{CmpError, Result};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a CMPv2 client.
#[derive(Clone)]
pub struct CmpClientConfig {
    /// Request timeout duration.
    pub timeout: Duration,

    /// Trust anchor configuration for the CA's TLS certificate.
    pub trust_anchors: TrustAnchors,

    /// Client identity for TLS client certificate authentication.
    pub client_identity: Option<ClientIdentity>,

    /// Additional HTTP headers to include in requests.
    pub additional_headers: Vec<(String, String)>,

    /// CA certificates accepted as signers of signature-protected responses.
    pub response_trust_anchors: Vec<Certificate>,

    /// Require a present `recipNonce` to echo the request's `senderNonce`.
    pub verify_recipient_nonce: bool,
}

impl std::fmt::Debug for CmpClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmpClientConfig")
            .field("timeout", &self.timeout)
            .field("trust_anchors", &self.trust_anchors)
            .field("client_identity", &self.client_identity.is_some())
            .field("response_trust_anchors", &self.response_trust_anchors.len())
            .field("verify_recipient_nonce", &self.verify_recipient_nonce)
            .finish()
    }
}

impl Default for CmpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            trust_anchors: TrustAnchors::WebPki,
            client_identity: None,
            additional_headers: Vec::new(),
            response_trust_anchors: Vec::new(),
            verify_recipient_nonce: true,
        }
    }
}

impl CmpClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CmpClientConfigBuilder {
        CmpClientConfigBuilder::new()
    }
}

/// Builder for [`CmpClientConfig`].
#[derive(Default)]
pub struct CmpClientConfigBuilder {
    timeout: Option<Duration>,
    trust_anchors: Option<TrustAnchors>,
    client_identity: Option<ClientIdentity>,
    additional_headers: Vec<(String, String)>,
    response_trust_anchors: Vec<Certificate>,
    skip_recipient_nonce: bool,
}

impl CmpClientConfigBuilder {
    /// Create a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Use Mozilla's root CA store for the CA's TLS certificate.
    pub fn trust_webpki_roots(mut self) -> Self {
        self.trust_anchors = Some(TrustAnchors::WebPki);
        self
    }

    /// Use explicit PEM-encoded CA certificates for the CA's TLS certificate.
    pub fn trust_explicit(mut self, ca_certs: Vec<Vec<u8>>) -> Self {
        self.trust_anchors = Some(TrustAnchors::Explicit(ca_certs));
        self
    }

    /// Accept any TLS server certificate (insecure, for testing only).
    pub fn trust_any_insecure(mut self) -> Self {
        self.trust_anchors = Some(TrustAnchors::InsecureAcceptAny);
        self
    }

    /// Set the client identity for TLS client authentication.
    pub fn client_identity(mut self, identity: ClientIdentity) -> Self {
        self.client_identity = Some(identity);
        self
    }

    /// Add an additional HTTP header to all requests.
    pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_headers.push((name.into(), value.into()));
        self
    }

    /// Accept responses signed by this CA certificate.
    pub fn response_trust_anchor(mut self, ca_cert: Certificate) -> Self {
        self.response_trust_anchors.push(ca_cert);
        self
    }

    /// Do not check `recipNonce` against the request's `senderNonce`.
    pub fn skip_recipient_nonce_check(mut self) -> Self {
        self.skip_recipient_nonce = true;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is zero.
    pub fn build(self) -> std::result::Result<CmpClientConfig, &'static str> {
        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err("timeout must be greater than zero");
        }

        Ok(CmpClientConfig {
            timeout,
            trust_anchors: self.trust_anchors.unwrap_or(TrustAnchors::WebPki),
            client_identity: self.client_identity,
            additional_headers: self.additional_headers,
            response_trust_anchors: self.response_trust_anchors,
            verify_recipient_nonce: !self.skip_recipient_nonce,
        })
    }
}

/// Client identity for TLS client certificate authentication.
#[derive(Clone)]
pub struct ClientIdentity {
    /// PEM-encoded certificate chain, client certificate first.
    pub cert_pem: Vec<u8>,

    /// PEM-encoded private key.
    pub key_pem: Zeroizing<Vec<u8>>,
}

impl ClientIdentity {
    /// Create a new client identity from PEM-encoded data.
    pub fn new(cert_pem: impl Into<Vec<u8>>, key_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            cert_pem: cert_pem.into(),
            key_pem: Zeroizing::new(key_pem.into()),
        }
    }

    /// Create a client identity from file paths.
    pub fn from_files(
        cert_path: impl AsRef<std::path::Path>,
        key_path: impl AsRef<std::path::Path>,
    ) -> std::io::Result<Self> {
        let cert_pem = std::fs::read(cert_path)?;
        let key_pem = std::fs::read(key_path)?;
        Ok(Self::new(cert_pem, key_pem))
    }
}

/// Trust anchor configuration for the CA's TLS certificate.
#[derive(Clone)]
pub enum TrustAnchors {
    /// Use Mozilla's root CA store.
    WebPki,

    /// Use explicit CA certificates (PEM-encoded).
    Explicit(Vec<Vec<u8>>),

    /// Accept any server certificate (insecure, for testing only).
    ///
    /// **WARNING**: This disables all server certificate verification.
    InsecureAcceptAny,
}

impl std::fmt::Debug for TrustAnchors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WebPki => write!(f, "WebPki"),
            Self::Explicit(certs) => write!(f, "Explicit({} certs)", certs.len()),
            Self::InsecureAcceptAny => write!(f, "InsecureAcceptAny"),
        }
    }
}

// ===== CA target =====

/// Operating mode of the CA endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaMode {
    /// Requests come straight from the end entity.
    Client,
    /// Requests are relayed by a registration authority.
    #[default]
    Ra,
}

impl CaMode {
    /// Profile name used in logs and CA registries.
    pub fn profile(&self) -> &'static str {
        match self {
            Self::Client => "CLIENT",
            Self::Ra => "RA",
        }
    }
}

impl FromStr for CaMode {
    type Err = CmpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CLIENT" => Ok(Self::Client),
            "RA" => Ok(Self::Ra),
            other => Err(CmpError::config(format!("unknown CA mode '{}'", other))),
        }
    }
}

/// Protection applied to certification requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrProtection {
    /// Password-based MAC keyed by the IAK/RV pair.
    #[default]
    IakRv,
    /// Signature with a previously issued certificate's key.
    Signature,
}

impl FromStr for CrProtection {
    type Err = CmpError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IAK_RV" | "IAKRV" => Ok(Self::IakRv),
            "SIGNATURE" => Ok(Self::Signature),
            other => Err(CmpError::config(format!(
                "unknown certification request protection '{}'",
                other
            ))),
        }
    }
}

/// Shared-secret credential pair for password-based protection.
///
/// The IAK is the MAC secret; the RV is sent as `senderKID` so the CA can
/// find the matching secret.
#[derive(Clone)]
pub struct Authentication {
    iak: Zeroizing<String>,
    rv: String,
}

impl Authentication {
    /// Create a credential pair.
    pub fn new(iak: impl Into<String>, rv: impl Into<String>) -> Self {
        Self {
            iak: Zeroizing::new(iak.into()),
            rv: rv.into(),
        }
    }

    /// Initial authentication key.
    pub fn iak(&self) -> &str {
        &self.iak
    }

    /// Reference value.
    pub fn rv(&self) -> &str {
        &self.rv
    }
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authentication")
            .field("iak", &"<redacted>")
            .field("rv", &self.rv)
            .finish()
    }
}

/// A CA target the client can send requests to.
#[derive(Debug, Clone)]
pub struct Cmpv2Server {
    /// Name unique within the caller's CA registry.
    pub ca_name: String,

    /// CMP endpoint URL.
    pub url: Url,

    /// Distinguished name of the issuing CA, used as the message recipient.
    pub issuer_dn: Name,

    /// Operating mode of the endpoint.
    pub ca_mode: CaMode,

    /// Shared-secret credentials.
    pub authentication: Authentication,

    /// Protection required for certification requests.
    pub cr_protection: CrProtection,
}

impl Cmpv2Server {
    /// Create a CA target.
    ///
    /// `issuer_dn` is an RFC 4514 string such as `"CN=ManagementCA,O=Test PKI,C=US"`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or the issuer DN does not parse.
    pub fn new(
        ca_name: impl Into<String>,
        url: impl AsRef<str>,
        issuer_dn: &str,
        authentication: Authentication,
    ) -> Result<Self> {
        let url = Url::parse(url.as_ref())?;
        let issuer_dn = Name::from_str(issuer_dn)
            .map_err(|e| CmpError::config(format!("invalid issuer DN '{}': {}", issuer_dn, e)))?;

        Ok(Self {
            ca_name: ca_name.into(),
            url,
            issuer_dn,
            ca_mode: CaMode::default(),
            authentication,
            cr_protection: CrProtection::default(),
        })
    }

    /// Set the CA mode.
    pub fn with_ca_mode(mut self, ca_mode: CaMode) -> Self {
        self.ca_mode = ca_mode;
        self
    }

    /// Set the protection used for certification requests.
    pub fn with_cr_protection(mut self, cr_protection: CrProtection) -> Self {
        self.cr_protection = cr_protection;
        self
    }
}

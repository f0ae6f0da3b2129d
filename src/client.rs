//! CMPv2 client implementation.
//!
//! This module provides the main `CmpClient` struct, which runs the three
//! certificate flows against a CA: initialization (`ir`), certification
//! (`cr`), and key update (`kur`).

use std::sync::Arc;

use base64::prelude::*;
use der::Encode;
use x509_cert::Certificate;

use crate::assembler::{MessageAssembler, RequestedValidity};
use crate::config::{CmpClientConfig, Cmpv2Server, CrProtection};
use crate::error::{CmpError, Result};
use crate::extractor::{extract, Cmpv2CertificationModel};
use crate::material::{CertificateUpdateModel, CsrModel, OldCertificateModel};
use crate::nonce::{NonceSource, OsNonceSource};
use crate::protection::ProtectionContext;
use crate::transport::{CmpTransport, HttpTransport};
use crate::types::PkiMessage;
use crate::validator::ResponseValidator;

/// CMPv2 client for certificate issuance and renewal.
///
/// Each operation is one request/response round trip with fresh nonces. No
/// state is kept between operations, so one client can serve concurrent
/// requests for different CAs.
///
/// # Example
///
/// ```no_run
/// use usg_cmpv2_client::{
///     Authentication, CmpClient, CmpClientConfig, Cmpv2Server, CsrModel, RequestedValidity,
/// };
///
/// # async fn example(csr: &[u8], key: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
/// let client = CmpClient::new(CmpClientConfig::default()).await?;
///
/// let server = Cmpv2Server::new(
///     "ManagementCA",
///     "http://ca.example.com/ejbca/publicweb/cmp/cmp",
///     "CN=ManagementCA",
///     Authentication::new("mypassword", "mypassword-rv"),
/// )?;
///
/// let csr = CsrModel::new(csr, key)?;
/// let result = client
///     .initialization_request(&csr, &server, RequestedValidity::default())
///     .await?;
/// println!("Issued: {}", result.entity_certificate().tbs_certificate.subject);
/// # Ok(())
/// # }
/// ```
pub struct CmpClient {
    config: CmpClientConfig,
    transport: Arc<dyn CmpTransport>,
    nonce: Arc<dyn NonceSource>,
    assembler: MessageAssembler,
    validator: ResponseValidator,
}

impl std::fmt::Debug for CmpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CmpClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CmpClient {
    /// Create a new CMP client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS configuration fails.
    pub async fn new(config: CmpClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client that sends messages through `transport`.
    pub fn with_transport(config: CmpClientConfig, transport: Arc<dyn CmpTransport>) -> Self {
        let nonce: Arc<dyn NonceSource> = Arc::new(OsNonceSource);
        let validator = ResponseValidator::from_config(&config);
        Self {
            config,
            transport,
            assembler: MessageAssembler::new(nonce.clone()),
            nonce,
            validator,
        }
    }

    /// Replace the randomness source used for nonces, salts, and request IDs.
    pub fn with_nonce_source(mut self, nonce: Arc<dyn NonceSource>) -> Self {
        self.assembler = MessageAssembler::new(nonce.clone());
        self.nonce = nonce;
        self
    }

    /// Get the client configuration.
    pub fn config(&self) -> &CmpClientConfig {
        &self.config
    }

    // =========================================================================
    // Certificate Flows (RFC 4210 Section 5.3)
    // =========================================================================

    /// Request a new certificate with an initialization request (`ir`).
    ///
    /// The request is protected with the CA's IAK/RV shared secret.
    ///
    /// # Arguments
    ///
    /// * `csr` - Decoded CSR and its private key
    /// * `server` - Target CA
    /// * `validity` - Optional requested validity window
    ///
    /// # Errors
    ///
    /// - [`CmpError::Config`] for an inverted validity window or empty IAK
    /// - A transport error if no CMP response was obtained
    /// - [`CmpError::Protocol`] if the response cannot be trusted
    /// - [`CmpError::Server`] if the CA refused the request
    pub async fn initialization_request(
        &self,
        csr: &CsrModel,
        server: &Cmpv2Server,
        validity: RequestedValidity,
    ) -> Result<Cmpv2CertificationModel> {
        tracing::info!(
            "Initialization request for '{}' to CA '{}' ({})",
            csr.subject(),
            server.ca_name,
            server.ca_mode.profile()
        );
        validity.validate()?;

        let protection = self.shared_secret_protection(server)?;
        let request =
            self.assembler
                .build_initialization_request(csr, server, &protection, validity)?;

        self.execute(server, &request, &protection, None).await
    }

    /// Request a new certificate with a certification request (`cr`).
    ///
    /// Protection follows `server.cr_protection`. Signature protection uses
    /// the key of `old`, which is then required.
    ///
    /// # Errors
    ///
    /// As for [`Self::initialization_request`]. Signature protection without
    /// `old` fails with [`CmpError::Config`].
    pub async fn certification_request(
        &self,
        csr: &CsrModel,
        server: &Cmpv2Server,
        old: Option<&OldCertificateModel>,
    ) -> Result<Cmpv2CertificationModel> {
        tracing::info!(
            "Certification request for '{}' to CA '{}' ({})",
            csr.subject(),
            server.ca_name,
            server.ca_mode.profile()
        );

        let (protection, old_certificate) = match server.cr_protection {
            CrProtection::IakRv => (self.shared_secret_protection(server)?, None),
            CrProtection::Signature => {
                let old = old.ok_or_else(|| {
                    CmpError::config(
                        "signature-protected certification request requires a previous certificate and key",
                    )
                })?;
                (
                    ProtectionContext::signature(old.private_key().clone()),
                    Some(old.certificate()),
                )
            }
        };

        let request = self
            .assembler
            .build_certification_request(csr, server, &protection)?;

        self.execute(server, &request, &protection, old_certificate)
            .await
    }

    /// Renew a certificate with a key update request (`kur`).
    ///
    /// The request is signed with the previous private key and carries the
    /// previous certificate in `extraCerts`.
    ///
    /// # Errors
    ///
    /// As for [`Self::initialization_request`].
    pub async fn key_update_request(
        &self,
        update: &CertificateUpdateModel,
        server: &Cmpv2Server,
    ) -> Result<Cmpv2CertificationModel> {
        tracing::info!(
            "Key update request for '{}' (replacing '{}') to CA '{}'",
            update.csr.subject(),
            update.old.subject(),
            server.ca_name
        );

        let protection = ProtectionContext::signature(update.old.private_key().clone());
        let request = self
            .assembler
            .build_key_update_request(update, server, &protection)?;

        self.execute(server, &request, &protection, Some(update.old.certificate()))
            .await
    }

    /// Renew a certificate, choosing the request type from the new CSR.
    ///
    /// When the CSR keeps the subject and SANs of the old certificate (see
    /// [`CertificateUpdateModel::is_key_update`]) a key update request is
    /// sent. Otherwise the identity changed and a certification request for
    /// the new CSR is sent instead, with the old certificate and key
    /// available for signature protection.
    ///
    /// # Errors
    ///
    /// As for [`Self::key_update_request`] and [`Self::certification_request`].
    pub async fn update_request(
        &self,
        update: &CertificateUpdateModel,
        server: &Cmpv2Server,
    ) -> Result<Cmpv2CertificationModel> {
        if update.is_key_update() {
            tracing::info!(
                "CSR and old certificate have the same identity, preparing key update request"
            );
            self.key_update_request(update, server).await
        } else {
            tracing::info!(
                "CSR and old certificate have different identities, preparing certification request"
            );
            self.certification_request(&update.csr, server, Some(&update.old))
                .await
        }
    }

    // =========================================================================
    // Helper Methods
    // =========================================================================

    fn shared_secret_protection(&self, server: &Cmpv2Server) -> Result<ProtectionContext> {
        let auth = &server.authentication;
        if auth.iak().is_empty() {
            return Err(CmpError::config(format!(
                "CA '{}' has no IAK configured",
                server.ca_name
            )));
        }
        Ok(ProtectionContext::shared_secret(
            auth.rv(),
            auth.iak(),
            self.nonce.as_ref(),
        ))
    }

    /// Send `request`, then validate and unpack the response.
    async fn execute(
        &self,
        server: &Cmpv2Server,
        request: &PkiMessage,
        protection: &ProtectionContext,
        old_certificate: Option<&Certificate>,
    ) -> Result<Cmpv2CertificationModel> {
        let request_der = request.to_der()?;
        tracing::trace!("Request: {}", BASE64_STANDARD.encode(&request_der));

        let response = self.transport.send(&server.url, request_der).await?;
        tracing::info!("Received response from CA '{}'", server.ca_name);
        tracing::trace!("Response: {}", BASE64_STANDARD.encode(&response));

        let validated = self
            .validator
            .validate(&response, request, protection, old_certificate)?;
        let model = extract(&validated)?;

        tracing::info!(
            "CA '{}' issued certificate for '{}' ({})",
            server.ca_name,
            model.entity_certificate().tbs_certificate.subject,
            validated.status().as_str()
        );
        Ok(model)
    }
}

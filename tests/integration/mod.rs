//! Integration test utilities and helpers
//!
//! This module provides common test infrastructure for CMP client integration
//! tests: a mock CA built on wiremock that answers each request with a
//! synthetic, properly bound and protected CMP response, plus fixture loading.

use std::fs;

use der::asn1::OctetString;
use der::{DecodePem, Encode};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use usg_cmpv2_client::nonce::{NonceSource, OsNonceSource};
use usg_cmpv2_client::types::{
    CertOrEncCert, CertRepMessage, CertResponse, CertifiedKeyPair, ErrorMsgContent,
    InfoTypeAndValue, PkiBody, PkiHeader, PkiMessage, PkiStatus, PkiStatusInfo,
    CONTENT_TYPE_PKIXCMP,
};
use usg_cmpv2_client::{
    Authentication, Certificate, Cmpv2Server, CsrModel, OldCertificateModel, ProtectionContext,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// CMP endpoint path, as exposed by EJBCA.
pub const CMP_PATH: &str = "/ejbca/publicweb/cmp/cmp";

/// Reference value and shared secret the mock CA knows.
pub const RV: &str = "ID1";
pub const IAK: &str = "SECRET";

/// Issuer DN of the mock CA.
pub const ISSUER_DN: &str = "CN=ManagementCA,O=Test PKI,C=US";

/// Load a fixture file as a string.
pub fn fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{}", name))
        .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", name, e))
}

/// Load a PEM certificate fixture.
pub fn certificate(name: &str) -> Certificate {
    Certificate::from_pem(fixture(name)).expect("Valid certificate fixture")
}

/// Load a PKCS#8 RSA key fixture.
pub fn private_key(name: &str) -> RsaPrivateKey {
    RsaPrivateKey::from_pkcs8_pem(&fixture(name)).expect("Valid key fixture")
}

/// The client CSR and key.
pub fn csr_model() -> CsrModel {
    CsrModel::new(
        fixture("client.csr").as_bytes(),
        fixture("client.key").as_bytes(),
    )
    .expect("Valid CSR fixture")
}

/// The certificate being renewed and its key.
pub fn old_certificate_model() -> OldCertificateModel {
    OldCertificateModel::new(
        fixture("old-client.pem").as_bytes(),
        fixture("old-client.key").as_bytes(),
    )
    .expect("Valid old certificate fixture")
}

/// How the mock CA protects its responses.
#[derive(Clone)]
pub enum CaProtection {
    /// Password-based MAC with the given shared secret.
    SharedSecret(String),
    /// Signature with the issuing CA key.
    Signature(RsaPrivateKey),
}

impl CaProtection {
    /// MAC with the secret the client is configured with.
    pub fn matching_secret() -> Self {
        Self::SharedSecret(IAK.to_string())
    }

    /// Signature by the issuing CA.
    pub fn issuing_ca() -> Self {
        Self::Signature(private_key("issuing-ca.key"))
    }

    fn context(&self) -> ProtectionContext {
        match self {
            Self::SharedSecret(secret) => {
                ProtectionContext::shared_secret("ManagementCA", secret.as_str(), &OsNonceSource)
            }
            Self::Signature(key) => ProtectionContext::signature(key.clone()),
        }
    }
}

/// What the mock CA puts in the response body.
#[derive(Clone)]
pub enum CaReply {
    /// A certificate response with the given status.
    Status(PkiStatusInfo),
    /// An `error` body with the given status.
    Error(PkiStatusInfo),
}

/// Builds a CMP response for each incoming request.
#[derive(Clone)]
pub struct CaResponder {
    protection: CaProtection,
    reply: CaReply,
    issued: Certificate,
    extra_certs: Vec<Certificate>,
    ca_pubs: Vec<Certificate>,
    foreign_transaction: bool,
}

impl CaResponder {
    /// Accept every request, MAC-protected with the matching secret.
    pub fn accepting() -> Self {
        Self {
            protection: CaProtection::matching_secret(),
            reply: CaReply::Status(PkiStatusInfo::new(PkiStatus::Accepted)),
            issued: certificate("client-issued.pem"),
            extra_certs: vec![certificate("issuing-ca.pem"), certificate("root-ca.pem")],
            ca_pubs: Vec::new(),
            foreign_transaction: false,
        }
    }

    /// Protect responses with `protection`.
    pub fn protected_by(mut self, protection: CaProtection) -> Self {
        self.protection = protection;
        self
    }

    /// Answer with `reply` instead of an acceptance.
    pub fn replying(mut self, reply: CaReply) -> Self {
        self.reply = reply;
        self
    }

    /// Replace the response `extraCerts`.
    pub fn extra_certs(mut self, certs: Vec<Certificate>) -> Self {
        self.extra_certs = certs;
        self
    }

    /// Set the response `caPubs`.
    pub fn ca_pubs(mut self, certs: Vec<Certificate>) -> Self {
        self.ca_pubs = certs;
        self
    }

    /// Answer with a transaction ID unrelated to the request.
    pub fn foreign_transaction(mut self) -> Self {
        self.foreign_transaction = true;
        self
    }

    /// DER of the response to `request`.
    pub fn respond_to(&self, request: &PkiMessage) -> Vec<u8> {
        let body = self.body(request);
        let ca_name = certificate("issuing-ca.pem").tbs_certificate.subject;
        let client_name = request
            .header
            .sender_name()
            .cloned()
            .expect("Request sender is a directory name");

        let context = self.protection.context();
        let mut header = PkiHeader::new(ca_name, client_name);
        header.protection_alg = Some(context.algorithm_identifier().unwrap());
        header.sender_kid = context
            .sender_kid()
            .map(|kid| OctetString::new(kid).unwrap());
        header.trans_id = if self.foreign_transaction {
            Some(OctetString::new(OsNonceSource.nonce()).unwrap())
        } else {
            request.header.trans_id.clone()
        };
        header.sender_nonce = Some(OctetString::new(OsNonceSource.nonce()).unwrap());
        header.recip_nonce = request.header.sender_nonce.clone();
        header.general_info = Some(vec![InfoTypeAndValue::implicit_confirm()]);

        let protection = context.protect(&header, &body).unwrap();
        PkiMessage {
            header,
            body,
            protection: Some(protection),
            extra_certs: (!self.extra_certs.is_empty()).then(|| self.extra_certs.clone()),
        }
        .to_der()
        .unwrap()
    }

    fn body(&self, request: &PkiMessage) -> PkiBody {
        let status = match &self.reply {
            CaReply::Error(status) => {
                return PkiBody::Error(ErrorMsgContent {
                    pki_status_info: status.clone(),
                    error_code: None,
                    error_details: None,
                })
            }
            CaReply::Status(status) => status.clone(),
        };

        let (requests, wrap): (_, fn(CertRepMessage) -> PkiBody) = match &request.body {
            PkiBody::Ir(reqs) => (reqs, PkiBody::Ip),
            PkiBody::Cr(reqs) => (reqs, PkiBody::Cp),
            PkiBody::Kur(reqs) => (reqs, PkiBody::Kup),
            other => panic!("Unexpected request body type {}", other.type_number()),
        };

        let certified_key_pair = status.status.is_granted().then(|| CertifiedKeyPair {
            cert_or_enc_cert: CertOrEncCert::Certificate(self.issued.clone()),
            private_key: None,
            publication_info: None,
        });

        wrap(CertRepMessage {
            ca_pubs: (!self.ca_pubs.is_empty()).then(|| self.ca_pubs.clone()),
            response: vec![CertResponse {
                cert_req_id: requests[0].cert_req.cert_req_id,
                status,
                certified_key_pair,
                rsp_info: None,
            }],
        })
    }
}

impl Respond for CaResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let message = PkiMessage::parse(&request.body).expect("Client sent a valid PKIMessage");
        ResponseTemplate::new(200)
            .insert_header("Content-Type", CONTENT_TYPE_PKIXCMP)
            .set_body_bytes(self.respond_to(&message))
    }
}

/// Mock CMP CA for integration tests
pub struct MockCmpServer {
    server: MockServer,
}

impl MockCmpServer {
    /// Create a new mock CMP server
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Self { server }
    }

    /// Get the CMP endpoint URL of the mock server
    pub fn url(&self) -> String {
        format!("{}{}", self.server.uri(), CMP_PATH)
    }

    /// Get a reference to the inner MockServer for custom mocking
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// CA target pointing at this server with the given IAK.
    pub fn server(&self, iak: &str) -> Cmpv2Server {
        Cmpv2Server::new("ManagementCA", &self.url(), ISSUER_DN, Authentication::new(iak, RV))
            .expect("Valid CA target")
    }

    /// Answer CMP requests with `responder`, expecting exactly one request.
    pub async fn mock_ca(&self, responder: CaResponder) {
        Mock::given(method("POST"))
            .and(path(CMP_PATH))
            .and(header("content-type", CONTENT_TYPE_PKIXCMP))
            .respond_with(responder)
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Answer with a fixed body and status.
    pub async fn mock_raw(&self, status: u16, body: Vec<u8>) {
        Mock::given(method("POST"))
            .and(path(CMP_PATH))
            .respond_with(
                ResponseTemplate::new(status)
                    .insert_header("Content-Type", CONTENT_TYPE_PKIXCMP)
                    .set_body_bytes(body),
            )
            .mount(&self.server)
            .await;
    }

    /// Mock an HTTP-level error
    pub async fn mock_server_error(&self, status: u16, message: &str) {
        Mock::given(method("POST"))
            .and(path(CMP_PATH))
            .respond_with(
                ResponseTemplate::new(status)
                    .set_body_string(message)
                    .insert_header("Content-Type", "text/plain"),
            )
            .mount(&self.server)
            .await;
    }

    /// Requests received so far, decoded.
    pub async fn received_messages(&self) -> Vec<PkiMessage> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| PkiMessage::parse(&request.body).expect("Valid PKIMessage"))
            .collect()
    }
}

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_starts() {
        let mock_server = MockCmpServer::start().await;
        assert!(mock_server.url().starts_with("http://"));
        assert!(mock_server.url().ends_with(CMP_PATH));
    }

    #[test]
    fn test_fixtures_load() {
        assert!(csr_model().subject().to_string().contains("CN=onap.org"));
        assert!(old_certificate_model().public_key().is_ok());
    }
}

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

//! Key and CSR material adapter.
//!
//! Turns caller-supplied bytes into typed models:
//!
//! - [`CsrModel`]: a PKCS#10 request plus the matching PKCS#8 RSA key.
//! - [`OldCertificateModel`]: a previously issued certificate plus its key,
//!   used to sign renewal requests.
//! - [`CertificateUpdateModel`]: both of the above for the key update flow.
//!
//! Every input may be DER or PEM. Anything that fails to parse, a key that
//! is not RSA, or a CSR whose self-signature does not verify fails
//! immediately with [`CmpError::Decryption`] naming the offending input.

use const_oid::db::rfc5912::ID_EXTENSION_REQ;
use const_oid::AssociatedOid;
use der::{Decode, DecodePem, Encode};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::SubjectAltName;
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::request::CertReq;
use x509_cert::Certificate;

use crate::error::{CmpError, MaterialKind, Result};
use crate::protection::SignatureAlgorithm;

/// A decoded certificate signing request and its private key.
#[derive(Clone)]
pub struct CsrModel {
    subject: Name,
    sans: Vec<GeneralName>,
    public_key: SubjectPublicKeyInfoOwned,
    private_key: RsaPrivateKey,
}

impl CsrModel {
    /// Decode a CSR and its private key.
    ///
    /// # Arguments
    ///
    /// * `csr` - PKCS#10 request, DER or PEM
    /// * `private_key` - PKCS#8 RSA private key, DER or PEM
    ///
    /// # Errors
    ///
    /// Returns [`CmpError::Decryption`] naming the input that did not decode,
    /// or naming the CSR when its self-signature does not verify.
    pub fn new(csr: &[u8], private_key: &[u8]) -> Result<Self> {
        let request = decode_csr(csr)?;
        let public_key = request.info.public_key.clone();
        let rsa_key = rsa_public_key(&public_key)
            .map_err(|e| CmpError::decryption(MaterialKind::Csr, e))?;
        verify_csr_signature(&request, &rsa_key)?;

        let sans = csr_subject_alt_names(&request)?;
        let private_key = decode_private_key(private_key)?;

        tracing::debug!(
            "Decoded CSR for subject '{}' with {} SAN entries",
            request.info.subject,
            sans.len()
        );

        Ok(Self {
            subject: request.info.subject,
            sans,
            public_key,
            private_key,
        })
    }

    /// Subject distinguished name.
    pub fn subject(&self) -> &Name {
        &self.subject
    }

    /// Subject alternative names, in CSR order.
    pub fn sans(&self) -> &[GeneralName] {
        &self.sans
    }

    /// Public key from the CSR.
    pub fn public_key(&self) -> &SubjectPublicKeyInfoOwned {
        &self.public_key
    }

    /// Private key matching the CSR.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }
}

impl std::fmt::Debug for CsrModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrModel")
            .field("subject", &self.subject.to_string())
            .field("sans", &self.sans.len())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// A previously issued certificate and its private key.
#[derive(Clone)]
pub struct OldCertificateModel {
    certificate: Certificate,
    subject: Name,
    sans: Vec<GeneralName>,
    private_key: RsaPrivateKey,
}

impl OldCertificateModel {
    /// Decode a certificate and its private key.
    ///
    /// When `certificate` is a PEM chain, only the first certificate is used.
    ///
    /// # Errors
    ///
    /// Returns [`CmpError::Decryption`] naming the input that did not decode.
    pub fn new(certificate: &[u8], private_key: &[u8]) -> Result<Self> {
        let certificate = decode_certificate(certificate)?;
        let subject = certificate.tbs_certificate.subject.clone();
        let sans = certificate_subject_alt_names(&certificate)?;
        let private_key = decode_private_key(private_key)?;

        Ok(Self {
            certificate,
            subject,
            sans,
            private_key,
        })
    }

    /// The certificate being renewed.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Subject taken from the certificate.
    pub fn subject(&self) -> &Name {
        &self.subject
    }

    /// Subject alternative names taken from the certificate.
    pub fn sans(&self) -> &[GeneralName] {
        &self.sans
    }

    /// Private key of the certificate.
    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    /// RSA public key of the certificate.
    pub fn public_key(&self) -> Result<RsaPublicKey> {
        rsa_public_key(&self.certificate.tbs_certificate.subject_public_key_info)
            .map_err(|e| CmpError::decryption(MaterialKind::Certificate, e))
    }
}

impl std::fmt::Debug for OldCertificateModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OldCertificateModel")
            .field("subject", &self.subject.to_string())
            .field("serial", &self.certificate.tbs_certificate.serial_number)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Input of the key update flow.
#[derive(Debug, Clone)]
pub struct CertificateUpdateModel {
    /// New CSR and the key it was made with.
    pub csr: CsrModel,
    /// Certificate being replaced and its key.
    pub old: OldCertificateModel,
}

impl CertificateUpdateModel {
    /// Pair a new CSR with the certificate it replaces.
    pub fn new(csr: CsrModel, old: OldCertificateModel) -> Self {
        Self { csr, old }
    }

    /// Decode all four inputs at once.
    pub fn from_bytes(
        csr: &[u8],
        private_key: &[u8],
        old_certificate: &[u8],
        old_private_key: &[u8],
    ) -> Result<Self> {
        Ok(Self {
            csr: CsrModel::new(csr, private_key)?,
            old: OldCertificateModel::new(old_certificate, old_private_key)?,
        })
    }

    /// Returns true if the new CSR keeps the identity of the old certificate.
    ///
    /// Subjects are compared ignoring RDN order and letter case, SANs
    /// ignoring order. A match is renewed with a key update request,
    /// anything else needs a certification request.
    pub fn is_key_update(&self) -> bool {
        same_subject(self.csr.subject(), self.old.subject())
            && same_names(self.csr.sans(), self.old.sans())
    }
}

// ===== Identity comparison =====

fn same_subject(a: &Name, b: &Name) -> bool {
    subject_key(a) == subject_key(b)
}

/// RDNs as sorted sets of normalized `type=value` strings, in sorted order.
fn subject_key(name: &Name) -> Vec<Vec<String>> {
    let mut rdns: Vec<Vec<String>> = name
        .0
        .iter()
        .map(|rdn| {
            let mut attributes: Vec<String> = rdn
                .0
                .iter()
                .map(|atv| {
                    atv.to_string()
                        .to_lowercase()
                        .split_whitespace()
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            attributes.sort();
            attributes
        })
        .collect();
    rdns.sort();
    rdns
}

fn same_names(a: &[GeneralName], b: &[GeneralName]) -> bool {
    a.iter().all(|name| b.contains(name)) && b.iter().all(|name| a.contains(name))
}

// ===== Decoding helpers =====

fn is_pem(bytes: &[u8]) -> bool {
    bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .map(|start| bytes[start..].starts_with(b"-----BEGIN"))
        .unwrap_or(false)
}

fn decode_csr(bytes: &[u8]) -> Result<CertReq> {
    let result = if is_pem(bytes) {
        CertReq::from_pem(bytes)
    } else {
        CertReq::from_der(bytes)
    };
    result.map_err(|e| CmpError::decryption(MaterialKind::Csr, e.to_string()))
}

fn decode_certificate(bytes: &[u8]) -> Result<Certificate> {
    if is_pem(bytes) {
        Certificate::load_pem_chain(bytes)
            .map_err(|e| CmpError::decryption(MaterialKind::Certificate, e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| {
                CmpError::decryption(MaterialKind::Certificate, "no certificate in PEM data")
            })
    } else {
        Certificate::from_der(bytes)
            .map_err(|e| CmpError::decryption(MaterialKind::Certificate, e.to_string()))
    }
}

fn decode_private_key(bytes: &[u8]) -> Result<RsaPrivateKey> {
    let result = if is_pem(bytes) {
        let pem = std::str::from_utf8(bytes).map_err(|_| {
            CmpError::decryption(MaterialKind::PrivateKey, "PEM data is not valid UTF-8")
        })?;
        RsaPrivateKey::from_pkcs8_pem(pem)
    } else {
        RsaPrivateKey::from_pkcs8_der(bytes)
    };
    result.map_err(|e| {
        CmpError::decryption(
            MaterialKind::PrivateKey,
            format!("not a PKCS#8 RSA private key: {}", e),
        )
    })
}

/// RSA public key from a SubjectPublicKeyInfo.
pub(crate) fn rsa_public_key(
    spki: &SubjectPublicKeyInfoOwned,
) -> std::result::Result<RsaPublicKey, String> {
    let der = spki.to_der().map_err(|e| e.to_string())?;
    RsaPublicKey::from_public_key_der(&der).map_err(|e| format!("not an RSA public key: {}", e))
}

fn verify_csr_signature(request: &CertReq, public_key: &RsaPublicKey) -> Result<()> {
    let algorithm = SignatureAlgorithm::from_oid(&request.algorithm.oid).ok_or_else(|| {
        CmpError::decryption(
            MaterialKind::Csr,
            format!("unsupported CSR signature algorithm {}", request.algorithm.oid),
        )
    })?;
    let info = request
        .info
        .to_der()
        .map_err(|e| CmpError::decryption(MaterialKind::Csr, e.to_string()))?;
    let signature = request.signature.as_bytes().ok_or_else(|| {
        CmpError::decryption(MaterialKind::Csr, "CSR signature has unused bits")
    })?;

    if algorithm.verify(public_key, &info, signature) {
        Ok(())
    } else {
        Err(CmpError::decryption(
            MaterialKind::Csr,
            "CSR signature does not verify",
        ))
    }
}

fn csr_subject_alt_names(request: &CertReq) -> Result<Vec<GeneralName>> {
    let mut sans = Vec::new();
    for attribute in request.info.attributes.iter() {
        if attribute.oid != ID_EXTENSION_REQ {
            continue;
        }
        for value in attribute.values.iter() {
            let extensions = value
                .to_der()
                .and_then(|der| Vec::<Extension>::from_der(&der))
                .map_err(|e| CmpError::decryption(MaterialKind::Csr, e.to_string()))?;
            sans.extend(
                subject_alt_names(&extensions)
                    .map_err(|e| CmpError::decryption(MaterialKind::Csr, e))?,
            );
        }
    }
    Ok(sans)
}

fn certificate_subject_alt_names(certificate: &Certificate) -> Result<Vec<GeneralName>> {
    let extensions = certificate
        .tbs_certificate
        .extensions
        .as_deref()
        .unwrap_or(&[]);
    subject_alt_names(extensions).map_err(|e| CmpError::decryption(MaterialKind::Certificate, e))
}

fn subject_alt_names(extensions: &[Extension]) -> std::result::Result<Vec<GeneralName>, String> {
    let mut sans = Vec::new();
    for extension in extensions.iter().filter(|e| e.extn_id == SubjectAltName::OID) {
        let san = SubjectAltName::from_der(extension.extn_value.as_bytes())
            .map_err(|e| format!("malformed subjectAltName: {}", e))?;
        sans.extend(san.0);
    }
    Ok(sans)
}

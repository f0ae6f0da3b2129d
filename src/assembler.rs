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

//! PKI message assembly.
//!
//! Builds protected `ir`, `cr`, and `kur` messages from a [`CsrModel`] and a
//! [`Cmpv2Server`]. Every message gets a fresh transaction identifier,
//! sender nonce, and `certReqId`, so two messages built from the same input
//! never share them.
//!
//! # RFC Reference
//!
//! - RFC 4210 Section 5.3.1: Initialization Request
//! - RFC 4210 Section 5.3.3: Certification Request
//! - RFC 4210 Section 5.3.5: Key Update Request
//! - RFC 4211 Section 4.1: Signature Key POP

use std::sync::Arc;
use std::time::SystemTime;

use const_oid::db::rfc5280::{ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH};
use const_oid::AssociatedOid;
use der::asn1::{BitString, GeneralizedTime, OctetString, UtcTime};
use der::{DateTime, Encode};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::ext::Extension;
use x509_cert::time::Time;
use x509_cert::Certificate;

use crate::config::Cmpv2Server;
use crate::error::{CmpError, Result};
use crate::material::{CertificateUpdateModel, CsrModel};
use crate::nonce::NonceSource;
use crate::protection::{ProtectionContext, SignatureAlgorithm};
use crate::types::{
    CertReqMsg, CertRequest, CertTemplate, InfoTypeAndValue, OptionalValidity, PkiBody,
    PkiHeader, PkiMessage, PopoSigningKey, ProofOfPossession,
};

/// Requested validity window for an initialization request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestedValidity {
    /// Earliest validity start.
    pub not_before: Option<SystemTime>,
    /// Latest validity end.
    pub not_after: Option<SystemTime>,
}

impl RequestedValidity {
    /// Window with both bounds optional.
    pub fn new(not_before: Option<SystemTime>, not_after: Option<SystemTime>) -> Self {
        Self {
            not_before,
            not_after,
        }
    }

    /// Check that `not_before` is not after `not_after`.
    pub fn validate(&self) -> Result<()> {
        if let (Some(before), Some(after)) = (self.not_before, self.not_after) {
            if before > after {
                return Err(CmpError::config("notBefore is set after notAfter"));
            }
        }
        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.not_before.is_none() && self.not_after.is_none()
    }

    fn to_optional_validity(self) -> Result<OptionalValidity> {
        Ok(OptionalValidity {
            not_before: self.not_before.map(to_time).transpose()?,
            not_after: self.not_after.map(to_time).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum RequestKind {
    Initialization,
    Certification,
    KeyUpdate,
}

impl RequestKind {
    fn body(self, requests: Vec<CertReqMsg>) -> PkiBody {
        match self {
            Self::Initialization => PkiBody::Ir(requests),
            Self::Certification => PkiBody::Cr(requests),
            Self::KeyUpdate => PkiBody::Kur(requests),
        }
    }
}

/// Builds protected request messages.
#[derive(Clone)]
pub struct MessageAssembler {
    nonce: Arc<dyn NonceSource>,
}

impl std::fmt::Debug for MessageAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageAssembler").finish_non_exhaustive()
    }
}

impl MessageAssembler {
    /// Create an assembler drawing randomness from `nonce`.
    pub fn new(nonce: Arc<dyn NonceSource>) -> Self {
        Self { nonce }
    }

    /// Build an `ir` message.
    ///
    /// # Errors
    ///
    /// Returns [`CmpError::Config`] if the validity window is inverted.
    pub fn build_initialization_request(
        &self,
        csr: &CsrModel,
        server: &Cmpv2Server,
        protection: &ProtectionContext,
        validity: RequestedValidity,
    ) -> Result<PkiMessage> {
        validity.validate()?;
        self.build(RequestKind::Initialization, csr, server, protection, validity, None)
    }

    /// Build a `cr` message.
    pub fn build_certification_request(
        &self,
        csr: &CsrModel,
        server: &Cmpv2Server,
        protection: &ProtectionContext,
    ) -> Result<PkiMessage> {
        self.build(
            RequestKind::Certification,
            csr,
            server,
            protection,
            RequestedValidity::default(),
            None,
        )
    }

    /// Build a `kur` message carrying the old certificate in `extraCerts`.
    pub fn build_key_update_request(
        &self,
        update: &CertificateUpdateModel,
        server: &Cmpv2Server,
        protection: &ProtectionContext,
    ) -> Result<PkiMessage> {
        self.build(
            RequestKind::KeyUpdate,
            &update.csr,
            server,
            protection,
            RequestedValidity::default(),
            Some(vec![update.old.certificate().clone()]),
        )
    }

    fn build(
        &self,
        kind: RequestKind,
        csr: &CsrModel,
        server: &Cmpv2Server,
        protection: &ProtectionContext,
        validity: RequestedValidity,
        extra_certs: Option<Vec<Certificate>>,
    ) -> Result<PkiMessage> {
        let template = CertTemplate {
            version: Some(2),
            serial_number: Some(0),
            signing_alg: Some(SignatureAlgorithm::Sha256WithRsa.algorithm_identifier()),
            issuer: Some(server.issuer_dn.clone()),
            validity: if validity.is_empty() {
                None
            } else {
                Some(validity.to_optional_validity()?)
            },
            subject: Some(csr.subject().clone()),
            public_key: Some(csr.public_key().clone()),
            issuer_uid: None,
            subject_uid: None,
            extensions: Some(request_extensions(csr.sans())?),
        };

        let cert_req = CertRequest {
            cert_req_id: self.nonce.cert_req_id(),
            cert_template: template,
            controls: None,
        };
        let popo = proof_of_possession(&cert_req, csr)?;
        let body = kind.body(vec![CertReqMsg {
            cert_req,
            popo: Some(popo),
            reg_info: None,
        }]);

        let mut header = PkiHeader::new(csr.subject().clone(), server.issuer_dn.clone());
        header.message_time = Some(GeneralizedTime::from_system_time(SystemTime::now())?);
        header.protection_alg = Some(protection.algorithm_identifier()?);
        header.sender_kid = protection.sender_kid().map(OctetString::new).transpose()?;
        header.trans_id = Some(OctetString::new(self.nonce.nonce())?);
        header.sender_nonce = Some(OctetString::new(self.nonce.nonce())?);
        header.general_info = Some(vec![InfoTypeAndValue::implicit_confirm()]);

        let protection_bits = protection.protect(&header, &body)?;

        tracing::debug!(
            "Built {:?} request for '{}' to CA '{}'",
            kind,
            csr.subject(),
            server.ca_name
        );

        Ok(PkiMessage {
            header,
            body,
            protection: Some(protection_bits),
            extra_certs,
        })
    }
}

/// KeyUsage, ExtendedKeyUsage, and (when present) SubjectAltName.
fn request_extensions(sans: &[GeneralName]) -> Result<Vec<Extension>> {
    let key_usage =
        KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment | KeyUsages::NonRepudiation);
    let extended_key_usage = ExtendedKeyUsage(vec![ID_KP_CLIENT_AUTH, ID_KP_SERVER_AUTH]);

    let mut extensions = vec![
        Extension {
            extn_id: KeyUsage::OID,
            critical: false,
            extn_value: OctetString::new(key_usage.to_der()?)?,
        },
        Extension {
            extn_id: ExtendedKeyUsage::OID,
            critical: false,
            extn_value: OctetString::new(extended_key_usage.to_der()?)?,
        },
    ];

    if !sans.is_empty() {
        extensions.push(Extension {
            extn_id: SubjectAltName::OID,
            critical: false,
            extn_value: OctetString::new(SubjectAltName(sans.to_vec()).to_der()?)?,
        });
    }

    Ok(extensions)
}

/// Signature over the DER of `CertRequest` with the CSR's private key.
fn proof_of_possession(cert_req: &CertRequest, csr: &CsrModel) -> Result<ProofOfPossession> {
    let algorithm = SignatureAlgorithm::Sha256WithRsa;
    let signature = algorithm.sign(csr.private_key(), &cert_req.to_der()?)?;

    Ok(ProofOfPossession::Signature(PopoSigningKey {
        algorithm_identifier: algorithm.algorithm_identifier(),
        signature: BitString::from_bytes(&signature)?,
    }))
}

/// UTCTime before 2050, GeneralizedTime from then on (RFC 5280 Section 4.1.2.5).
fn to_time(at: SystemTime) -> Result<Time> {
    let date_time = DateTime::from_system_time(at)?;
    if date_time.year() < 2050 {
        Ok(Time::UtcTime(UtcTime::from_date_time(date_time)?))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(date_time)))
    }
}

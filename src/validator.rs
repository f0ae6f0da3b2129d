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

//! Response validation and status interpretation.
//!
//! A CA response passes through these gates in order, and the first failure
//! ends processing:
//!
//! 1. DER decoding into a [`PkiMessage`].
//! 2. `transactionID` must equal the request's.
//! 3. Protection must verify under the flow's protection family.
//! 4. `recipNonce`, when present, must equal the request's `senderNonce`.
//! 5. An `error` body becomes [`CmpError::Server`]; any other body must be
//!    the reply type matching the request.
//! 6. The first `CertResponse` must carry `accepted` or `grantedWithMods`
//!    and a plain certificate.
//!
//! Nothing is read out of a response before its protection has verified.

use rsa::RsaPublicKey;
use x509_cert::Certificate;

use crate::config::CmpClientConfig;
use crate::error::{CmpError, Result};
use crate::material::rsa_public_key;
use crate::protection::{certificate_signed_by, verify_signature, ProtectionContext};
use crate::types::{CertOrEncCert, CertRepMessage, CertResponse, PkiBody, PkiMessage, PkiStatus};

/// A response that passed every gate.
#[derive(Debug, Clone)]
pub struct ValidatedResponse {
    message: PkiMessage,
    response: CertResponse,
    certificate: Certificate,
}

impl ValidatedResponse {
    /// The full response message.
    pub fn message(&self) -> &PkiMessage {
        &self.message
    }

    /// Status granted by the CA.
    pub fn status(&self) -> PkiStatus {
        self.response.status.status
    }

    /// The `CertResponse` for this request.
    pub fn cert_response(&self) -> &CertResponse {
        &self.response
    }

    /// Newly issued certificate.
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Certificates from `caPubs`, empty if absent.
    pub fn ca_pubs(&self) -> &[Certificate] {
        self.message
            .body
            .cert_rep()
            .and_then(|rep| rep.ca_pubs.as_deref())
            .unwrap_or(&[])
    }

    /// Certificates from `extraCerts`, empty if absent.
    pub fn extra_certs(&self) -> &[Certificate] {
        self.message.extra_certs()
    }
}

/// Checks CA responses against the request they answer.
#[derive(Debug, Clone)]
pub struct ResponseValidator {
    trust_anchors: Vec<Certificate>,
    verify_recipient_nonce: bool,
}

impl ResponseValidator {
    /// Validator with explicit signer trust anchors.
    pub fn new(trust_anchors: Vec<Certificate>, verify_recipient_nonce: bool) -> Self {
        Self {
            trust_anchors,
            verify_recipient_nonce,
        }
    }

    /// Validator using the response trust settings of `config`.
    pub fn from_config(config: &CmpClientConfig) -> Self {
        Self::new(
            config.response_trust_anchors.clone(),
            config.verify_recipient_nonce,
        )
    }

    /// Validate `response` as the answer to `request`.
    ///
    /// `old_certificate` is the certificate whose key signed the request, if
    /// any; its public key is the first candidate for verifying a
    /// signature-protected response.
    ///
    /// # Errors
    ///
    /// - [`CmpError::Protocol`] if the response cannot be parsed, is bound to
    ///   another transaction, or fails protection.
    /// - [`CmpError::Server`] if the CA answered with an error body or a
    ///   status other than `accepted`/`grantedWithMods`.
    pub fn validate(
        &self,
        response: &[u8],
        request: &PkiMessage,
        protection: &ProtectionContext,
        old_certificate: Option<&Certificate>,
    ) -> Result<ValidatedResponse> {
        let message = PkiMessage::parse(response)?;
        tracing::debug!("Response body type: {}", message.body.type_number());

        check_transaction_id(&message, request)?;
        self.check_protection(&message, protection, old_certificate)?;
        self.check_recipient_nonce(&message, request)?;

        let rep = expect_cert_rep(&message, request)?;
        let response = first_response(rep, request)?;
        check_status(response)?;
        let certificate = issued_certificate(response)?;

        if message.header.has_implicit_confirm() {
            tracing::info!("Implicit confirm on certificate from server");
        } else {
            tracing::debug!("No implicit confirm in response");
        }

        let response = response.clone();
        Ok(ValidatedResponse {
            message,
            response,
            certificate,
        })
    }

    fn check_protection(
        &self,
        message: &PkiMessage,
        protection: &ProtectionContext,
        old_certificate: Option<&Certificate>,
    ) -> Result<()> {
        let value = message
            .protection_bytes()
            .ok_or_else(|| CmpError::protocol("response is not protected"))?;

        let verified = match protection {
            ProtectionContext::SharedSecret { .. } => {
                protection.verify(&message.header, &message.body, value)?
            }
            ProtectionContext::Signature { .. } => {
                self.verify_signed(message, value, old_certificate)?
            }
        };

        if verified {
            tracing::debug!("Response protection verified");
            Ok(())
        } else {
            tracing::warn!("Response protection verification failed");
            Err(CmpError::protocol("response protection verification failed"))
        }
    }

    /// Try each candidate signer key in turn.
    fn verify_signed(
        &self,
        message: &PkiMessage,
        value: &[u8],
        old_certificate: Option<&Certificate>,
    ) -> Result<bool> {
        let keys = self.signer_keys(message, old_certificate);
        if keys.is_empty() {
            return Err(CmpError::protocol(
                "no trusted key available to verify signature-protected response",
            ));
        }

        for key in &keys {
            if verify_signature(&message.header, &message.body, value, key)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn signer_keys(
        &self,
        message: &PkiMessage,
        old_certificate: Option<&Certificate>,
    ) -> Vec<RsaPublicKey> {
        let sender = message.header.sender_name();
        let vouched = message.extra_certs().iter().filter(|cert| {
            Some(&cert.tbs_certificate.subject) == sender
                && self
                    .trust_anchors
                    .iter()
                    .any(|anchor| certificate_signed_by(cert, anchor))
        });

        old_certificate
            .into_iter()
            .chain(self.trust_anchors.iter())
            .chain(vouched)
            .filter_map(|cert| {
                rsa_public_key(&cert.tbs_certificate.subject_public_key_info)
                    .map_err(|e| {
                        tracing::debug!(
                            "Skipping signer candidate '{}': {}",
                            cert.tbs_certificate.subject,
                            e
                        )
                    })
                    .ok()
            })
            .collect()
    }

    fn check_recipient_nonce(&self, message: &PkiMessage, request: &PkiMessage) -> Result<()> {
        if !self.verify_recipient_nonce {
            return Ok(());
        }
        match message.header.recipient_nonce() {
            Some(nonce) if Some(nonce) != request.header.sender_nonce() => {
                Err(CmpError::protocol("recipNonce does not match request senderNonce"))
            }
            _ => Ok(()),
        }
    }
}

fn check_transaction_id(message: &PkiMessage, request: &PkiMessage) -> Result<()> {
    match (message.header.transaction_id(), request.header.transaction_id()) {
        (Some(received), Some(sent)) if received == sent => Ok(()),
        (None, _) => Err(CmpError::protocol("response carries no transactionID")),
        _ => Err(CmpError::protocol(
            "response transactionID does not match request",
        )),
    }
}

/// Reply body for the request, or the CA's error as [`CmpError::Server`].
fn expect_cert_rep<'a>(message: &'a PkiMessage, request: &PkiMessage) -> Result<&'a CertRepMessage> {
    match (&request.body, &message.body) {
        (_, PkiBody::Error(content)) => {
            let reason = content.pki_status_info.text().unwrap_or_default();
            tracing::warn!("Error in the PKIMessage response: {}", reason);
            Err(CmpError::server(reason))
        }
        (PkiBody::Ir(_), PkiBody::Ip(rep))
        | (PkiBody::Cr(_), PkiBody::Cp(rep))
        | (PkiBody::Kur(_), PkiBody::Kup(rep)) => Ok(rep),
        (sent, received) => Err(CmpError::protocol(format!(
            "unexpected response body type {} for request body type {}",
            received.type_number(),
            sent.type_number()
        ))),
    }
}

fn first_response<'a>(rep: &'a CertRepMessage, request: &PkiMessage) -> Result<&'a CertResponse> {
    let response = rep
        .response
        .first()
        .ok_or_else(|| CmpError::protocol("response contains no CertResponse"))?;

    let requested = match &request.body {
        PkiBody::Ir(reqs) | PkiBody::Cr(reqs) | PkiBody::Kur(reqs) => {
            reqs.first().map(|r| r.cert_req.cert_req_id)
        }
        _ => None,
    };
    if requested.is_some_and(|id| id != response.cert_req_id) {
        tracing::warn!(
            "CertResponse certReqId {} differs from request {:?}",
            response.cert_req_id,
            requested
        );
    }
    Ok(response)
}

fn check_status(response: &CertResponse) -> Result<()> {
    let status = response.status.status;
    if status.is_granted() {
        return Ok(());
    }
    let reason = response.status.text().unwrap_or_default();
    tracing::warn!("CA returned status {}: {}", status.as_str(), reason);
    Err(CmpError::server(reason))
}

fn issued_certificate(response: &CertResponse) -> Result<Certificate> {
    match response.certified_key_pair.as_ref().map(|pair| &pair.cert_or_enc_cert) {
        Some(CertOrEncCert::Certificate(certificate)) => Ok(certificate.clone()),
        Some(CertOrEncCert::EncryptedCert(_)) => Err(CmpError::protocol(
            "encrypted certificates are not supported",
        )),
        None => Err(CmpError::protocol("granted response carries no certificate")),
    }
}

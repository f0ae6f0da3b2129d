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

//! Certificate chain extraction.
//!
//! Packages the issued certificate together with the CA certificates the
//! response carried in `extraCerts` and `caPubs`. The chain is followed by
//! issuer name from the leaf, and every link must carry a valid signature
//! from the next certificate up. The root and any CA certificate off that
//! path end up in [`Cmpv2CertificationModel::trusted_roots`].
//!
//! No path validation against a local trust store happens here; whether the
//! returned roots are acceptable is the caller's decision.

use der::EncodePem;
use x509_cert::Certificate;

use crate::error::{CmpError, Result};
use crate::protection::certificate_signed_by;
use crate::validator::ValidatedResponse;

/// Result of a successful certificate request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmpv2CertificationModel {
    entity_certificate: Certificate,
    chain: Vec<Certificate>,
    trusted_roots: Vec<Certificate>,
}

impl Cmpv2CertificationModel {
    /// Assemble a model from its parts.
    pub fn new(
        entity_certificate: Certificate,
        chain: Vec<Certificate>,
        trusted_roots: Vec<Certificate>,
    ) -> Self {
        Self {
            entity_certificate,
            chain,
            trusted_roots,
        }
    }

    /// The newly issued certificate.
    pub fn entity_certificate(&self) -> &Certificate {
        &self.entity_certificate
    }

    /// Intermediate CA certificates, ordered from the leaf's issuer upward.
    pub fn chain(&self) -> &[Certificate] {
        &self.chain
    }

    /// Root and other CA certificates returned by the CA outside the chain.
    pub fn trusted_roots(&self) -> &[Certificate] {
        &self.trusted_roots
    }

    /// Leaf followed by the intermediates.
    pub fn certificate_chain(&self) -> Vec<&Certificate> {
        std::iter::once(&self.entity_certificate)
            .chain(self.chain.iter())
            .collect()
    }

    /// [`Self::certificate_chain`] as PEM strings.
    pub fn certificate_chain_pem(&self) -> Result<Vec<String>> {
        self.certificate_chain().into_iter().map(to_pem).collect()
    }

    /// [`Self::trusted_roots`] as PEM strings.
    pub fn trusted_roots_pem(&self) -> Result<Vec<String>> {
        self.trusted_roots.iter().map(to_pem).collect()
    }

    /// Split into entity certificate, chain, and trusted roots.
    pub fn into_parts(self) -> (Certificate, Vec<Certificate>, Vec<Certificate>) {
        (self.entity_certificate, self.chain, self.trusted_roots)
    }
}

/// Build a [`Cmpv2CertificationModel`] from a validated response.
///
/// Every CA certificate in the response ends up in the model: those on the
/// leaf's issuer path below the root form the chain, everything else is
/// returned in `trusted_roots`. When several certificates share the issuer's
/// subject, the first one whose key verifies the link is taken.
///
/// # Errors
///
/// Returns [`CmpError::Protocol`] if no certificate named as an issuer on the
/// path carries the key that signed the certificate below it.
pub fn extract(validated: &ValidatedResponse) -> Result<Cmpv2CertificationModel> {
    let leaf = validated.certificate();
    let mut pool = collect_ca_certificates(
        validated
            .extra_certs()
            .iter()
            .chain(validated.ca_pubs().iter()),
        leaf,
    );

    let mut chain = Vec::new();
    let mut trusted_roots = Vec::new();
    let mut current = leaf.clone();

    while !is_self_signed(&current) {
        let Some(issuer) = take_issuer(&mut pool, &current)? else {
            tracing::debug!(
                "Issuer '{}' of '{}' not present in response",
                current.tbs_certificate.issuer,
                current.tbs_certificate.subject
            );
            break;
        };
        tracing::debug!(
            "Verified '{}' as issued by '{}'",
            current.tbs_certificate.subject,
            issuer.tbs_certificate.subject
        );

        if is_self_signed(&issuer) {
            trusted_roots.push(issuer);
            break;
        }
        chain.push(issuer.clone());
        current = issuer;
    }

    for certificate in pool {
        if !is_self_signed(&certificate) {
            tracing::debug!(
                "Returning '{}' outside the issuer path as trusted",
                certificate.tbs_certificate.subject
            );
        }
        trusted_roots.push(certificate);
    }

    tracing::debug!(
        "Extracted {} intermediate and {} trusted certificates",
        chain.len(),
        trusted_roots.len()
    );

    Ok(Cmpv2CertificationModel {
        entity_certificate: leaf.clone(),
        chain,
        trusted_roots,
    })
}

/// CA certificates in response order, without duplicates or the leaf itself.
fn collect_ca_certificates<'a>(
    certificates: impl Iterator<Item = &'a Certificate>,
    leaf: &Certificate,
) -> Vec<Certificate> {
    let mut pool: Vec<Certificate> = Vec::new();
    for certificate in certificates {
        if certificate != leaf && !pool.contains(certificate) {
            pool.push(certificate.clone());
        }
    }
    pool
}

/// Remove and return the issuer of `certificate` from `pool`.
fn take_issuer(
    pool: &mut Vec<Certificate>,
    certificate: &Certificate,
) -> Result<Option<Certificate>> {
    let issuer_name = &certificate.tbs_certificate.issuer;
    let mut candidates = pool
        .iter()
        .enumerate()
        .filter(|(_, candidate)| &candidate.tbs_certificate.subject == issuer_name)
        .peekable();

    if candidates.peek().is_none() {
        return Ok(None);
    }
    let signer = candidates
        .find(|(_, candidate)| certificate_signed_by(certificate, candidate))
        .map(|(index, _)| index);
    match signer {
        Some(index) => Ok(Some(pool.remove(index))),
        None => Err(CmpError::protocol(format!(
            "certificate '{}' is not signed by '{}'",
            certificate.tbs_certificate.subject, issuer_name
        ))),
    }
}

fn is_self_signed(certificate: &Certificate) -> bool {
    certificate.tbs_certificate.issuer == certificate.tbs_certificate.subject
}

fn to_pem(certificate: &Certificate) -> Result<String> {
    Ok(certificate.to_pem(der::pem::LineEnding::LF)?)
}

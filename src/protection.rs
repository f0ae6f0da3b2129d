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

//! Message protection (RFC 4210 Section 5.1.3).
//!
//! A CMP message is protected over the DER encoding of
//! `ProtectedPart { header, body }` in one of two ways:
//!
//! - **Signature**: RSA PKCS#1 v1.5 with SHA-256 (or SHA-384/SHA-512 when
//!   verifying) using a private key whose certificate the CA knows.
//! - **Shared secret**: `id-PasswordBasedMac`. A base key is derived by
//!   hashing `secret || salt` repeatedly with the one-way function, then an
//!   HMAC over the protected part is computed with that key.
//!
//! The algorithm is declared in `header.protectionAlg`; verification refuses
//! a message whose declared algorithm belongs to the other family.

use der::asn1::{Any, AnyRef, BitString, OctetString};
use der::Encode;
use hmac::{Hmac, Mac};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use spki::{AlgorithmIdentifierOwned, ObjectIdentifier};
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::error::{CmpError, Result};
use crate::material::rsa_public_key;
use crate::nonce::NonceSource;
use crate::types::message::protected_bytes;
use crate::types::{oid, PbmParameter, PkiBody, PkiHeader};

/// Largest iteration count accepted from a CA.
pub const MAX_ITERATION_COUNT: u32 = 100_000;

/// RSA signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// sha256WithRSAEncryption.
    #[default]
    Sha256WithRsa,
    /// sha384WithRSAEncryption.
    Sha384WithRsa,
    /// sha512WithRSAEncryption.
    Sha512WithRsa,
}

impl SignatureAlgorithm {
    /// Algorithm OID.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            Self::Sha256WithRsa => oid::SHA256_WITH_RSA,
            Self::Sha384WithRsa => oid::SHA384_WITH_RSA,
            Self::Sha512WithRsa => oid::SHA512_WITH_RSA,
        }
    }

    /// Look up an algorithm by OID.
    pub fn from_oid(id: &ObjectIdentifier) -> Option<Self> {
        match *id {
            oid::SHA256_WITH_RSA => Some(Self::Sha256WithRsa),
            oid::SHA384_WITH_RSA => Some(Self::Sha384WithRsa),
            oid::SHA512_WITH_RSA => Some(Self::Sha512WithRsa),
            _ => None,
        }
    }

    /// Identifier with NULL parameters.
    pub fn algorithm_identifier(&self) -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: self.oid(),
            parameters: Some(Any::from(AnyRef::NULL)),
        }
    }

    /// Sign `data` with `key`.
    pub fn sign(&self, key: &RsaPrivateKey, data: &[u8]) -> Result<Vec<u8>> {
        let signature = match self {
            Self::Sha256WithRsa => SigningKey::<Sha256>::new(key.clone())
                .try_sign(data)
                .map(|s| s.to_vec()),
            Self::Sha384WithRsa => SigningKey::<Sha384>::new(key.clone())
                .try_sign(data)
                .map(|s| s.to_vec()),
            Self::Sha512WithRsa => SigningKey::<Sha512>::new(key.clone())
                .try_sign(data)
                .map(|s| s.to_vec()),
        };
        signature.map_err(|e| CmpError::client("RSA signing failed", e))
    }

    /// Returns true if `signature` over `data` verifies under `key`.
    pub fn verify(&self, key: &RsaPublicKey, data: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        match self {
            Self::Sha256WithRsa => VerifyingKey::<Sha256>::new(key.clone())
                .verify(data, &signature)
                .is_ok(),
            Self::Sha384WithRsa => VerifyingKey::<Sha384>::new(key.clone())
                .verify(data, &signature)
                .is_ok(),
            Self::Sha512WithRsa => VerifyingKey::<Sha512>::new(key.clone())
                .verify(data, &signature)
                .is_ok(),
        }
    }
}

/// One-way function of a password-based MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwfAlgorithm {
    /// SHA-1.
    #[default]
    Sha1,
    /// SHA-256.
    Sha256,
}

impl OwfAlgorithm {
    /// Algorithm OID.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            Self::Sha1 => oid::SHA1,
            Self::Sha256 => oid::SHA256,
        }
    }

    /// Look up a one-way function by OID.
    pub fn from_oid(id: &ObjectIdentifier) -> Option<Self> {
        match *id {
            oid::SHA1 => Some(Self::Sha1),
            oid::SHA256 => Some(Self::Sha256),
            _ => None,
        }
    }

    fn digest(&self, input: &[u8]) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(match self {
            Self::Sha1 => Sha1::digest(input).to_vec(),
            Self::Sha256 => Sha256::digest(input).to_vec(),
        })
    }
}

/// MAC of a password-based MAC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacAlgorithm {
    /// HMAC-SHA1.
    #[default]
    HmacSha1,
    /// HMAC-SHA256.
    HmacSha256,
}

impl MacAlgorithm {
    /// Algorithm OID.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            Self::HmacSha1 => oid::HMAC_SHA1,
            Self::HmacSha256 => oid::HMAC_SHA256,
        }
    }

    /// Look up a MAC by OID.
    pub fn from_oid(id: &ObjectIdentifier) -> Option<Self> {
        match *id {
            oid::HMAC_SHA1 => Some(Self::HmacSha1),
            oid::HMAC_SHA256 => Some(Self::HmacSha256),
            _ => None,
        }
    }

    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        let tag = match self {
            Self::HmacSha1 => {
                let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key)
                    .map_err(|_| CmpError::internal("invalid HMAC key length"))?;
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Self::HmacSha256 => {
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
                    .map_err(|_| CmpError::internal("invalid HMAC key length"))?;
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        };
        Ok(tag)
    }

    /// Constant-time comparison of `expected` against the MAC of `data`.
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> Result<bool> {
        let matches = match self {
            Self::HmacSha1 => {
                let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(key)
                    .map_err(|_| CmpError::internal("invalid HMAC key length"))?;
                mac.update(data);
                mac.verify_slice(expected).is_ok()
            }
            Self::HmacSha256 => {
                let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
                    .map_err(|_| CmpError::internal("invalid HMAC key length"))?;
                mac.update(data);
                mac.verify_slice(expected).is_ok()
            }
        };
        Ok(matches)
    }
}

/// How a message exchange is protected.
///
/// The request and its response are protected by the same variant family.
#[derive(Clone)]
pub enum ProtectionContext {
    /// Signature with a private key known to the CA.
    Signature {
        /// Signing key.
        private_key: RsaPrivateKey,
        /// Signature algorithm.
        algorithm: SignatureAlgorithm,
    },
    /// Password-based MAC with a pre-shared secret.
    SharedSecret {
        /// Reference value, sent as `senderKID`.
        reference_value: Vec<u8>,
        /// Shared secret.
        key: Zeroizing<Vec<u8>>,
        /// One-way function.
        owf: OwfAlgorithm,
        /// MAC algorithm.
        mac: MacAlgorithm,
        /// Number of one-way function rounds.
        iteration_count: u32,
        /// Salt.
        salt: Vec<u8>,
    },
}

impl std::fmt::Debug for ProtectionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Signature { algorithm, .. } => f
                .debug_struct("Signature")
                .field("private_key", &"<redacted>")
                .field("algorithm", algorithm)
                .finish(),
            Self::SharedSecret {
                owf,
                mac,
                iteration_count,
                ..
            } => f
                .debug_struct("SharedSecret")
                .field("key", &"<redacted>")
                .field("owf", owf)
                .field("mac", mac)
                .field("iteration_count", iteration_count)
                .finish(),
        }
    }
}

impl ProtectionContext {
    /// SHA-256-with-RSA signature protection.
    pub fn signature(private_key: RsaPrivateKey) -> Self {
        Self::Signature {
            private_key,
            algorithm: SignatureAlgorithm::Sha256WithRsa,
        }
    }

    /// Password-based MAC with SHA-1 / HMAC-SHA1, a fresh salt, and a random
    /// iteration count.
    pub fn shared_secret(
        reference_value: impl Into<Vec<u8>>,
        key: impl Into<Vec<u8>>,
        nonce: &dyn NonceSource,
    ) -> Self {
        Self::SharedSecret {
            reference_value: reference_value.into(),
            key: Zeroizing::new(key.into()),
            owf: OwfAlgorithm::Sha1,
            mac: MacAlgorithm::HmacSha1,
            iteration_count: nonce.iteration_count(),
            salt: nonce.salt(),
        }
    }

    /// Returns true for the shared-secret family.
    pub fn is_shared_secret(&self) -> bool {
        matches!(self, Self::SharedSecret { .. })
    }

    /// Value for `header.protectionAlg`.
    pub fn algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        match self {
            Self::Signature { algorithm, .. } => Ok(algorithm.algorithm_identifier()),
            Self::SharedSecret {
                owf,
                mac,
                iteration_count,
                salt,
                ..
            } => PbmParameter {
                salt: OctetString::new(salt.clone())?,
                owf: AlgorithmIdentifierOwned {
                    oid: owf.oid(),
                    parameters: None,
                },
                iteration_count: *iteration_count,
                mac: AlgorithmIdentifierOwned {
                    oid: mac.oid(),
                    parameters: None,
                },
            }
            .to_algorithm_identifier(),
        }
    }

    /// Value for `header.senderKID`, if this variant has one.
    pub fn sender_kid(&self) -> Option<&[u8]> {
        match self {
            Self::Signature { .. } => None,
            Self::SharedSecret {
                reference_value, ..
            } => Some(reference_value.as_slice()),
        }
    }

    /// Compute the protection value over `header` and `body`.
    pub fn protect(&self, header: &PkiHeader, body: &PkiBody) -> Result<BitString> {
        let data = protected_bytes(header, body)?;
        let value = match self {
            Self::Signature {
                private_key,
                algorithm,
            } => algorithm.sign(private_key, &data)?,
            Self::SharedSecret {
                key,
                owf,
                mac,
                iteration_count,
                salt,
                ..
            } => {
                let base_key = derive_base_key(key, salt, *owf, *iteration_count);
                mac.compute(&base_key, &data)?
            }
        };
        Ok(BitString::from_bytes(&value)?)
    }

    /// Check `protection` over `header` and `body`.
    ///
    /// For the signature family the context's own public key is used; see
    /// [`verify_signature`] to check against another key. For the
    /// shared-secret family the PBM parameters are read from the header, as
    /// the counterpart picks its own salt and iteration count.
    ///
    /// # Errors
    ///
    /// Returns [`CmpError::Protocol`] if the header declares no protection
    /// algorithm, or one from the other family, or one this client does not
    /// implement.
    pub fn verify(&self, header: &PkiHeader, body: &PkiBody, protection: &[u8]) -> Result<bool> {
        match self {
            Self::Signature { private_key, .. } => {
                verify_signature(header, body, protection, &RsaPublicKey::from(private_key))
            }
            Self::SharedSecret { key, .. } => verify_shared_secret(header, body, protection, key),
        }
    }
}

/// Check a signature-protected message against `public_key`.
pub fn verify_signature(
    header: &PkiHeader,
    body: &PkiBody,
    protection: &[u8],
    public_key: &RsaPublicKey,
) -> Result<bool> {
    let declared = declared_algorithm(header)?;
    let algorithm = SignatureAlgorithm::from_oid(&declared.oid).ok_or_else(|| {
        CmpError::protocol(format!(
            "protection algorithm {} does not match signature protection",
            declared.oid
        ))
    })?;
    let data = protected_bytes(header, body)?;
    Ok(algorithm.verify(public_key, &data, protection))
}

/// Check a password-based-MAC-protected message against `secret`.
pub fn verify_shared_secret(
    header: &PkiHeader,
    body: &PkiBody,
    protection: &[u8],
    secret: &[u8],
) -> Result<bool> {
    let declared = declared_algorithm(header)?;
    if declared.oid != oid::PASSWORD_BASED_MAC {
        return Err(CmpError::protocol(format!(
            "protection algorithm {} does not match shared-secret protection",
            declared.oid
        )));
    }
    let params = PbmParameter::from_algorithm_identifier(declared)?;
    let owf = OwfAlgorithm::from_oid(&params.owf.oid).ok_or_else(|| {
        CmpError::protocol(format!("unsupported PBM one-way function {}", params.owf.oid))
    })?;
    let mac = MacAlgorithm::from_oid(&params.mac.oid).ok_or_else(|| {
        CmpError::protocol(format!("unsupported PBM MAC {}", params.mac.oid))
    })?;
    if params.iteration_count == 0 || params.iteration_count > MAX_ITERATION_COUNT {
        return Err(CmpError::protocol(format!(
            "PBM iteration count {} out of range",
            params.iteration_count
        )));
    }

    let data = protected_bytes(header, body)?;
    let base_key = derive_base_key(secret, params.salt.as_bytes(), owf, params.iteration_count);
    mac.verify(&base_key, &data, protection)
}

/// Returns true if `certificate` carries a valid RSA signature made with the
/// key of `issuer`.
pub fn certificate_signed_by(certificate: &Certificate, issuer: &Certificate) -> bool {
    let Some(algorithm) = SignatureAlgorithm::from_oid(&certificate.signature_algorithm.oid) else {
        return false;
    };
    let Ok(key) = rsa_public_key(&issuer.tbs_certificate.subject_public_key_info) else {
        return false;
    };
    let (Ok(tbs), Some(signature)) = (
        certificate.tbs_certificate.to_der(),
        certificate.signature.as_bytes(),
    ) else {
        return false;
    };
    algorithm.verify(&key, &tbs, signature)
}

fn declared_algorithm(header: &PkiHeader) -> Result<&AlgorithmIdentifierOwned> {
    header
        .protection_alg
        .as_ref()
        .ok_or_else(|| CmpError::protocol("message does not declare a protection algorithm"))
}

fn derive_base_key(
    secret: &[u8],
    salt: &[u8],
    owf: OwfAlgorithm,
    iteration_count: u32,
) -> Zeroizing<Vec<u8>> {
    let mut value = Zeroizing::new([secret, salt].concat());
    for _ in 0..iteration_count {
        value = owf.digest(&value);
    }
    value
}

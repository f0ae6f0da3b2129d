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

//! PKIMessage envelope (RFC 4210 Section 5.1).
//!
//! ```text
//! PKIMessage ::= SEQUENCE {
//!     header           PKIHeader,
//!     body             PKIBody,
//!     protection   [0] PKIProtection OPTIONAL,
//!     extraCerts   [1] SEQUENCE SIZE (1..MAX) OF CMPCertificate OPTIONAL }
//!
//! ProtectedPart ::= SEQUENCE {
//!     header    PKIHeader,
//!     body      PKIBody }
//! ```

use der::asn1::BitString;
use der::{Decode, Encode, Sequence};
use x509_cert::Certificate;

use super::body::PkiBody;
use super::header::PkiHeader;
use crate::error::{CmpError, Result};

/// A complete CMP message.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct PkiMessage {
    pub header: PkiHeader,
    pub body: PkiBody,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub protection: Option<BitString>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub extra_certs: Option<Vec<Certificate>>,
}

impl PkiMessage {
    /// Parse a DER-encoded message.
    ///
    /// # Errors
    ///
    /// Returns [`CmpError::Protocol`] if the bytes are not a CMP message this
    /// client understands.
    pub fn parse(der_bytes: &[u8]) -> Result<Self> {
        Self::from_der(der_bytes)
            .map_err(|e| CmpError::protocol(format!("malformed PKIMessage: {}", e)))
    }

    /// DER bytes of the `ProtectedPart` for this message.
    pub fn protected_bytes(&self) -> Result<Vec<u8>> {
        protected_bytes(&self.header, &self.body)
    }

    /// Protection value bytes.
    pub fn protection_bytes(&self) -> Option<&[u8]> {
        self.protection.as_ref().map(BitString::raw_bytes)
    }

    /// Extra certificates, empty if absent.
    pub fn extra_certs(&self) -> &[Certificate] {
        self.extra_certs.as_deref().unwrap_or(&[])
    }
}

/// The part of a message covered by its protection.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct ProtectedPart {
    pub header: PkiHeader,
    pub body: PkiBody,
}

/// DER-encode `ProtectedPart { header, body }`.
pub fn protected_bytes(header: &PkiHeader, body: &PkiBody) -> Result<Vec<u8>> {
    let part = ProtectedPart {
        header: header.clone(),
        body: body.clone(),
    };
    Ok(part.to_der()?)
}

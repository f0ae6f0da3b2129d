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

//! PKIHeader (RFC 4210 Section 5.1.1).
//!
//! ```text
//! PKIHeader ::= SEQUENCE {
//!     pvno                INTEGER     { cmp1999(1), cmp2000(2) },
//!     sender              GeneralName,
//!     recipient           GeneralName,
//!     messageTime     [0] GeneralizedTime         OPTIONAL,
//!     protectionAlg   [1] AlgorithmIdentifier     OPTIONAL,
//!     senderKID       [2] KeyIdentifier           OPTIONAL,
//!     recipKID        [3] KeyIdentifier           OPTIONAL,
//!     transactionID   [4] OCTET STRING            OPTIONAL,
//!     senderNonce     [5] OCTET STRING            OPTIONAL,
//!     recipNonce      [6] OCTET STRING            OPTIONAL,
//!     freeText        [7] PKIFreeText             OPTIONAL,
//!     generalInfo     [8] SEQUENCE SIZE (1..MAX) OF
//!                         InfoTypeAndValue        OPTIONAL
//! }
//! ```

use der::asn1::{Any, AnyRef, GeneralizedTime, ObjectIdentifier, OctetString};
use der::{Enumerated, Sequence};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;

use super::oid;

/// CMP protocol version.
#[derive(Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord, Enumerated)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
pub enum Pvno {
    /// RFC 2510.
    Cmp1999 = 1,
    /// RFC 4210.
    Cmp2000 = 2,
}

/// Header shared by every CMP message.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct PkiHeader {
    pub pvno: Pvno,
    pub sender: GeneralName,
    pub recipient: GeneralName,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    pub message_time: Option<GeneralizedTime>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    pub protection_alg: Option<AlgorithmIdentifierOwned>,
    #[asn1(context_specific = "2", tag_mode = "EXPLICIT", optional = "true")]
    pub sender_kid: Option<OctetString>,
    #[asn1(context_specific = "3", tag_mode = "EXPLICIT", optional = "true")]
    pub recip_kid: Option<OctetString>,
    #[asn1(context_specific = "4", tag_mode = "EXPLICIT", optional = "true")]
    pub trans_id: Option<OctetString>,
    #[asn1(context_specific = "5", tag_mode = "EXPLICIT", optional = "true")]
    pub sender_nonce: Option<OctetString>,
    #[asn1(context_specific = "6", tag_mode = "EXPLICIT", optional = "true")]
    pub recip_nonce: Option<OctetString>,
    #[asn1(context_specific = "7", tag_mode = "EXPLICIT", optional = "true")]
    pub free_text: Option<Vec<String>>,
    #[asn1(context_specific = "8", tag_mode = "EXPLICIT", optional = "true")]
    pub general_info: Option<Vec<InfoTypeAndValue>>,
}

impl PkiHeader {
    /// Create a cmp2000 header between two directory names.
    pub fn new(sender: Name, recipient: Name) -> Self {
        Self {
            pvno: Pvno::Cmp2000,
            sender: GeneralName::DirectoryName(sender),
            recipient: GeneralName::DirectoryName(recipient),
            message_time: None,
            protection_alg: None,
            sender_kid: None,
            recip_kid: None,
            trans_id: None,
            sender_nonce: None,
            recip_nonce: None,
            free_text: None,
            general_info: None,
        }
    }

    /// Transaction identifier bytes.
    pub fn transaction_id(&self) -> Option<&[u8]> {
        self.trans_id.as_ref().map(OctetString::as_bytes)
    }

    /// Sender nonce bytes.
    pub fn sender_nonce(&self) -> Option<&[u8]> {
        self.sender_nonce.as_ref().map(OctetString::as_bytes)
    }

    /// Recipient nonce bytes.
    pub fn recipient_nonce(&self) -> Option<&[u8]> {
        self.recip_nonce.as_ref().map(OctetString::as_bytes)
    }

    /// Sender as a directory name, if it is one.
    pub fn sender_name(&self) -> Option<&Name> {
        match &self.sender {
            GeneralName::DirectoryName(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true if `generalInfo` carries `implicitConfirm`.
    pub fn has_implicit_confirm(&self) -> bool {
        self.general_info
            .iter()
            .flatten()
            .any(|info| info.info_type == oid::IMPLICIT_CONFIRM)
    }
}

/// One `generalInfo` entry.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct InfoTypeAndValue {
    pub info_type: ObjectIdentifier,
    pub info_value: Option<Any>,
}

impl InfoTypeAndValue {
    /// `implicitConfirm` with a NULL value.
    pub fn implicit_confirm() -> Self {
        Self {
            info_type: oid::IMPLICIT_CONFIRM,
            info_value: Some(Any::from(AnyRef::NULL)),
        }
    }
}

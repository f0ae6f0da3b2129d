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

//! CMP message types.
//!
//! Plain ASN.1 data structures for the parts of RFC 4210 (CMP) and RFC 4211
//! (CRMF) this client sends and receives. Every structure derives its DER
//! encoding; there is no behaviour beyond small accessors.

pub mod body;
pub mod crmf;
pub mod header;
pub mod message;
pub mod pbm;
pub mod status;

pub use body::{
    CertOrEncCert, CertRepMessage, CertResponse, CertifiedKeyPair, ErrorMsgContent, PkiBody,
};
pub use crmf::{
    CertReqMsg, CertRequest, CertTemplate, OptionalValidity, PopoSigningKey, ProofOfPossession,
};
pub use header::{InfoTypeAndValue, PkiHeader, Pvno};
pub use message::{PkiMessage, ProtectedPart};
pub use pbm::PbmParameter;
pub use status::{PkiStatus, PkiStatusInfo};

/// HTTP content type for DER-encoded CMP messages (RFC 6712).
pub const CONTENT_TYPE_PKIXCMP: &str = "application/pkixcmp";

/// Object identifiers used in CMP messages.
pub mod oid {
    use const_oid::ObjectIdentifier;

    /// id-PasswordBasedMac (RFC 4211 Section 4.4).
    pub const PASSWORD_BASED_MAC: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113533.7.66.13");

    /// id-sha1.
    pub const SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");

    /// id-sha256.
    pub const SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");

    /// hmac-sha1 (RFC 2202 / RFC 3370).
    pub const HMAC_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.8.1.2");

    /// id-hmacWithSHA256.
    pub const HMAC_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.2.9");

    /// sha256WithRSAEncryption.
    pub const SHA256_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");

    /// sha384WithRSAEncryption.
    pub const SHA384_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");

    /// sha512WithRSAEncryption.
    pub const SHA512_WITH_RSA: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

    /// id-it-implicitConfirm (RFC 4210 Section 5.1.1.1).
    pub const IMPLICIT_CONFIRM: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.4.13");
}

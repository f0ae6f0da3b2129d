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

//! PKIStatusInfo (RFC 4210 Section 5.2.3).

use der::asn1::BitString;
use der::{Enumerated, Sequence};

/// Outcome code of a CMP request.
#[derive(Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord, Enumerated)]
#[asn1(type = "INTEGER")]
#[repr(u8)]
#[allow(missing_docs)]
pub enum PkiStatus {
    Accepted = 0,
    GrantedWithMods = 1,
    Rejection = 2,
    Waiting = 3,
    RevocationWarning = 4,
    RevocationNotification = 5,
    KeyUpdateWarning = 6,
}

impl PkiStatus {
    /// Returns true if a certificate was granted.
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Accepted | Self::GrantedWithMods)
    }

    /// Human-readable status name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::GrantedWithMods => "grantedWithMods",
            Self::Rejection => "rejection",
            Self::Waiting => "waiting",
            Self::RevocationWarning => "revocationWarning",
            Self::RevocationNotification => "revocationNotification",
            Self::KeyUpdateWarning => "keyUpdateWarning",
        }
    }
}

/// Status plus optional free text and failure bits.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct PkiStatusInfo {
    pub status: PkiStatus,
    pub status_string: Option<Vec<String>>,
    pub fail_info: Option<BitString>,
}

impl PkiStatusInfo {
    /// Status without text.
    pub fn new(status: PkiStatus) -> Self {
        Self {
            status,
            status_string: None,
            fail_info: None,
        }
    }

    /// Status with a single free-text line.
    pub fn with_text(status: PkiStatus, text: impl Into<String>) -> Self {
        Self {
            status,
            status_string: Some(vec![text.into()]),
            fail_info: None,
        }
    }

    /// First free-text line, if any.
    pub fn text(&self) -> Option<&str> {
        self.status_string
            .as_ref()
            .and_then(|lines| lines.first())
            .map(String::as_str)
    }
}

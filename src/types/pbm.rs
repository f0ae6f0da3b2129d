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

//! Password-based MAC parameters (RFC 4211 Section 4.4).
//!
//! ```text
//! PBMParameter ::= SEQUENCE {
//!     salt             OCTET STRING,
//!     owf              AlgorithmIdentifier,
//!     iterationCount   INTEGER,
//!     mac              AlgorithmIdentifier }
//! ```

use der::asn1::{Any, OctetString};
use der::{Decode, Encode, Sequence};
use spki::AlgorithmIdentifierOwned;

use super::oid;
use crate::error::{CmpError, Result};

/// Parameters of the `id-PasswordBasedMac` protection algorithm.
#[derive(Clone, Debug, Eq, PartialEq, Sequence)]
#[allow(missing_docs)]
pub struct PbmParameter {
    pub salt: OctetString,
    pub owf: AlgorithmIdentifierOwned,
    pub iteration_count: u32,
    pub mac: AlgorithmIdentifierOwned,
}

impl PbmParameter {
    /// Wrap these parameters in a `protectionAlg` identifier.
    pub fn to_algorithm_identifier(&self) -> Result<AlgorithmIdentifierOwned> {
        Ok(AlgorithmIdentifierOwned {
            oid: oid::PASSWORD_BASED_MAC,
            parameters: Some(Any::from_der(&self.to_der()?)?),
        })
    }

    /// Read the parameters out of a `protectionAlg` identifier.
    ///
    /// # Errors
    ///
    /// Returns [`CmpError::Protocol`] if the identifier is not
    /// `id-PasswordBasedMac` or carries no parameters.
    pub fn from_algorithm_identifier(alg: &AlgorithmIdentifierOwned) -> Result<Self> {
        if alg.oid != oid::PASSWORD_BASED_MAC {
            return Err(CmpError::protocol(format!(
                "expected PasswordBasedMac protection, got {}",
                alg.oid
            )));
        }
        let params = alg
            .parameters
            .as_ref()
            .ok_or_else(|| CmpError::protocol("PasswordBasedMac without PBMParameter"))?;

        Self::from_der(&params.to_der()?)
            .map_err(|e| CmpError::protocol(format!("malformed PBMParameter: {}", e)))
    }
}

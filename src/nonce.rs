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

//! Random values for transaction identifiers, nonces, and PBM salts.

use rand::rngs::OsRng;
use rand::RngCore;

/// Length of transaction identifiers and nonces, in bytes.
pub const NONCE_LENGTH: usize = 16;

/// Length of a PBM salt, in bytes.
pub const SALT_LENGTH: usize = 16;

/// Lowest PBM iteration count handed out.
pub const MIN_ITERATION_COUNT: u32 = 1000;

/// Source of randomness for message construction.
///
/// Implementations must be cryptographically secure outside of tests.
pub trait NonceSource: Send + Sync {
    /// Fill `dest` with random bytes.
    fn fill(&self, dest: &mut [u8]);

    /// Fresh transaction identifier or nonce.
    fn nonce(&self) -> Vec<u8> {
        let mut value = vec![0u8; NONCE_LENGTH];
        self.fill(&mut value);
        value
    }

    /// Fresh PBM salt.
    fn salt(&self) -> Vec<u8> {
        let mut value = vec![0u8; SALT_LENGTH];
        self.fill(&mut value);
        value
    }

    /// PBM iteration count in `[1000, 1999]`.
    fn iteration_count(&self) -> u32 {
        MIN_ITERATION_COUNT + self.next_u32() % 1000
    }

    /// Non-negative certificate request identifier.
    fn cert_req_id(&self) -> i64 {
        i64::from(self.next_u32() >> 1)
    }

    /// Random 32-bit value.
    fn next_u32(&self) -> u32 {
        let mut buf = [0u8; 4];
        self.fill(&mut buf);
        u32::from_be_bytes(buf)
    }
}

/// Operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsNonceSource;

impl NonceSource for OsNonceSource {
    fn fill(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

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

//! # usg-cmpv2-client
//!
//! A Rust implementation of an RFC 4210 CMPv2 (Certificate Management Protocol)
//! client for issuing and renewing X.509 certificates.
//!
//! The client builds CRMF certificate requests from a PKCS#10 CSR, protects
//! them with either a pre-shared secret (IAK/RV, password-based MAC) or an
//! RSA signature, POSTs them to the CA over HTTP, and verifies the CA's reply
//! before handing back the issued certificate and its chain.
//!
//! ## Features
//!
//! - **Async-first design** using Tokio
//! - **Three flows**: initialization (`ir`), certification (`cr`), key update (`kur`),
//!   with renewal choosing between `kur` and `cr` from the new CSR
//! - **Both protection families**: PBM (SHA-1/SHA-256, HMAC) and SHA-256-with-RSA
//! - **Strict response checks**: transaction binding, protection, nonce, and status
//! - **Chain extraction** from `extraCerts` and `caPubs`, with link signatures checked
//! - **Optional TLS** with explicit trust anchors and client certificates
//!
//! ## Quick Start
//!
//! ```no_run
//! use usg_cmpv2_client::{
//!     Authentication, CmpClient, CmpClientConfig, Cmpv2Server, CsrModel, RequestedValidity,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CmpClientConfig::builder()
//!         .timeout(std::time::Duration::from_secs(10))
//!         .build()?;
//!     let client = CmpClient::new(config).await?;
//!
//!     let server = Cmpv2Server::new(
//!         "ManagementCA",
//!         "http://ca.example.com/ejbca/publicweb/cmp/cmp",
//!         "CN=ManagementCA",
//!         Authentication::new("mypassword", "mypassword-rv"),
//!     )?;
//!
//!     let csr = CsrModel::new(&std::fs::read("client.csr")?, &std::fs::read("client.key")?)?;
//!     let model = client
//!         .initialization_request(&csr, &server, RequestedValidity::default())
//!         .await?;
//!
//!     for pem in model.certificate_chain_pem()? {
//!         println!("{}", pem);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Certificate Renewal
//!
//! ```no_run
//! use usg_cmpv2_client::{CertificateUpdateModel, CmpClient, Cmpv2Server};
//!
//! # async fn example(client: &CmpClient, server: &Cmpv2Server) -> Result<(), Box<dyn std::error::Error>> {
//! let update = CertificateUpdateModel::from_bytes(
//!     &std::fs::read("new.csr")?,
//!     &std::fs::read("new.key")?,
//!     &std::fs::read("current.pem")?,
//!     &std::fs::read("current.key")?,
//! )?;
//!
//! // Sends a key update request, or a certification request if the identity changed
//! let model = client.update_request(&update, server).await?;
//! println!("Renewed: {}", model.entity_certificate().tbs_certificate.subject);
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every failure is a [`CmpError`]. The classification helpers separate bad
//! caller input ([`CmpError::is_client_input`]), transport failures
//! ([`CmpError::is_transport`]), untrusted or unparseable responses
//! ([`CmpError::is_protocol`]), and CA rejections
//! ([`CmpError::is_server_rejection`]). No operation retries internally.
//!
//! ## RFC Compliance
//!
//! This library implements:
//! - RFC 4210 Section 5.1: PKI message header, body, and protection
//! - RFC 4210 Section 5.3.1-5.3.6: `ir`/`ip`, `cr`/`cp`, `kur`/`kup`
//! - RFC 4211: CertTemplate and signature-based proof-of-possession
//! - RFC 4211 Section 4.4: password-based MAC
//! - RFC 6712: CMP over HTTP

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod assembler;
pub mod client;
pub mod config;
pub mod error;
pub mod extractor;
pub mod material;
pub mod nonce;
pub mod protection;
pub mod tls;
pub mod transport;
pub mod types;
pub mod validator;

// Re-export main types at crate root for convenience
pub use assembler::{MessageAssembler, RequestedValidity};
pub use client::CmpClient;
pub use config::{
    Authentication, CaMode, ClientIdentity, CmpClientConfig, CmpClientConfigBuilder,
    Cmpv2Server, CrProtection, TrustAnchors,
};
pub use error::{CmpError, MaterialKind, Result};
pub use extractor::Cmpv2CertificationModel;
pub use material::{CertificateUpdateModel, CsrModel, OldCertificateModel};
pub use nonce::{NonceSource, OsNonceSource};
pub use protection::ProtectionContext;
pub use transport::{CmpTransport, HttpTransport};
pub use validator::{ResponseValidator, ValidatedResponse};

// Re-export x509_cert::Certificate for convenience
pub use x509_cert::Certificate;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent string for HTTP requests.
pub const USER_AGENT: &str = concat!("usg-cmpv2-client/", env!("CARGO_PKG_VERSION"));

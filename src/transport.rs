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

//! CMP over HTTP (RFC 6712).
//!
//! A request is one POST of the DER-encoded PKIMessage with content type
//! `application/pkixcmp`; the response body is the DER of the reply, at most
//! [`MAX_RESPONSE_SIZE`] bytes. No retries are attempted.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use url::Url;

use crate::config::CmpClientConfig;
use crate::error::{CmpError, Result};
use crate::tls::build_http_client;
use crate::types::CONTENT_TYPE_PKIXCMP;

/// Largest response body accepted from a CA.
pub const MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Delivers an encoded request to a CA and returns the encoded response.
///
/// Implementations report transport failures as [`CmpError::Http`],
/// [`CmpError::HttpStatus`], [`CmpError::Timeout`], or [`CmpError::Tls`].
/// [`HttpTransport`] refuses an oversized body with [`CmpError::Protocol`].
#[async_trait]
pub trait CmpTransport: Send + Sync {
    /// Send `body` to `url` and return the response body.
    async fn send(&self, url: &Url, body: Vec<u8>) -> Result<Vec<u8>>;
}

/// HTTP(S) transport backed by reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport from client configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if TLS configuration fails.
    pub fn new(config: &CmpClientConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(config)?,
            timeout: config.timeout,
        })
    }

    /// Configured per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn post(&self, url: &Url, body: Vec<u8>) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, CONTENT_TYPE_PKIXCMP)
            .header(ACCEPT, CONTENT_TYPE_PKIXCMP)
            .body(body)
            .send()
            .await?;

        let response = handle_error_response(response).await?;
        read_body(response, MAX_RESPONSE_SIZE).await
    }
}

#[async_trait]
impl CmpTransport for HttpTransport {
    async fn send(&self, url: &Url, body: Vec<u8>) -> Result<Vec<u8>> {
        tracing::debug!("POST {} ({} bytes)", url, body.len());

        let response = tokio::time::timeout(self.timeout, self.post(url, body))
            .await
            .map_err(|_| CmpError::Timeout(self.timeout))??;

        tracing::debug!("Received {} bytes from {}", response.len(), url);
        Ok(response)
    }
}

/// Read the response body, refusing anything larger than `limit` bytes.
async fn read_body(mut response: reqwest::Response, limit: usize) -> Result<Vec<u8>> {
    let too_large = || CmpError::protocol(format!("response body exceeds {} bytes", limit));

    if response
        .content_length()
        .is_some_and(|length| length > limit as u64)
    {
        return Err(too_large());
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(too_large());
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

/// Turn a non-2xx response into [`CmpError::HttpStatus`].
async fn handle_error_response(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .ok()
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    Err(CmpError::http_status(status.as_u16(), message))
}

//! Error types for the CMPv2 client.
//!
//! This module defines all error types that can occur while issuing or
//! renewing certificates, including malformed input material, transport
//! failures, untrusted or unparseable CA responses, and CA-side rejections.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`CmpError`].
pub type Result<T> = std::result::Result<T, CmpError>;

/// Which piece of caller-supplied material failed to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    /// PKCS#10 certificate signing request.
    Csr,
    /// PKCS#8 private key.
    PrivateKey,
    /// Previously issued X.509 certificate.
    Certificate,
}

impl std::fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Csr => write!(f, "CSR"),
            Self::PrivateKey => write!(f, "private key"),
            Self::Certificate => write!(f, "certificate"),
        }
    }
}

/// Errors that can occur during CMPv2 client operations.
#[derive(Debug, Error)]
pub enum CmpError {
    /// Caller-supplied CSR, key, or certificate could not be decoded.
    #[error("Cannot decode {input}: {message}")]
    Decryption {
        /// Which input was malformed.
        input: MaterialKind,
        /// Description of the failure.
        message: String,
    },

    /// Client configuration or request parameters are invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// TLS configuration error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// HTTP request or connection error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// CA endpoint answered with a non-2xx HTTP status.
    #[error("HTTP status {status} from CA: {message}")]
    HttpStatus {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
    },

    /// No response arrived within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// CA response could not be trusted or understood.
    #[error("CMP protocol error: {0}")]
    Protocol(String),

    /// DER encoding/decoding error.
    #[error("DER error: {0}")]
    Der(#[from] der::Error),

    /// CA processed the request and refused it.
    #[error("CMP server error: {reason}")]
    Server {
        /// Free-text reason supplied by the CA, or "N/A".
        reason: String,
    },

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Unexpected failure wrapped with its original cause.
    #[error("CMP client error: {message}")]
    Client {
        /// Context for the failure.
        message: String,
        /// Underlying cause.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl CmpError {
    /// Create a decryption error for the given input.
    pub fn decryption(input: MaterialKind, msg: impl Into<String>) -> Self {
        Self::Decryption {
            input,
            message: msg.into(),
        }
    }

    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a TLS error with the given message.
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Create an HTTP status error.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            message: message.into(),
        }
    }

    /// Create a protocol error with the given message.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a CA rejection error. An empty reason is reported as "N/A".
    pub fn server(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::Server {
            reason: if reason.is_empty() {
                "N/A".to_string()
            } else {
                reason
            },
        }
    }

    /// Wrap an unexpected failure, keeping its cause.
    pub fn client<E>(msg: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Client {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Unexpected failure without an underlying error value.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Client {
            message: msg.into(),
            source: None,
        }
    }

    /// Returns true if no interpretable CMP response was obtained.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::HttpStatus { .. } | Self::Timeout(_) | Self::Tls(_)
        )
    }

    /// Returns true if the CA response could not be trusted or parsed.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Der(_))
    }

    /// Returns true if the CA refused the request.
    pub fn is_server_rejection(&self) -> bool {
        matches!(self, Self::Server { .. })
    }

    /// Returns true if the caller supplied bad material or parameters.
    pub fn is_client_input(&self) -> bool {
        matches!(self, Self::Decryption { .. } | Self::Config(_) | Self::Url(_))
    }

    /// Returns the CA's reason text for a rejection.
    pub fn server_reason(&self) -> Option<&str> {
        match self {
            Self::Server { reason } => Some(reason),
            _ => None,
        }
    }
}

// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::fmt;
use thiserror::Error;

/// The error type for sigproxy operations
#[derive(Error, Debug)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
}

/// The kind of error that occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request body supplied by the caller is not validly encoded.
    MalformedBody,

    /// No credential could be resolved for signing.
    CredentialsUnavailable,

    /// Credentials exist but are invalid/malformed
    CredentialInvalid,

    /// Request cannot be built or signed (bad method, url, header, etc.)
    RequestInvalid,

    /// Configuration error (missing fields, invalid values)
    ConfigInvalid,

    /// Connection to the remote host could not be established.
    Connect,

    /// The connection was established but reading the response failed or timed out.
    ReadTimeout,

    /// Redirect budget exhausted.
    TooManyRedirects,

    /// Retry budget for a retryable status exhausted.
    RetryExhausted,

    /// The response claims a media type whose payload could not be parsed.
    MalformedResponseBody,

    /// Unexpected errors (I/O, service errors, etc.)
    Unexpected,
}

impl Error {
    /// Create a new error with the given kind and message
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Get the error message without the kind prefix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Check if this is a credential error
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::CredentialsUnavailable | ErrorKind::CredentialInvalid
        )
    }

    /// Check if this error happened while talking to the remote host.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Connect
                | ErrorKind::ReadTimeout
                | ErrorKind::TooManyRedirects
                | ErrorKind::RetryExhausted
        )
    }
}

// Convenience constructors
impl Error {
    /// Create a malformed body error
    pub fn malformed_body(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedBody, message)
    }

    /// Create a credentials unavailable error
    pub fn credentials_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialsUnavailable, message)
    }

    /// Create a credential invalid error
    pub fn credential_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialInvalid, message)
    }

    /// Create a request invalid error
    pub fn request_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestInvalid, message)
    }

    /// Create a config invalid error
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a connect error
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connect, message)
    }

    /// Create a read timeout error
    pub fn read_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReadTimeout, message)
    }

    /// Create a too many redirects error
    pub fn too_many_redirects(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TooManyRedirects, message)
    }

    /// Create a retry exhausted error
    pub fn retry_exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RetryExhausted, message)
    }

    /// Create a malformed response body error
    pub fn malformed_response_body(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponseBody, message)
    }

    /// Create an unexpected error
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::MalformedBody => write!(f, "malformed request body"),
            ErrorKind::CredentialsUnavailable => write!(f, "credentials unavailable"),
            ErrorKind::CredentialInvalid => write!(f, "invalid credentials"),
            ErrorKind::RequestInvalid => write!(f, "invalid request"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::Connect => write!(f, "connect error"),
            ErrorKind::ReadTimeout => write!(f, "read error"),
            ErrorKind::TooManyRedirects => write!(f, "too many redirects"),
            ErrorKind::RetryExhausted => write!(f, "retries exhausted"),
            ErrorKind::MalformedResponseBody => write!(f, "malformed response body"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::method::InvalidMethod> for Error {
    fn from(err: http::method::InvalidMethod) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

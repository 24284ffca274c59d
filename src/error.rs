//
// Copyright (c) 2024, 2025 Oracle and/or its affiliates. All rights reserved.
//
// Licensed under the Universal Permissive License v 1.0 as shown at
//  https://oss.oracle.com/licenses/upl/
//
use num_enum::TryFromPrimitive;

include!(concat!(env!("OUT_DIR"), "/ua.rs"));

pub(crate) fn sdk_version() -> &'static str {
    SDK_VERSION
}

pub(crate) fn user_agent() -> &'static str {
    USER_AGENT
}

/// The error type returned by every operation in this crate.
#[derive(Debug, Clone)]
pub struct NoSQLError {
    pub code: NoSQLErrorCode,
    pub message: String,
}

impl std::error::Error for NoSQLError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

impl std::fmt::Display for NoSQLError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "code={:?} message=\"{}\"", self.code, self.message)
    }
}

impl NoSQLError {
    pub fn new(code: NoSQLErrorCode, msg: &str) -> NoSQLError {
        NoSQLError {
            code,
            message: msg.to_string(),
        }
    }

    pub fn from_int(icode: i32, msg: &str) -> NoSQLError {
        if let Ok(code) = NoSQLErrorCode::try_from(icode) {
            return NoSQLError {
                code,
                message: msg.to_string(),
            };
        }
        NoSQLError {
            code: NoSQLErrorCode::UnknownError,
            message: format!("Invalid integer error code {}", icode),
        }
    }

    /// True if a request that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.code,
            NoSQLErrorCode::RequestTimeout
                | NoSQLErrorCode::ServerError
                | NoSQLErrorCode::ServiceUnavailable
                | NoSQLErrorCode::SecurityInfoUnavailable
                | NoSQLErrorCode::RetryAuthentication
                | NoSQLErrorCode::NetworkError
        )
    }
}

macro_rules! ia_error {
    ($($t:tt)*) => {{
        let m = format!($($t)*);
        $crate::error::NoSQLError {
            code: $crate::error::NoSQLErrorCode::IllegalArgument,
            message: format!("{} ({})", m, $crate::error::sdk_version()),
        }
    }};
}

pub(crate) use ia_error;

macro_rules! ia_err {
    ($($t:tt)*) => {{
        let m = format!($($t)*);
        Err($crate::error::NoSQLError {
            code: $crate::error::NoSQLErrorCode::IllegalArgument,
            message: format!("{} ({})", m, $crate::error::sdk_version()),
        })
    }};
}

pub(crate) use ia_err;

macro_rules! cred_err {
    ($($t:tt)*) => {{
        let m = format!($($t)*);
        Err($crate::error::NoSQLError {
            code: $crate::error::NoSQLErrorCode::CredentialsError,
            message: format!("{} ({})", m, $crate::error::sdk_version()),
        })
    }};
}

pub(crate) use cred_err;

macro_rules! is_err {
    ($($t:tt)*) => {{
        let m = format!($($t)*);
        Err($crate::error::NoSQLError {
            code: $crate::error::NoSQLErrorCode::IllegalState,
            message: format!("{} ({})", m, $crate::error::sdk_version()),
        })
    }};
}

pub(crate) use is_err;

macro_rules! bpm_err {
    ($($t:tt)*) => {{
        let m = format!($($t)*);
        Err($crate::error::NoSQLError {
            code: $crate::error::NoSQLErrorCode::BadProtocolMessage,
            message: format!("{} ({})", m, $crate::error::sdk_version()),
        })
    }};
}

pub(crate) use bpm_err;

impl From<reqwest::Error> for NoSQLError {
    fn from(e: reqwest::Error) -> Self {
        let code = if e.is_timeout() {
            NoSQLErrorCode::RequestTimeout
        } else if e.is_connect() || e.is_request() {
            NoSQLErrorCode::NetworkError
        } else {
            NoSQLErrorCode::ServerError
        };
        NoSQLError {
            code,
            message: format!("reqwest error: {} ({})", e, sdk_version()),
        }
    }
}

impl From<reqwest::header::InvalidHeaderValue> for NoSQLError {
    fn from(e: reqwest::header::InvalidHeaderValue) -> Self {
        ia_error!("invalid header value: {}", e)
    }
}

impl From<url::ParseError> for NoSQLError {
    fn from(e: url::ParseError) -> Self {
        ia_error!("error parsing url: {}", e)
    }
}

impl From<chrono::ParseError> for NoSQLError {
    fn from(e: chrono::ParseError) -> Self {
        ia_error!("invalid datetime value: {}", e)
    }
}

impl From<serde_json::Error> for NoSQLError {
    fn from(e: serde_json::Error) -> Self {
        NoSQLError {
            code: NoSQLErrorCode::BadProtocolMessage,
            message: format!("invalid JSON: {} ({})", e, sdk_version()),
        }
    }
}

impl From<std::io::Error> for NoSQLError {
    fn from(e: std::io::Error) -> Self {
        ia_error!("I/O error: {}", e)
    }
}

// NoSQLErrorCode represents the error code.
// Error codes are divided into categories as follows:
//
// 1. Error codes for user-generated errors, range from 1 to 50(exclusive).
// These include illegal arguments, resource not found, etc.
//
// 2. Error codes for user throttling, range from 50 to 100(exclusive).
//
// 3. Error codes for server issues, range from 100 to 150(exclusive).
//
// 3.1 Retryable server issues, range from 100 to 125(exclusive), that represent
// internal problems, presumably temporary, and need to be sent back to the
// application for retry.
//
// 3.2 Other server issues, begin from 125.
// These include server illegal state, unknown server error, etc.
// They might be retryable, or not.
//
// 4. Error codes private to the authorization subsystem begin at 200: these
// never appear on the wire, they only ever originate client-side.
//
#[derive(Debug, Clone, Copy, Eq, PartialEq, TryFromPrimitive)]
#[repr(i32)]
pub enum NoSQLErrorCode {
    /// NoError represents there is no error.
    NoError = 0,

    /// IllegalArgument error represents the application provided an illegal
    /// argument for the operation, or a configuration value was rejected at
    /// construction time.
    IllegalArgument = 4,

    /// InvalidAuthorization error represents the client provided an invalid
    /// authorization string in the request header. Consumed by the signature
    /// cache as a hint to invalidate and re-sign.
    InvalidAuthorization = 11,

    /// InsufficientPermission error represents an application does not have
    /// sufficient permission to perform a request.
    InsufficientPermission = 12,

    /// BadProtocolMessage error represents a peer response was not well formed
    /// (non-JSON body, missing expected field, undecodable base64, ...).
    BadProtocolMessage = 17,

    /// SecurityInfoUnavailable error represents the security information is not
    /// ready in the system yet and must be retried for authorization to succeed.
    SecurityInfoUnavailable = 104,

    /// RetryAuthentication error represents the authentication information was
    /// rejected and may need to be retried, generally after a re-login.
    RetryAuthentication = 105,

    /// RequestTimeout error represents the request exceeded its deadline.
    RequestTimeout = 100,

    /// ServerError represents an internal system problem, presumably transient.
    ServerError = 101,

    /// ServiceUnavailable error represents the requested service is currently
    /// unavailable. Usually transient and retryable.
    ServiceUnavailable = 102,

    /// Unauthorized represents a 401 response from an authentication peer.
    Unauthorized = 106,

    /// UnknownError represents an unknown error has occurred.
    UnknownError = 125,

    /// IllegalState error represents a peer-supplied invariant failed (tenant id
    /// mismatch across refreshes, missing `exp` claim, unknown region literal, ...).
    IllegalState = 126,

    /// CredentialsError represents a credentials provider callback failed, or a
    /// credentials file/buffer was unreadable or malformed.
    CredentialsError = 201,

    /// NetworkError represents a transport-level failure (connection refused,
    /// DNS failure, TLS handshake failure) after retries.
    NetworkError = 202,

    /// InternalRetry is used internally to signal the caller should retry the
    /// current operation; it is never surfaced to application code.
    InternalRetry = 1001,
}

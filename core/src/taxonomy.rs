//! Response-code taxonomy shared by every endpoint.
//!
//! Codes form a closed, append-only space. The leading three digits of a
//! code are the HTTP status it resolves to; the remaining digits
//! disambiguate the cause (`40301` is a CSRF rejection, `40300` any other
//! forbidden access). The dispatcher in `atelier-web` derives the wire
//! status and default message purely from the code, so adding a failure
//! mode means adding one constant and one match arm here and nothing else.

/// Numeric response code carried by the error envelope.
pub type Code = u32;

/// The closed code space.
///
/// Append new codes; never renumber existing ones — clients key on them.
pub mod codes {
    use super::Code;

    /// Success.
    pub const OK: Code = 20000;
    /// Resource created.
    pub const CREATED: Code = 20100;
    /// Request payload failed validation.
    pub const VALIDATION_FAILED: Code = 40000;
    /// Missing or invalid credentials.
    pub const UNAUTHENTICATED: Code = 40100;
    /// Authenticated but not allowed.
    pub const FORBIDDEN: Code = 40300;
    /// CSRF token missing or mismatched.
    pub const CSRF_REJECTED: Code = 40301;
    /// Resource does not exist.
    pub const NOT_FOUND: Code = 40400;
    /// State conflict with an existing resource.
    pub const CONFLICT: Code = 40900;
    /// Request body exceeds the configured limit.
    pub const PAYLOAD_TOO_LARGE: Code = 41300;
    /// Unclassified server failure.
    pub const INTERNAL: Code = 50000;
    /// An upstream dependency failed.
    pub const UPSTREAM_FAILED: Code = 50200;
    /// Service temporarily unavailable.
    pub const UNAVAILABLE: Code = 50300;
}

/// Message registered for `code`.
///
/// Unknown codes resolve to the generic server-error message, never to an
/// empty string.
#[must_use]
pub const fn message_for(code: Code) -> &'static str {
    match code {
        codes::OK => "OK",
        codes::CREATED => "Created",
        codes::VALIDATION_FAILED => "Validation failed",
        codes::UNAUTHENTICATED => "Authentication required",
        codes::FORBIDDEN => "Access denied",
        codes::CSRF_REJECTED => "CSRF token missing or invalid",
        codes::NOT_FOUND => "Resource not found",
        codes::CONFLICT => "Resource conflict",
        codes::PAYLOAD_TOO_LARGE => "Payload too large",
        codes::UPSTREAM_FAILED => "Upstream service failed",
        codes::UNAVAILABLE => "Service unavailable",
        _ => "Internal server error",
    }
}

/// Short category name for `code`, used in structured error detail.
#[must_use]
pub const fn name_for(code: Code) -> &'static str {
    match code {
        codes::OK => "Ok",
        codes::CREATED => "Created",
        codes::VALIDATION_FAILED => "ValidationFailed",
        codes::UNAUTHENTICATED => "Unauthenticated",
        codes::FORBIDDEN => "Forbidden",
        codes::CSRF_REJECTED => "CsrfRejected",
        codes::NOT_FOUND => "NotFound",
        codes::CONFLICT => "Conflict",
        codes::PAYLOAD_TOO_LARGE => "PayloadTooLarge",
        codes::UPSTREAM_FAILED => "UpstreamFailed",
        codes::UNAVAILABLE => "Unavailable",
        _ => "Internal",
    }
}

/// HTTP status encoded in the leading three digits of `code`.
///
/// Codes that do not reduce to a valid status class resolve to 500.
#[must_use]
pub const fn status_for(code: Code) -> u16 {
    let mut status = code;
    while status >= 1000 {
        status /= 10;
    }
    if status >= 100 && status <= 599 {
        status as u16
    } else {
        500
    }
}

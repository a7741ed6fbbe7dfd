//! # Atelier Core
//!
//! Pure building blocks shared by every endpoint of an atelier service:
//! the response-code taxonomy, the pagination normalizer and the log-record
//! redaction pass.
//!
//! Everything in this crate is synchronous, allocation-light and free of
//! transport concerns. The imperative shell lives in `atelier-web`, which
//! turns these values into HTTP responses and log records.
//!
//! ## Example
//!
//! ```
//! use atelier_core::pagination::PageParams;
//! use atelier_core::taxonomy::{codes, status_for};
//!
//! let params = PageParams::normalize(Some(0), Some(500));
//! assert_eq!((params.page, params.per_page), (1, 100));
//!
//! assert_eq!(status_for(codes::CSRF_REJECTED), 403);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod pagination;
pub mod redact;
pub mod taxonomy;

pub use pagination::{PageParams, Paginated};
pub use redact::redact;
pub use taxonomy::{message_for, status_for, Code};

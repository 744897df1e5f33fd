//! Submission transport.
//!
//! Turns HTTP outcomes into [`RawFailure`](crate::error::RawFailure) values
//! so the rest of the crate never sees transport-specific errors.

pub mod http;

pub use http::{status_error_code, HttpSubmitter};

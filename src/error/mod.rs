//! Failure normalization, classification and the error catalog.
//!
//! Raw failures enter as [`RawFailure`], are mapped by the [`Classifier`] onto
//! the closed [`ErrorType`] taxonomy, and are described for users by the
//! [`ErrorCatalog`].

pub mod catalog;
pub mod classification;
pub mod raw;

// Re-export main types for convenient access
pub use catalog::{
    recovery_steps, ErrorCatalog, ErrorDescriptor, Severity, SeverityIndicator, UNKNOWN_CODE,
};
pub use classification::{classify, ClassifiedError, Classifier, ErrorType, RECAPTCHA_CODES};
pub use raw::{NetworkFailureKind, RawFailure};

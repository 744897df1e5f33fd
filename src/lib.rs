//! Recourse - error classification, bounded retry and offline fallback
//!
//! Turns raw submission failures into user-facing errors, retries the
//! retryable ones with exponential backoff, announces progress to
//! assistive technology and stores exhausted network submissions for a
//! later replay.

pub mod announce;
pub mod error;
pub mod handler;
pub mod logging;
pub mod network;
pub mod queue;
pub mod retry;
pub mod settings;
pub mod transport;

//! Bounded retry with exponential backoff and jitter.
//!
//! - [`RetryPolicy`]: attempt budget, delay formula and retry predicate
//! - [`RetryPolicyResolver`]: derives a policy from a classified failure
//! - [`RetryExecutor`]: runs an operation under a policy and reports [`RetryEvent`]s

pub mod executor;
pub mod policy;
pub mod resolver;

pub use executor::{RetryAttemptRecord, RetryEvent, RetryExecutor, RetryOutcome};
pub use policy::{RetryPolicy, RetryPredicate};
pub use resolver::{PolicyRow, RetryPolicyResolver};

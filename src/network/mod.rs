//! Connectivity tracking.
//!
//! A single [`NetworkMonitor`] is constructed at application start and passed
//! to everything that needs to know whether the platform is online. State only
//! changes when the platform reports a connectivity transition.

pub mod monitor;

pub use monitor::{NetworkMonitor, Subscription};

//! convoy reconciler driver.
//!
//! Periodically rebuilds the actual deploy state of every request at every
//! configured scheduler and logs what it found.

pub mod config;
pub mod reconciler;

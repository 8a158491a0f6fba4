//! Shared utilities for the invocation core.

pub mod clock;

pub use clock::{Clock, MockClock, SystemClock};

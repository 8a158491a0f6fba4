//! # Invocation Pipeline Module
//!
//! Composes the resilience primitives into the single-call pipeline:
//! response cache lookup, then on miss a pooled client acquisition, a
//! circuit breaker admission, and bounded retries around the caller's
//! opaque async operation. Successful responses are cached; the pooled
//! connection is released on every exit path.

pub mod context;
pub mod invoker;

pub use context::InvocationContext;
pub use invoker::{BackgroundTasks, ResilientInvoker};

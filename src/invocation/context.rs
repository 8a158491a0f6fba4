//! Per-call invocation context.

use serde_json::Value;
use std::time::Duration;

/// Everything the pipeline needs to know about one call besides the
/// operation itself.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Operation name, used for cache keying and logging
    pub operation: String,

    /// Endpoint identifier guarding circuit breaker admission
    /// (e.g. an agent ARN)
    pub endpoint: String,

    /// Service component of the connection pool key
    pub service: String,

    /// Region component of the connection pool key
    pub region: String,

    /// Call parameters; part of the cache key
    pub parameters: Value,

    /// Consult and populate the response cache for this call
    pub use_cache: bool,

    /// Per-call TTL override when caching
    pub cache_ttl: Option<Duration>,
}

impl InvocationContext {
    pub fn new(
        operation: impl Into<String>,
        endpoint: impl Into<String>,
        service: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            operation: operation.into(),
            endpoint: endpoint.into(),
            service: service.into(),
            region: region.into(),
            parameters: Value::Null,
            use_cache: false,
            cache_ttl: None,
        }
    }

    pub fn with_parameters(mut self, parameters: Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Enable response caching for this call.
    pub fn cached(mut self) -> Self {
        self.use_cache = true;
        self
    }

    /// Enable response caching with an explicit TTL.
    pub fn cached_with_ttl(mut self, ttl: Duration) -> Self {
        self.use_cache = true;
        self.cache_ttl = Some(ttl);
        self
    }
}

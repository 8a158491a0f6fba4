//! # Error Classification
//!
//! Determines whether an error is worth retrying. Classification is
//! structured-first: the error's own [`ErrorKind`] tag and self-declared
//! disposition are consulted before anything else, then the configured
//! retryable-kind set, and only then a substring fallback over the message
//! for errors wrapped from foreign libraries.

use crate::error::{ErrorKind, InvokerError};
use std::collections::HashSet;
use tracing::trace;

/// Outcome of classifying one error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorDisposition {
    /// Structured kind of the error
    pub kind: ErrorKind,
    /// Whether the retry layer may attempt it again
    pub retryable: bool,
}

/// Pluggable classification strategy.
///
/// The retry handler passes its configured retryable-kind set so one
/// classifier instance can serve handlers with different policies.
pub trait ErrorClassifier: Send + Sync {
    fn classify(
        &self,
        error: &InvokerError,
        retryable_kinds: &HashSet<ErrorKind>,
    ) -> ErrorDisposition;

    /// Classifier name for logs and debugging.
    fn name(&self) -> &'static str;
}

/// Default classifier.
///
/// Decision order:
/// 1. the error's self-declared disposition (`CircuitOpen`/`PoolExhausted`
///    are always final here),
/// 2. membership of the error's kind in the configured retryable set,
/// 3. last-resort substring match of the message against `fallback_patterns`.
#[derive(Debug, Clone)]
pub struct StandardErrorClassifier {
    /// Lowercase substrings that mark a foreign error message as transient
    fallback_patterns: Vec<String>,
}

impl StandardErrorClassifier {
    pub fn new(fallback_patterns: Vec<String>) -> Self {
        Self {
            fallback_patterns: fallback_patterns
                .into_iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }
}

impl Default for StandardErrorClassifier {
    fn default() -> Self {
        Self::new(vec![
            "timeout".to_string(),
            "timed out".to_string(),
            "unavailable".to_string(),
            "throttl".to_string(),
            "too many requests".to_string(),
            "connection reset".to_string(),
            "temporarily".to_string(),
        ])
    }
}

impl ErrorClassifier for StandardErrorClassifier {
    fn classify(
        &self,
        error: &InvokerError,
        retryable_kinds: &HashSet<ErrorKind>,
    ) -> ErrorDisposition {
        let kind = error.kind();

        if let Some(declared) = error.declares_retryable() {
            trace!(error_kind = %kind, retryable = declared, "Classified by declaration");
            return ErrorDisposition {
                kind,
                retryable: declared,
            };
        }

        if retryable_kinds.contains(&kind) {
            return ErrorDisposition {
                kind,
                retryable: true,
            };
        }

        // Heuristic fallback for errors wrapped from third-party code where
        // the kind tag carries no signal.
        let message = error.to_string().to_lowercase();
        let matched = self
            .fallback_patterns
            .iter()
            .any(|pattern| message.contains(pattern));
        trace!(error_kind = %kind, retryable = matched, "Classified by message fallback");
        ErrorDisposition {
            kind,
            retryable: matched,
        }
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::config::default_retryable_kinds;
    use std::time::Duration;

    fn classify(error: &InvokerError) -> ErrorDisposition {
        StandardErrorClassifier::default().classify(error, &default_retryable_kinds())
    }

    #[test]
    fn timeout_is_retryable_by_kind() {
        let err = InvokerError::Timeout {
            operation: "invoke".to_string(),
            timeout: Duration::from_secs(5),
        };
        let disposition = classify(&err);
        assert!(disposition.retryable);
        assert_eq!(disposition.kind, ErrorKind::Timeout);
    }

    #[test]
    fn pool_exhausted_declaration_beats_kind_set() {
        let err = InvokerError::PoolExhausted {
            pool_key: "us-east-1/agent".to_string(),
            max_connections: 10,
        };
        // Even if an operator configures PoolExhausted as retryable, the
        // declaration wins.
        let mut kinds = default_retryable_kinds();
        kinds.insert(ErrorKind::PoolExhausted);
        let disposition = StandardErrorClassifier::default().classify(&err, &kinds);
        assert!(!disposition.retryable);
    }

    #[test]
    fn kind_set_can_narrow_retryable_errors() {
        let err = InvokerError::unavailable("connection refused");
        let empty: HashSet<ErrorKind> = HashSet::new();
        // Kind not in the set and no fallback patterns configured.
        let disposition = StandardErrorClassifier::new(vec![]).classify(&err, &empty);
        assert!(!disposition.retryable);
    }

    #[test]
    fn message_fallback_matches_foreign_errors() {
        let err = InvokerError::from(anyhow::anyhow!("upstream timed out while connecting"));
        let empty: HashSet<ErrorKind> = HashSet::new();
        let disposition = StandardErrorClassifier::default().classify(&err, &empty);
        assert!(disposition.retryable);
    }
}

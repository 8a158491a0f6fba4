//! Property tests for the pure parts of the resilience layer: backoff delay
//! math and cache key determinism.

use invoker_core::cache::{cache_key, canonical_json};
use invoker_core::resilience::{backoff_delay, RetryConfig};
use proptest::prelude::*;
use serde_json::{json, Map, Value};
use std::time::Duration;

proptest! {
    #[test]
    fn backoff_never_exceeds_max_delay(
        base_ms in 1u64..10_000,
        max_ms in 1u64..120_000,
        exponential_base in 1.0f64..4.0,
        attempt in 0u32..16,
    ) {
        let config = RetryConfig {
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
            exponential_base,
            jitter: false,
            ..RetryConfig::default()
        };
        let delay = backoff_delay(&config, attempt);
        prop_assert!(delay <= Duration::from_millis(max_ms));
    }

    #[test]
    fn backoff_is_nondecreasing_in_attempt(
        base_ms in 1u64..5_000,
        exponential_base in 1.0f64..3.0,
        attempt in 0u32..10,
    ) {
        let config = RetryConfig {
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_secs(3600),
            exponential_base,
            jitter: false,
            ..RetryConfig::default()
        };
        prop_assert!(backoff_delay(&config, attempt) <= backoff_delay(&config, attempt + 1));
    }

    #[test]
    fn cache_key_ignores_insertion_order(
        entries in proptest::collection::btree_map("[a-z]{1,8}", -1000i64..1000, 1..8),
    ) {
        let forward: Map<String, Value> = entries
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        let reversed: Map<String, Value> = entries
            .iter()
            .rev()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();

        prop_assert_eq!(
            cache_key("op", &Value::Object(forward), None),
            cache_key("op", &Value::Object(reversed), None)
        );
    }

    #[test]
    fn canonical_json_is_stable_under_reserialization(
        entries in proptest::collection::vec(("[a-z]{1,8}", "[a-z0-9 ]{0,12}"), 0..8),
    ) {
        let value: Map<String, Value> = entries
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        let value = Value::Object(value);

        let canonical = canonical_json(&value);
        let reparsed: Value = serde_json::from_str(&canonical).expect("canonical output is JSON");
        prop_assert_eq!(canonical.clone(), canonical_json(&reparsed));
    }
}

#[test]
fn backoff_matches_documented_sequence() {
    // max_retries = 3, base 1s, exponential base 2, no jitter: delays before
    // attempts 2, 3, 4 are 1s, 2s, 4s.
    let config = RetryConfig {
        max_retries: 3,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(60),
        exponential_base: 2.0,
        jitter: false,
        ..RetryConfig::default()
    };
    assert_eq!(backoff_delay(&config, 0), Duration::from_secs(1));
    assert_eq!(backoff_delay(&config, 1), Duration::from_secs(2));
    assert_eq!(backoff_delay(&config, 2), Duration::from_secs(4));
}

//! Configuration types: every numeric knob is centralized here as an
//! overridable default rather than scattered through the engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum number of fields a collection may have in `indexedFields`
/// (the blob-tag cardinality limit imposed by the underlying store).
pub const MAX_INDEXED_FIELDS: usize = 10;

/// Maximum length, in bytes, of an encoded tag value.
pub const MAX_TAG_VALUE_LEN: usize = 256;

/// Retry/backoff configuration for catalog CAS writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    #[serde(with = "duration_millis")]
    pub initial_delay: Duration,
    #[serde(with = "duration_millis")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl RetryConfig {
    /// Exponential backoff for a given (zero-based) attempt number:
    /// `min(initialDelay * 2^attempt, maxDelay)`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let scaled = self
            .initial_delay
            .checked_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
            .unwrap_or(self.max_delay);
        scaled.min(self.max_delay)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Master configuration for a Tessera engine instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry/backoff policy for index-catalog CAS writes.
    pub catalog_retry: RetryConfig,
    /// Blob-tag cardinality cap. Exposed for tests
    /// that want to exercise the cap at a smaller scale; production callers
    /// should leave this at [`MAX_INDEXED_FIELDS`].
    pub max_indexed_fields: usize,
    /// Default page size used by `find` when the caller omits `limit`.
    pub default_page_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_retry: RetryConfig::default(),
            max_indexed_fields: MAX_INDEXED_FIELDS,
            default_page_limit: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_exponentially_then_caps() {
        let cfg = RetryConfig::default();
        assert_eq!(cfg.backoff_for_attempt(0), Duration::from_millis(100));
        assert_eq!(cfg.backoff_for_attempt(1), Duration::from_millis(200));
        assert_eq!(cfg.backoff_for_attempt(2), Duration::from_millis(400));
        assert_eq!(cfg.backoff_for_attempt(10), Duration::from_millis(5000));
    }

    #[test]
    fn default_engine_config_matches_spec_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.catalog_retry.max_retries, 5);
        assert_eq!(cfg.max_indexed_fields, 10);
    }
}

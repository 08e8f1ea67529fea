//! Job queue configuration.

use serde::{Deserialize, Serialize};

use crate::error::CalloutError;

/// Environment variable read by `QueueConfig::from_env`.
pub const MAX_CONCURRENT_JOBS_ENV: &str = "CALLOUT_MAX_CONCURRENT_JOBS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// How many jobs may be inside their blocking transport call at once.
    pub max_concurrent_jobs: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 8,
        }
    }
}

impl QueueConfig {
    pub fn from_json(raw: &str) -> Result<Self, CalloutError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| CalloutError::Validation(format!("bad queue config: {e}")))?;
        config.validate()
    }

    /// Defaults, overridden by `CALLOUT_MAX_CONCURRENT_JOBS` when set.
    pub fn from_env() -> Result<Self, CalloutError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CalloutError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(MAX_CONCURRENT_JOBS_ENV) {
            config.max_concurrent_jobs = raw.trim().parse().map_err(|_| {
                CalloutError::Validation(format!("{MAX_CONCURRENT_JOBS_ENV} is not a number: `{raw}`"))
            })?;
        }
        config.validate()
    }

    pub fn validate(self) -> Result<Self, CalloutError> {
        if self.max_concurrent_jobs == 0 {
            return Err(CalloutError::Validation(
                "max_concurrent_jobs must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        assert_eq!(QueueConfig::from_json("{}").unwrap(), QueueConfig::default());
    }

    #[test]
    fn json_overrides_defaults() {
        let config = QueueConfig::from_json(r#"{"max_concurrent_jobs":2}"#).unwrap();
        assert_eq!(config.max_concurrent_jobs, 2);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let err = QueueConfig::from_json(r#"{"max_concurrent_jobs":0}"#).unwrap_err();
        assert!(matches!(err, CalloutError::Validation(_)));
    }

    #[test]
    fn env_lookup_is_parsed() {
        let config = QueueConfig::from_lookup(|_| Some(" 3 ".to_string())).unwrap();
        assert_eq!(config.max_concurrent_jobs, 3);
        assert!(QueueConfig::from_lookup(|_| Some("many".to_string())).is_err());
        assert_eq!(QueueConfig::from_lookup(|_| None).unwrap(), QueueConfig::default());
    }
}

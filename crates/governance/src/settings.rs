//! Electorate settings
//!
//! Process-wide mutable configuration: the active arbitrator count and the
//! absolute-majority threshold. Values are not versioned and not snapshotted
//! per motion; the decision engine always reads the current pair, even for
//! motions created before the configuration changed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use arbcom_core::storage::{Storage, StorageError};

use crate::{GovernanceError, GovernanceResult};

const SETTINGS_PATH: &str = "governance/settings";
const ACTIVE_COUNT_KEY: &str = "active_arbitrator_count";
const THRESHOLD_KEY: &str = "majority_threshold";

/// Current electorate configuration pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Electorate {
    /// Number of active arbitrators
    pub active_count: u32,
    /// Support votes required for automatic passage
    pub threshold: u32,
}

/// Settings store over the shared keyspace. Values are stored as plain
/// strings, one key per setting, with no versioning.
pub struct ElectorateSettings {
    storage: Arc<dyn Storage>,
}

impl ElectorateSettings {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn setting_key(key: &str) -> String {
        format!("{}/{}", SETTINGS_PATH, key)
    }

    /// Get a raw setting value.
    pub async fn get_setting(&self, key: &str) -> GovernanceResult<Option<String>> {
        match self.storage.get(&Self::setting_key(key)).await {
            Ok(bytes) => {
                let value = String::from_utf8(bytes).map_err(|e| {
                    GovernanceError::SerializationError(format!(
                        "setting {} is not valid UTF-8: {}",
                        key, e
                    ))
                })?;
                Ok(Some(value))
            }
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a raw setting value.
    pub async fn set_setting(&self, key: &str, value: &str) -> GovernanceResult<()> {
        self.storage
            .put(&Self::setting_key(key), value.as_bytes())
            .await?;
        Ok(())
    }

    async fn get_count(&self, key: &str) -> GovernanceResult<Option<u32>> {
        match self.get_setting(key).await? {
            Some(value) => {
                let parsed = value.parse().map_err(|_| {
                    GovernanceError::SerializationError(format!(
                        "setting {} holds a non-numeric value: {}",
                        key, value
                    ))
                })?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// The current electorate pair, or `None` until both values have been
    /// set. Auto-close is skipped entirely while this is `None`.
    pub async fn electorate(&self) -> GovernanceResult<Option<Electorate>> {
        let active_count = self.get_count(ACTIVE_COUNT_KEY).await?;
        let threshold = self.get_count(THRESHOLD_KEY).await?;

        match (active_count, threshold) {
            (Some(active_count), Some(threshold)) => Ok(Some(Electorate {
                active_count,
                threshold,
            })),
            _ => Ok(None),
        }
    }

    /// Update the electorate pair. Validation failures leave the previously
    /// stored values untouched.
    pub async fn set_electorate(
        &self,
        active_count: u32,
        threshold: u32,
    ) -> GovernanceResult<Electorate> {
        if active_count < 1 || threshold < 1 {
            return Err(GovernanceError::InvalidConfiguration(
                "active count and threshold must be positive".to_string(),
            ));
        }
        if threshold > active_count {
            return Err(GovernanceError::InvalidConfiguration(format!(
                "threshold ({}) cannot exceed active arbitrator count ({})",
                threshold, active_count
            )));
        }

        self.set_setting(ACTIVE_COUNT_KEY, &active_count.to_string())
            .await?;
        self.set_setting(THRESHOLD_KEY, &threshold.to_string())
            .await?;

        info!(
            "Electorate updated: {} active arbitrators, threshold {}",
            active_count, threshold
        );
        Ok(Electorate {
            active_count,
            threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbcom_core::storage::MemoryStorage;

    fn settings() -> ElectorateSettings {
        ElectorateSettings::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_unset_electorate_is_none() {
        let settings = settings();
        assert_eq!(settings.electorate().await.unwrap(), None);

        // One half set is still None
        settings.set_setting(ACTIVE_COUNT_KEY, "5").await.unwrap();
        assert_eq!(settings.electorate().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_and_get_electorate() {
        let settings = settings();
        settings.set_electorate(5, 3).await.unwrap();

        let electorate = settings.electorate().await.unwrap().unwrap();
        assert_eq!(electorate.active_count, 5);
        assert_eq!(electorate.threshold, 3);
    }

    #[tokio::test]
    async fn test_invalid_configuration_retains_previous() {
        let settings = settings();
        settings.set_electorate(5, 3).await.unwrap();

        // Threshold above the active count
        let err = settings.set_electorate(5, 6).await.unwrap_err();
        assert!(matches!(err, GovernanceError::InvalidConfiguration(_)));

        // Non-positive values
        assert!(settings.set_electorate(0, 0).await.is_err());

        let electorate = settings.electorate().await.unwrap().unwrap();
        assert_eq!(
            electorate,
            Electorate {
                active_count: 5,
                threshold: 3
            }
        );
    }

    #[tokio::test]
    async fn test_raw_settings_roundtrip() {
        let settings = settings();
        assert_eq!(settings.get_setting("greeting").await.unwrap(), None);
        settings.set_setting("greeting", "hello").await.unwrap();
        assert_eq!(
            settings.get_setting("greeting").await.unwrap(),
            Some("hello".to_string())
        );
    }
}

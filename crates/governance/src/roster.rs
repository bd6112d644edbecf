//! Arbitrator roster
//!
//! Membership records for the electorate. Pure data management: the engine
//! itself performs no authorization checks with it, that belongs to the
//! command layer sitting in front of the core.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use tracing::info;

use arbcom_core::storage::{Storage, StorageError};
use arbcom_core::utils;

use crate::{GovernanceError, GovernanceResult};

const ROSTER_PATH: &str = "governance/arbitrators";

#[derive(Debug, Serialize, Deserialize)]
struct RosterEntry {
    added_at: DateTime<Utc>,
}

/// Roster of authorized arbitrators
pub struct ArbitratorRoster {
    storage: Arc<dyn Storage>,
}

impl ArbitratorRoster {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn member_key(voter_id: i64) -> String {
        format!("{}/{}", ROSTER_PATH, voter_id)
    }

    /// Add a member. Returns `false` when already present.
    pub async fn add(&self, voter_id: i64) -> GovernanceResult<bool> {
        let entry = RosterEntry {
            added_at: utils::now(),
        };
        let data = serde_json::to_vec_pretty(&entry)
            .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;

        let inserted = self
            .storage
            .compare_and_swap(&Self::member_key(voter_id), None, &data)
            .await?;

        if inserted {
            info!("Added arbitrator {}", voter_id);
        }
        Ok(inserted)
    }

    /// Remove a member. Returns `false` when not present.
    pub async fn remove(&self, voter_id: i64) -> GovernanceResult<bool> {
        let key = Self::member_key(voter_id);
        if !self.storage.exists(&key).await? {
            return Ok(false);
        }
        self.storage.delete(&key).await?;
        info!("Removed arbitrator {}", voter_id);
        Ok(true)
    }

    /// Whether the given voter is on the roster.
    pub async fn contains(&self, voter_id: i64) -> GovernanceResult<bool> {
        Ok(self.storage.exists(&Self::member_key(voter_id)).await?)
    }

    /// All member ids, ascending.
    pub async fn list(&self) -> GovernanceResult<Vec<i64>> {
        let prefix = format!("{}/", ROSTER_PATH);
        let keys = self.storage.list(&prefix).await?;

        let mut ids = Vec::with_capacity(keys.len());
        for key in keys {
            let id = key
                .strip_prefix(&prefix)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| {
                    StorageError::Other(format!("unexpected roster key: {}", key))
                })?;
            ids.push(id);
        }

        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbcom_core::storage::MemoryStorage;

    fn roster() -> ArbitratorRoster {
        ArbitratorRoster::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_add_is_idempotent_membership() {
        let roster = roster();

        assert!(roster.add(10).await.unwrap());
        assert!(!roster.add(10).await.unwrap());
        assert!(roster.contains(10).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove() {
        let roster = roster();

        roster.add(10).await.unwrap();
        assert!(roster.remove(10).await.unwrap());
        assert!(!roster.remove(10).await.unwrap());
        assert!(!roster.contains(10).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_sorted() {
        let roster = roster();

        roster.add(30).await.unwrap();
        roster.add(10).await.unwrap();
        roster.add(20).await.unwrap();

        assert_eq!(roster.list().await.unwrap(), vec![10, 20, 30]);
    }
}

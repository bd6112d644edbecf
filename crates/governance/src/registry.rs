//! Motion registry
//!
//! Owns motion records and the Active to Closed lifecycle transition. The
//! transition is a conditional update at the storage layer, so concurrent
//! callers racing on the same motion are serialized by the store and exactly
//! one of them wins.

use std::sync::Arc;

use tracing::{debug, info};

use arbcom_core::storage::{JsonStorage, Storage, StorageError};
use arbcom_core::utils;

use crate::{
    ChannelId, GovernanceError, GovernanceResult, Motion, MotionId, MotionStatus, Voter,
};

/// Path constants for storage
const MOTIONS_PATH: &str = "governance/motions";
const NEXT_ID_KEY: &str = "governance/next_motion_id";

/// Registry of motions. Motions are created here, closed through
/// [`try_close`](MotionRegistry::try_close), and never deleted.
pub struct MotionRegistry {
    storage: Arc<dyn Storage>,
}

impl MotionRegistry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn motion_key(id: MotionId) -> String {
        format!("{}/{}", MOTIONS_PATH, id)
    }

    /// Allocate a fresh motion id from the shared counter.
    async fn allocate_id(&self) -> GovernanceResult<MotionId> {
        loop {
            match self.storage.get(NEXT_ID_KEY).await {
                Ok(current_bytes) => {
                    let current: MotionId = std::str::from_utf8(&current_bytes)
                        .ok()
                        .and_then(|s| s.parse().ok())
                        .ok_or_else(|| {
                            GovernanceError::SerializationError(format!(
                                "corrupt motion id counter at {}",
                                NEXT_ID_KEY
                            ))
                        })?;

                    let next = (current + 1).to_string();
                    if self
                        .storage
                        .compare_and_swap(NEXT_ID_KEY, Some(&current_bytes), next.as_bytes())
                        .await?
                    {
                        return Ok(current);
                    }
                    // Another creator advanced the counter; try again.
                }
                Err(StorageError::KeyNotFound(_)) => {
                    if self
                        .storage
                        .compare_and_swap(NEXT_ID_KEY, None, b"2")
                        .await?
                    {
                        return Ok(1);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Create a new motion with a fresh id and Active status.
    pub async fn create(
        &self,
        title: String,
        content: String,
        creator: Voter,
        channel: ChannelId,
    ) -> GovernanceResult<Motion> {
        let id = self.allocate_id().await?;
        let motion = Motion {
            id,
            title,
            content,
            creator,
            channel,
            created_at: utils::now(),
            status: MotionStatus::Active,
        };

        self.storage.put_json(&Self::motion_key(id), &motion).await?;
        info!("Created motion #{}: {}", motion.id, motion.title);
        Ok(motion)
    }

    /// Get a motion by id.
    pub async fn get(&self, id: MotionId) -> GovernanceResult<Option<Motion>> {
        match self.storage.get_json::<Motion>(&Self::motion_key(id)).await {
            Ok(motion) => Ok(Some(motion)),
            Err(StorageError::KeyNotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// List all Active motions, ordered by id.
    pub async fn list_active(&self) -> GovernanceResult<Vec<Motion>> {
        let prefix = format!("{}/", MOTIONS_PATH);
        let keys = self.storage.list(&prefix).await?;

        let mut motions = Vec::new();
        for key in keys {
            let motion: Motion = self.storage.get_json(&key).await?;
            if motion.is_active() {
                motions.push(motion);
            }
        }

        motions.sort_by_key(|m| m.id);
        Ok(motions)
    }

    /// Atomically transition the motion from Active to Closed, reporting
    /// whether this call performed the transition.
    ///
    /// All concurrent callers except one observe `false` and must treat the
    /// motion as already closed by someone else; that is an expected
    /// outcome, not an error.
    pub async fn try_close(&self, id: MotionId) -> GovernanceResult<bool> {
        let key = Self::motion_key(id);

        loop {
            let current_bytes = match self.storage.get(&key).await {
                Ok(bytes) => bytes,
                Err(StorageError::KeyNotFound(_)) => {
                    return Err(GovernanceError::MotionNotFound(id));
                }
                Err(e) => return Err(e.into()),
            };

            let mut motion: Motion = serde_json::from_slice(&current_bytes)
                .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;

            if motion.status == MotionStatus::Closed {
                debug!("Motion #{} already closed, losing transition", id);
                return Ok(false);
            }

            motion.status = MotionStatus::Closed;
            let new_bytes = serde_json::to_vec_pretty(&motion)
                .map_err(|e| GovernanceError::SerializationError(e.to_string()))?;

            if self
                .storage
                .compare_and_swap(&key, Some(&current_bytes), &new_bytes)
                .await?
            {
                info!("Closed motion #{}", id);
                return Ok(true);
            }
            // The record changed under us. Only the close transition
            // mutates a stored motion, so re-read: if it is Closed now,
            // another caller won; the next iteration reports that.
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbcom_core::storage::MemoryStorage;

    fn registry() -> MotionRegistry {
        MotionRegistry::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_create_assigns_sequential_ids() {
        let registry = registry();

        let first = registry
            .create("One".into(), "".into(), Voter::new(1, None), -100)
            .await
            .unwrap();
        let second = registry
            .create("Two".into(), "".into(), Voter::new(1, None), -100)
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(first.status, MotionStatus::Active);
    }

    #[tokio::test]
    async fn test_get_unknown_motion() {
        let registry = registry();
        assert!(registry.get(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_active_excludes_closed() {
        let registry = registry();
        let kept = registry
            .create("Kept".into(), "".into(), Voter::new(1, None), -100)
            .await
            .unwrap();
        let closed = registry
            .create("Closed".into(), "".into(), Voter::new(1, None), -100)
            .await
            .unwrap();

        assert!(registry.try_close(closed.id).await.unwrap());

        let active = registry.list_active().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, kept.id);
    }

    #[tokio::test]
    async fn test_try_close_is_terminal() {
        let registry = registry();
        let motion = registry
            .create("M".into(), "".into(), Voter::new(1, None), -100)
            .await
            .unwrap();

        assert!(registry.try_close(motion.id).await.unwrap());
        assert!(!registry.try_close(motion.id).await.unwrap());

        let stored = registry.get(motion.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MotionStatus::Closed);
    }

    #[tokio::test]
    async fn test_try_close_unknown_motion() {
        let registry = registry();
        let err = registry.try_close(7).await.unwrap_err();
        assert!(matches!(err, GovernanceError::MotionNotFound(7)));
    }
}

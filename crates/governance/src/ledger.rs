//! Vote ledger
//!
//! Stores one vote per (motion, voter). A re-vote by the same voter replaces
//! the prior ballot in place; no history of earlier choices is retained. The
//! ledger does not check motion status, that belongs to the caller.

use std::sync::Arc;

use tracing::info;

use arbcom_core::storage::{JsonStorage, Storage};
use arbcom_core::utils;

use crate::{Ballot, GovernanceResult, MotionId, Tally, Vote, VoteChoice, Voter};

const VOTES_PATH: &str = "governance/votes";

/// Ledger of ballots, keyed by (motion, voter).
pub struct VoteLedger {
    storage: Arc<dyn Storage>,
}

impl VoteLedger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    fn vote_key(motion_id: MotionId, voter_id: i64) -> String {
        format!("{}/{}/{}", VOTES_PATH, motion_id, voter_id)
    }

    /// Insert or overwrite the (motion, voter) ballot. Last write wins;
    /// each write is a complete replacement of that voter's single row, so
    /// no synchronization beyond per-key atomicity is needed.
    pub async fn cast(
        &self,
        motion_id: MotionId,
        voter: Voter,
        choice: VoteChoice,
    ) -> GovernanceResult<()> {
        let key = Self::vote_key(motion_id, voter.id);
        let vote = Vote {
            motion_id,
            voter,
            choice,
            cast_at: utils::now(),
        };

        self.storage.put_json(&key, &vote).await?;
        info!(
            "Vote cast: {} voted {} on motion #{}",
            vote.voter.display(),
            vote.choice,
            motion_id
        );
        Ok(())
    }

    /// Aggregate counts and the ordered ballot list for a motion. Pure
    /// read; reflects the ledger state at call time.
    pub async fn tally(&self, motion_id: MotionId) -> GovernanceResult<Tally> {
        let prefix = format!("{}/{}/", VOTES_PATH, motion_id);
        let keys = self.storage.list(&prefix).await?;

        let mut votes = Vec::with_capacity(keys.len());
        for key in keys {
            let vote: Vote = self.storage.get_json(&key).await?;
            votes.push(vote);
        }
        votes.sort_by_key(|v| v.cast_at);

        let mut tally = Tally::default();
        for vote in votes {
            match vote.choice {
                VoteChoice::Support => tally.support += 1,
                VoteChoice::Oppose => tally.oppose += 1,
                VoteChoice::Abstain => tally.abstain += 1,
            }
            tally.ballots.push(Ballot {
                choice: vote.choice,
                voter: vote.voter.display(),
            });
        }

        Ok(tally)
    }
}

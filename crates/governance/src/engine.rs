//! Quorum decision engine
//!
//! Entry point for the inbound governance operations: motion creation, vote
//! casting and manual closing. Authorization is assumed to have been checked
//! by the command layer before an operation reaches the engine.
//!
//! After every vote on an Active motion the auto-close predicate is
//! evaluated against the current electorate configuration (never a per-motion
//! snapshot; changing the configuration retroactively affects motions opened
//! under a prior threshold). When either configuration value is unset,
//! auto-close is skipped entirely.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    coordinator::{CloseCoordinator, CloseDisposition, ClosedMotion},
    events::{EventBus, GovernanceEvent},
    ledger::VoteLedger,
    notify::Notifier,
    registry::MotionRegistry,
    settings::{Electorate, ElectorateSettings},
    ChannelId, GovernanceError, GovernanceResult, Motion, MotionId, Outcome, Tally, VoteChoice,
    Voter,
};

const ANNOUNCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reason string recorded for operator-initiated closes
pub const MANUAL_CLOSE_REASON: &str = "closed manually";

/// Inbound request to open a new motion
#[derive(Debug, Clone)]
pub struct MotionCreateRequest {
    pub title: String,
    pub content: String,
    pub creator: Voter,
    pub channel: ChannelId,
}

/// Inbound vote event
#[derive(Debug, Clone)]
pub struct VoteCast {
    pub motion_id: MotionId,
    pub voter: Voter,
    pub choice: VoteChoice,
}

/// An automatic close decision produced by the quorum predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub reason: String,
}

/// Evaluate the auto-close predicate for an Active motion.
///
/// `remaining` may be negative when more distinct voters cast ballots than
/// the configured active count; that is an operational anomaly, not a
/// crash. `max_possible_support` is computed as specified anyway, which only
/// makes the Failed branch fire earlier, so no special case is needed.
pub fn evaluate_auto_close(tally: &Tally, electorate: &Electorate) -> Option<Decision> {
    let support = i64::from(tally.support);
    let threshold = i64::from(electorate.threshold);

    if support >= threshold {
        return Some(Decision {
            outcome: Outcome::Passed,
            reason: format!("threshold reached ({} votes)", electorate.threshold),
        });
    }

    let total_cast = i64::from(tally.total_cast());
    let remaining = i64::from(electorate.active_count) - total_cast;
    let max_possible_support = support + remaining;

    if max_possible_support < threshold {
        return Some(Decision {
            outcome: Outcome::Failed,
            reason: format!(
                "threshold unreachable (max possible support: {}, threshold: {})",
                max_possible_support, electorate.threshold
            ),
        });
    }

    None
}

/// Outcome rule for manual closes: simple majority of the cast ballots,
/// independent of the electorate configuration.
pub fn manual_outcome(tally: &Tally) -> Outcome {
    if tally.support > tally.oppose {
        Outcome::Passed
    } else if tally.oppose > tally.support {
        Outcome::Failed
    } else {
        Outcome::Tie
    }
}

/// The motion engine: vote recording with upsert semantics, threshold-based
/// automatic closing and manual closing, delegating the exactly-once
/// close-and-archive step to the [`CloseCoordinator`].
pub struct MotionEngine {
    registry: Arc<MotionRegistry>,
    ledger: Arc<VoteLedger>,
    settings: Arc<ElectorateSettings>,
    coordinator: Arc<CloseCoordinator>,
    notifier: Arc<dyn Notifier>,
    events: EventBus,
    committee_channel: ChannelId,
    archive_channel: ChannelId,
}

impl MotionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<MotionRegistry>,
        ledger: Arc<VoteLedger>,
        settings: Arc<ElectorateSettings>,
        coordinator: Arc<CloseCoordinator>,
        notifier: Arc<dyn Notifier>,
        events: EventBus,
        committee_channel: ChannelId,
        archive_channel: ChannelId,
    ) -> Self {
        Self {
            registry,
            ledger,
            settings,
            coordinator,
            notifier,
            events,
            committee_channel,
            archive_channel,
        }
    }

    /// Open a new motion.
    pub async fn create_motion(&self, request: MotionCreateRequest) -> GovernanceResult<Motion> {
        let motion = self
            .registry
            .create(
                request.title,
                request.content,
                request.creator,
                request.channel,
            )
            .await?;

        self.events.publish(GovernanceEvent::MotionCreated {
            motion_id: motion.id,
        });
        Ok(motion)
    }

    /// Get a motion by id.
    pub async fn get_motion(&self, motion_id: MotionId) -> GovernanceResult<Option<Motion>> {
        self.registry.get(motion_id).await
    }

    /// List all Active motions.
    pub async fn list_active(&self) -> GovernanceResult<Vec<Motion>> {
        self.registry.list_active().await
    }

    /// Record a vote, publish the refreshed tally, and evaluate the
    /// auto-close predicate. A lost close race on the automatic path is
    /// absorbed silently; another trigger already did the work.
    pub async fn cast_vote(&self, event: VoteCast) -> GovernanceResult<Tally> {
        let motion = self
            .registry
            .get(event.motion_id)
            .await?
            .ok_or(GovernanceError::MotionNotFound(event.motion_id))?;

        if !motion.is_active() {
            return Err(GovernanceError::MotionAlreadyClosed(motion.id));
        }

        self.ledger
            .cast(motion.id, event.voter, event.choice)
            .await?;

        let tally = self.ledger.tally(motion.id).await?;
        self.events.publish(GovernanceEvent::TallyChanged {
            motion_id: motion.id,
            support: tally.support,
            oppose: tally.oppose,
            abstain: tally.abstain,
        });

        if let Some(electorate) = self.settings.electorate().await? {
            if let Some(decision) = evaluate_auto_close(&tally, &electorate) {
                info!(
                    "Motion #{} met auto-close condition: {} ({})",
                    motion.id, decision.outcome, decision.reason
                );
                self.coordinator
                    .close_and_archive(&motion, decision.outcome, &decision.reason, true)
                    .await?;
            }
        }

        Ok(tally)
    }

    /// Close a motion on operator request, deciding the outcome by simple
    /// majority of the cast ballots.
    pub async fn close_motion(&self, motion_id: MotionId) -> GovernanceResult<ClosedMotion> {
        let motion = self
            .registry
            .get(motion_id)
            .await?
            .ok_or(GovernanceError::MotionNotFound(motion_id))?;

        if !motion.is_active() {
            return Err(GovernanceError::MotionAlreadyClosed(motion_id));
        }

        let tally = self.ledger.tally(motion_id).await?;
        let outcome = manual_outcome(&tally);

        match self
            .coordinator
            .close_and_archive(&motion, outcome, MANUAL_CLOSE_REASON, false)
            .await?
        {
            CloseDisposition::Closed(closed) => Ok(closed),
            // Raced with another trigger and lost; to the operator the
            // motion is simply already closed.
            CloseDisposition::Lost => Err(GovernanceError::MotionAlreadyClosed(motion_id)),
        }
    }

    /// Update the electorate configuration and announce it to the committee
    /// channel (pinned, best-effort) with a copy to the archive channel.
    pub async fn update_electorate(
        &self,
        active_count: u32,
        threshold: u32,
    ) -> GovernanceResult<Electorate> {
        let electorate = self.settings.set_electorate(active_count, threshold).await?;

        let announcement = format!(
            "Committee settings updated\nActive arbitrators: {}\nMajority threshold: {}\n\nThese values drive automatic motion outcomes.",
            electorate.active_count, electorate.threshold
        );

        match tokio::time::timeout(
            ANNOUNCE_TIMEOUT,
            self.notifier.send(self.committee_channel, &announcement),
        )
        .await
        {
            Ok(Ok(message)) => {
                // Pinning may fail if the bot lacks permission
                match tokio::time::timeout(
                    ANNOUNCE_TIMEOUT,
                    self.notifier.pin(self.committee_channel, message),
                )
                .await
                {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Failed to pin settings announcement: {}", e),
                    Err(_) => warn!("Pinning settings announcement timed out"),
                }
            }
            Ok(Err(e)) => error!("Failed to announce settings update: {}", e),
            Err(_) => error!("Settings announcement timed out"),
        }

        match tokio::time::timeout(
            ANNOUNCE_TIMEOUT,
            self.notifier.send(self.archive_channel, &announcement),
        )
        .await
        {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Failed to copy settings update to archive channel: {}", e),
            Err(_) => error!("Settings update copy to archive channel timed out"),
        }

        Ok(electorate)
    }
}

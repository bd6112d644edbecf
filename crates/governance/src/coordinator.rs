//! Close/archive coordinator
//!
//! Single entry point shared by the automatic and manual close paths. The
//! coordinator first races for the Active to Closed transition; only the
//! winner reads the final tally, formats the archival record and submits it
//! to the notification sink, so the archival side effect happens exactly
//! once. The transition commits before any notification is attempted, and a
//! failed or slow delivery never rolls it back.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::{
    events::{EventBus, GovernanceEvent},
    ledger::VoteLedger,
    notify::Notifier,
    registry::MotionRegistry,
    ChannelId, GovernanceResult, Motion, Outcome, Tally, VoteChoice,
};

/// Single best-effort attempt per notification; no retry loop.
const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a close attempt
#[derive(Debug)]
pub enum CloseDisposition {
    /// This call performed the transition and emitted the archival record
    Closed(ClosedMotion),
    /// Another trigger closed the motion first; nothing was done
    Lost,
}

/// Summary of a close this call performed
#[derive(Debug, Clone)]
pub struct ClosedMotion {
    pub motion: Motion,
    pub outcome: Outcome,
    pub reason: String,
    pub tally: Tally,
}

/// Coordinates the atomic state transition and the exactly-once archival
/// side effect.
pub struct CloseCoordinator {
    registry: Arc<MotionRegistry>,
    ledger: Arc<VoteLedger>,
    notifier: Arc<dyn Notifier>,
    events: EventBus,
    archive_channel: ChannelId,
}

impl CloseCoordinator {
    pub fn new(
        registry: Arc<MotionRegistry>,
        ledger: Arc<VoteLedger>,
        notifier: Arc<dyn Notifier>,
        events: EventBus,
        archive_channel: ChannelId,
    ) -> Self {
        Self {
            registry,
            ledger,
            notifier,
            events,
            archive_channel,
        }
    }

    /// Close the motion and archive it, exactly once across all concurrent
    /// triggers. `automatic` selects whether the originating channel also
    /// receives a "motion closed" notice (suppressed for manual closes,
    /// which the operator already knows about).
    pub async fn close_and_archive(
        &self,
        motion: &Motion,
        outcome: Outcome,
        reason: &str,
        automatic: bool,
    ) -> GovernanceResult<CloseDisposition> {
        if !self.registry.try_close(motion.id).await? {
            debug!("Lost close transition for motion #{}", motion.id);
            return Ok(CloseDisposition::Lost);
        }

        // The Closed status is committed. Everything below is best-effort
        // and never rolls it back.
        let tally = self.ledger.tally(motion.id).await?;

        let record = format_archival_record(motion, &tally, outcome, reason);
        self.deliver(self.archive_channel, &record).await;

        if automatic {
            let notice = format!(
                "Motion #{} closed automatically: {} ({})",
                motion.id, outcome, reason
            );
            self.deliver(motion.channel, &notice).await;
        }

        self.events.publish(GovernanceEvent::MotionClosed {
            motion_id: motion.id,
            outcome,
            reason: reason.to_string(),
            breakdown: tally.ballots.clone(),
        });

        Ok(CloseDisposition::Closed(ClosedMotion {
            motion: motion.clone(),
            outcome,
            reason: reason.to_string(),
            tally,
        }))
    }

    /// One bounded delivery attempt; failures are logged and dropped.
    async fn deliver(&self, channel: ChannelId, text: &str) {
        match tokio::time::timeout(NOTIFY_TIMEOUT, self.notifier.send(channel, text)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Failed to deliver notification to {}: {}", channel, e),
            Err(_) => error!("Notification to {} timed out", channel),
        }
    }
}

/// Permanent, human-readable summary of a closed motion.
fn format_archival_record(
    motion: &Motion,
    tally: &Tally,
    outcome: Outcome,
    reason: &str,
) -> String {
    let mut record = format!(
        "Motion #{} closed\nTitle: {}\nContent: {}\nProposer: {}\n\nResults:\n",
        motion.id,
        motion.title,
        motion.content,
        motion.creator.display(),
    );

    for (choice, count) in [
        (VoteChoice::Support, tally.support),
        (VoteChoice::Oppose, tally.oppose),
        (VoteChoice::Abstain, tally.abstain),
    ] {
        let voters: Vec<&str> = tally
            .ballots
            .iter()
            .filter(|b| b.choice == choice)
            .map(|b| b.voter.as_str())
            .collect();
        if !voters.is_empty() {
            record.push_str(&format!(
                "{} ({}): {}\n",
                choice,
                count,
                voters.join(", ")
            ));
        }
    }

    record.push_str(&format!("\nFinal outcome: {}\nNote: {}", outcome, reason));
    record
}

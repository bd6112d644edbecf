//! Motion lifecycle and quorum decision engine.
//!
//! Records votes cast by a fixed electorate on motions and decides,
//! automatically or on demand, whether a motion has reached a quorum-based
//! outcome. The close-and-archive side effect happens exactly once even when
//! concurrent triggers (votes, a manual close) race for it; the single
//! synchronization primitive is the storage-layer conditional update behind
//! [`registry::MotionRegistry::try_close`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use arbcom_core::storage::StorageError;

pub mod coordinator;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod notify;
pub mod registry;
pub mod roster;
pub mod settings;

pub use coordinator::{CloseCoordinator, CloseDisposition, ClosedMotion};
pub use engine::{MotionCreateRequest, MotionEngine, VoteCast};
pub use events::{EventBus, GovernanceEvent};
pub use ledger::VoteLedger;
pub use notify::{MessageRef, Notifier, NotifyError, NotifyResult};
pub use registry::MotionRegistry;
pub use roster::ArbitratorRoster;
pub use settings::{Electorate, ElectorateSettings};

/// Identifier of a motion, assigned at creation
pub type MotionId = u64;

/// Identifier of a chat channel or group
pub type ChannelId = i64;

/// Error types for governance operations
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// Operation referenced an unknown motion
    #[error("Motion not found: #{0}")]
    MotionNotFound(MotionId),

    /// Vote or manual close attempted against a closed motion
    #[error("Motion #{0} is already closed")]
    MotionAlreadyClosed(MotionId),

    /// Rejected electorate configuration; the previous values are retained
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Error with storage
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;

/// Lifecycle status of a motion. The only transition is Active to Closed,
/// and it is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionStatus {
    /// Open for voting
    Active,
    /// Closed and archived
    Closed,
}

/// A ballot choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteChoice {
    Support,
    Oppose,
    Abstain,
}

impl fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteChoice::Support => write!(f, "support"),
            VoteChoice::Oppose => write!(f, "oppose"),
            VoteChoice::Abstain => write!(f, "abstain"),
        }
    }
}

/// Final outcome of a closed motion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed,
    /// Manual close with equal support and oppose counts
    Tie,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Passed => write!(f, "passed"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::Tie => write!(f, "tie"),
        }
    }
}

/// An electorate member
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    /// Stable numeric identity
    pub id: i64,
    /// Display handle, when known
    pub handle: Option<String>,
}

impl Voter {
    pub fn new(id: i64, handle: Option<String>) -> Self {
        Self { id, handle }
    }

    /// Handle when known, otherwise the numeric id
    pub fn display(&self) -> String {
        match &self.handle {
            Some(handle) => handle.clone(),
            None => self.id.to_string(),
        }
    }
}

/// A proposal subject to a vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Motion {
    /// Unique identifier, assigned at creation
    pub id: MotionId,
    /// The title of the motion
    pub title: String,
    /// Free-text content
    pub content: String,
    /// The member that raised the motion
    pub creator: Voter,
    /// Channel the motion originated in
    pub channel: ChannelId,
    /// When the motion was created
    pub created_at: DateTime<Utc>,
    /// Current lifecycle status
    pub status: MotionStatus,
}

impl Motion {
    pub fn is_active(&self) -> bool {
        self.status == MotionStatus::Active
    }
}

/// A single recorded ballot. At most one exists per (motion, voter); a
/// re-vote replaces it in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub motion_id: MotionId,
    pub voter: Voter,
    pub choice: VoteChoice,
    /// When the (latest) ballot was cast
    pub cast_at: DateTime<Utc>,
}

/// One entry of the archival voter breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    pub choice: VoteChoice,
    /// Voter display handle, or the numeric id when no handle is known
    pub voter: String,
}

/// Aggregate counts for a motion, plus the ordered ballot list for archival
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tally {
    pub support: u32,
    pub oppose: u32,
    pub abstain: u32,
    /// Ballots in cast order
    pub ballots: Vec<Ballot>,
}

impl Tally {
    /// Total number of ballots cast
    pub fn total_cast(&self) -> u32 {
        self.support + self.oppose + self.abstain
    }
}

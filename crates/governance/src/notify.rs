//! Notification sink interface
//!
//! The sink is an external, non-transactional resource. Callers treat every
//! delivery as best-effort: failures are explicit result values, consumed
//! under a log-and-continue policy, never rolled back into committed state.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::ChannelId;

/// Opaque reference to a delivered message, usable for pinning
pub type MessageRef = i64;

/// Delivery errors from the notification sink
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(ChannelId),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Outbound notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver formatted text to a channel.
    async fn send(&self, channel: ChannelId, text: &str) -> NotifyResult<MessageRef>;

    /// Pin a previously delivered message. Best-effort; callers ignore
    /// failures beyond a log line.
    async fn pin(&self, channel: ChannelId, message: MessageRef) -> NotifyResult<()>;
}

/// Notifier that drops everything, logging at debug level. Used when no
/// outbound channel is wired up.
pub struct NullNotifier;

#[async_trait]
impl Notifier for NullNotifier {
    async fn send(&self, channel: ChannelId, text: &str) -> NotifyResult<MessageRef> {
        debug!("Dropping notification to {}: {}", channel, text);
        Ok(0)
    }

    async fn pin(&self, channel: ChannelId, message: MessageRef) -> NotifyResult<()> {
        debug!("Dropping pin of message {} in {}", message, channel);
        Ok(())
    }
}

/// Test double that records deliveries and can be switched into a failing
/// mode.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<(ChannelId, String)>>,
    pinned: std::sync::Mutex<Vec<(ChannelId, MessageRef)>>,
    failing: std::sync::atomic::AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn pinned(&self) -> Vec<(ChannelId, MessageRef)> {
        self.pinned.lock().unwrap().clone()
    }

    /// Messages delivered to one channel.
    pub fn sent_to(&self, channel: ChannelId) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == channel)
            .map(|(_, text)| text.clone())
            .collect()
    }

    fn is_failing(&self) -> bool {
        self.failing.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, channel: ChannelId, text: &str) -> NotifyResult<MessageRef> {
        if self.is_failing() {
            return Err(NotifyError::ChannelUnavailable(channel));
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push((channel, text.to_string()));
        Ok(sent.len() as MessageRef)
    }

    async fn pin(&self, channel: ChannelId, message: MessageRef) -> NotifyResult<()> {
        if self.is_failing() {
            return Err(NotifyError::ChannelUnavailable(channel));
        }
        self.pinned.lock().unwrap().push((channel, message));
        Ok(())
    }
}

//! Background change-feed monitor
//!
//! Watches an external recent-changes feed for edits to the configured
//! arbitration pages and posts a notice to the committee channel. The feed
//! is unrelated to the decision engine: notices flow through a bounded
//! channel into a single consumer task that owns the notifier, so a slow or
//! failing sink never backs up into the watcher beyond the channel bound.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use arbcom_governance::{ChannelId, Notifier};

pub mod feed;

pub use feed::JsonLinesFeed;

/// Errors from the change feed
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Feed connection lost: {0}")]
    ConnectionLost(String),

    #[error("Malformed feed event: {0}")]
    Malformed(String),
}

pub type MonitorResult<T> = Result<T, MonitorError>;

/// One edit event from the recent-changes feed
#[derive(Debug, Clone)]
pub struct FeedEvent {
    /// Which wiki the edit happened on
    pub wiki: String,
    /// Edited page title
    pub title: String,
    /// Editing user
    pub user: String,
    /// Edit summary
    pub comment: String,
    /// Link to the diff
    pub diff_url: String,
}

/// Source of feed events. `next` returns `Ok(None)` when the feed is
/// exhausted (test feeds) and an error when the connection drops.
#[async_trait]
pub trait ChangeFeed: Send {
    async fn next(&mut self) -> MonitorResult<Option<FeedEvent>>;
}

/// Watcher configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Wiki to watch
    pub wiki: String,
    /// Page titles that trigger a notice
    pub watched_titles: Vec<String>,
    /// Channel notices are delivered to
    pub channel: ChannelId,
    /// Delay before reconnecting a dropped feed
    pub reconnect_delay: Duration,
    /// Bound of the watcher-to-notifier channel
    pub queue_depth: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            wiki: "zhwiki".to_string(),
            watched_titles: Vec::new(),
            channel: 0,
            reconnect_delay: Duration::from_secs(30),
            queue_depth: 32,
        }
    }
}

/// A notice queued for delivery
#[derive(Debug)]
struct Notice {
    channel: ChannelId,
    text: String,
}

/// Filter a feed event against the watch list and format the notice text.
fn notice_for(config: &MonitorConfig, event: &FeedEvent) -> Option<String> {
    if event.wiki != config.wiki {
        return None;
    }
    if !config.watched_titles.iter().any(|t| t == &event.title) {
        return None;
    }

    Some(format!(
        "New arbitration page edit\nPage: {}\nUser: {}\nSummary: {}\nDiff: {}",
        event.title, event.user, event.comment, event.diff_url
    ))
}

/// Handle to the running monitor tasks
pub struct Monitor {
    watcher: JoinHandle<()>,
    deliverer: JoinHandle<()>,
}

impl Monitor {
    /// Start the watcher and the delivery consumer. `connect` is invoked
    /// for the initial connection and after every feed drop.
    pub fn start<F, C>(config: MonitorConfig, notifier: Arc<dyn Notifier>, connect: C) -> Self
    where
        F: ChangeFeed + 'static,
        C: Fn() -> F + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Notice>(config.queue_depth);

        let deliverer = tokio::spawn(deliver_loop(rx, notifier));
        let watcher = tokio::spawn(watch_loop(config, connect, tx));

        Self { watcher, deliverer }
    }

    /// Stop both tasks.
    pub fn shutdown(self) {
        self.watcher.abort();
        self.deliverer.abort();
    }

    /// Wait for the watcher to finish (test feeds that run dry). The
    /// delivery task drains the queue before exiting.
    pub async fn join(self) {
        let _ = self.watcher.await;
        let _ = self.deliverer.await;
    }
}

async fn watch_loop<F, C>(config: MonitorConfig, connect: C, tx: mpsc::Sender<Notice>)
where
    F: ChangeFeed + 'static,
    C: Fn() -> F + Send + 'static,
{
    info!("Starting change-feed monitor for {}", config.wiki);
    loop {
        let mut feed = connect();
        loop {
            match feed.next().await {
                Ok(Some(event)) => {
                    if let Some(text) = notice_for(&config, &event) {
                        let notice = Notice {
                            channel: config.channel,
                            text,
                        };
                        // A full queue applies backpressure to the watcher
                        // rather than dropping or blocking the notifier.
                        if tx.send(notice).await.is_err() {
                            warn!("Notice consumer gone, stopping monitor");
                            return;
                        }
                    }
                }
                Ok(None) => {
                    info!("Change feed ended");
                    return;
                }
                Err(e) => {
                    warn!(
                        "Monitor connection lost: {}. Reconnecting in {:?}",
                        e, config.reconnect_delay
                    );
                    tokio::time::sleep(config.reconnect_delay).await;
                    break;
                }
            }
        }
    }
}

async fn deliver_loop(mut rx: mpsc::Receiver<Notice>, notifier: Arc<dyn Notifier>) {
    while let Some(notice) = rx.recv().await {
        if let Err(e) = notifier.send(notice.channel, &notice.text).await {
            error!("Failed to deliver feed notice: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbcom_governance::notify::RecordingNotifier;

    /// Scripted feed for tests
    struct ScriptedFeed {
        events: std::vec::IntoIter<MonitorResult<FeedEvent>>,
    }

    impl ScriptedFeed {
        fn new(events: Vec<MonitorResult<FeedEvent>>) -> Self {
            Self {
                events: events.into_iter(),
            }
        }
    }

    #[async_trait]
    impl ChangeFeed for ScriptedFeed {
        async fn next(&mut self) -> MonitorResult<Option<FeedEvent>> {
            match self.events.next() {
                Some(Ok(event)) => Ok(Some(event)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        }
    }

    fn event(wiki: &str, title: &str) -> FeedEvent {
        FeedEvent {
            wiki: wiki.into(),
            title: title.into(),
            user: "editor".into(),
            comment: "summary".into(),
            diff_url: "https://example.org/diff/1".into(),
        }
    }

    fn config() -> MonitorConfig {
        MonitorConfig {
            wiki: "zhwiki".into(),
            watched_titles: vec!["Arbitration/Requests".into()],
            channel: -42,
            reconnect_delay: Duration::from_millis(1),
            queue_depth: 8,
        }
    }

    #[test]
    fn test_notice_filtering() {
        let config = config();

        assert!(notice_for(&config, &event("zhwiki", "Arbitration/Requests")).is_some());
        assert!(notice_for(&config, &event("enwiki", "Arbitration/Requests")).is_none());
        assert!(notice_for(&config, &event("zhwiki", "Village pump")).is_none());

        let text = notice_for(&config, &event("zhwiki", "Arbitration/Requests")).unwrap();
        assert!(text.contains("Page: Arbitration/Requests"));
        assert!(text.contains("User: editor"));
    }

    #[tokio::test]
    async fn test_matching_events_are_delivered() {
        let notifier = Arc::new(RecordingNotifier::new());
        let events = vec![
            Ok(event("zhwiki", "Arbitration/Requests")),
            Ok(event("zhwiki", "Unrelated page")),
            Ok(event("zhwiki", "Arbitration/Requests")),
        ];

        // The scripted feed is consumed on first connect; reconnects see an
        // empty feed and stop.
        let script = std::sync::Mutex::new(Some(events));
        let monitor = Monitor::start(config(), notifier.clone(), move || {
            ScriptedFeed::new(script.lock().unwrap().take().unwrap_or_default())
        });
        monitor.join().await;

        let delivered = notifier.sent_to(-42);
        assert_eq!(delivered.len(), 2);
        assert!(delivered[0].contains("Arbitration/Requests"));
    }

    #[tokio::test]
    async fn test_feed_error_triggers_reconnect() {
        let notifier = Arc::new(RecordingNotifier::new());
        let scripts = std::sync::Mutex::new(vec![
            // Second connection: one matching event, then done
            vec![Ok(event("zhwiki", "Arbitration/Requests"))],
            // First connection: drops immediately
            vec![Err(MonitorError::ConnectionLost("reset".into()))],
        ]);

        let monitor = Monitor::start(config(), notifier.clone(), move || {
            ScriptedFeed::new(scripts.lock().unwrap().pop().unwrap_or_default())
        });
        monitor.join().await;

        assert_eq!(notifier.sent_to(-42).len(), 1);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_absorbed() {
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.set_failing(true);

        let script = std::sync::Mutex::new(Some(vec![Ok(event(
            "zhwiki",
            "Arbitration/Requests",
        ))]));
        let monitor = Monitor::start(config(), notifier.clone(), move || {
            ScriptedFeed::new(script.lock().unwrap().take().unwrap_or_default())
        });
        monitor.join().await;

        assert!(notifier.sent_to(-42).is_empty());
    }
}

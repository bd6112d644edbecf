//! JSON-lines change feed
//!
//! Reads one recent-change JSON document per line from any buffered async
//! reader. Deployments pipe an SSE client's data lines into the daemon's
//! stdin; tests feed it from a byte slice. Lines that do not parse are
//! skipped.

use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::trace;

use async_trait::async_trait;

use crate::{ChangeFeed, FeedEvent, MonitorError, MonitorResult};

/// Wire shape of a wikimedia recent-change event, reduced to the fields the
/// monitor uses.
#[derive(Debug, Deserialize)]
struct RecentChange {
    wiki: String,
    #[serde(rename = "type")]
    change_type: String,
    title: String,
    user: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    server_url: String,
    #[serde(default)]
    revision: Revision,
}

#[derive(Debug, Default, Deserialize)]
struct Revision {
    new: Option<u64>,
}

impl RecentChange {
    fn into_event(self) -> Option<FeedEvent> {
        if self.change_type != "edit" {
            return None;
        }
        let diff_url = match self.revision.new {
            Some(rev) => format!("{}/w/index.php?diff={}", self.server_url, rev),
            None => self.server_url.clone(),
        };
        Some(FeedEvent {
            wiki: self.wiki,
            title: self.title,
            user: self.user,
            comment: self.comment,
            diff_url,
        })
    }
}

/// Feed over newline-delimited JSON
pub struct JsonLinesFeed<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesFeed<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl JsonLinesFeed<BufReader<tokio::io::Stdin>> {
    /// Feed over the process stdin.
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> ChangeFeed for JsonLinesFeed<R> {
    async fn next(&mut self) -> MonitorResult<Option<FeedEvent>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| MonitorError::ConnectionLost(e.to_string()))?;

            let Some(line) = line else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<RecentChange>(&line) {
                Ok(change) => {
                    if let Some(event) = change.into_event() {
                        return Ok(Some(event));
                    }
                    // Non-edit event, keep reading
                }
                Err(e) => trace!("Skipping undecodable feed line: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parses_edit_events() {
        let input = concat!(
            r#"{"wiki":"zhwiki","type":"edit","title":"Arbitration/Requests","user":"editor","comment":"fix","server_url":"https://zh.wikipedia.org","revision":{"new":42,"old":41}}"#,
            "\n",
            r#"{"wiki":"zhwiki","type":"log","title":"Some log","user":"admin"}"#,
            "\n",
            "not json\n",
        );

        let mut feed = JsonLinesFeed::new(input.as_bytes());

        let event = feed.next().await.unwrap().unwrap();
        assert_eq!(event.title, "Arbitration/Requests");
        assert_eq!(event.user, "editor");
        assert_eq!(
            event.diff_url,
            "https://zh.wikipedia.org/w/index.php?diff=42"
        );

        // Log events and garbage lines are skipped; the feed then ends
        assert!(feed.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_input_ends_immediately() {
        let mut feed = JsonLinesFeed::new(&b""[..]);
        assert!(feed.next().await.unwrap().is_none());
    }
}

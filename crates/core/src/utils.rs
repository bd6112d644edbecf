//! Small shared utilities

use chrono::{DateTime, Utc};

/// Current wall-clock time, UTC
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    Push,
    PullRequest,
    Merge,
    /// Synthetic record written by the `/test-db` diagnostic.
    Test,
}

impl EventAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Push => "push",
            Self::PullRequest => "pull_request",
            Self::Merge => "merge",
            Self::Test => "test",
        }
    }
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(Self::Push),
            "pull_request" => Ok(Self::PullRequest),
            "merge" => Ok(Self::Merge),
            "test" => Ok(Self::Test),
            other => Err(format!("unknown event action `{other}`")),
        }
    }
}

/// A normalized event before the store has assigned its position and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub id: String,
    pub request_id: String,
    pub author: String,
    pub action: EventAction,
    pub from_branch: Option<String>,
    pub to_branch: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredEvent {
    /// Store-assigned insertion sequence, rendered as a string.
    #[serde(rename = "_id", serialize_with = "serialize_seq")]
    pub seq: i64,
    pub id: String,
    pub request_id: String,
    pub author: String,
    pub action: EventAction,
    pub from_branch: Option<String>,
    pub to_branch: String,
    pub timestamp: DateTime<Utc>,
}

impl StoredEvent {
    pub fn from_new(event: NewEvent, seq: i64, timestamp: DateTime<Utc>) -> Self {
        Self {
            seq,
            id: event.id,
            request_id: event.request_id,
            author: event.author,
            action: event.action,
            from_branch: event.from_branch,
            to_branch: event.to_branch,
            timestamp,
        }
    }
}

fn serialize_seq<S: serde::Serializer>(seq: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(seq)
}

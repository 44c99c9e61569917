use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

const SUFFIX: &str = "_journal";
const REVISION_WIDTH: usize = 8;
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6fZ";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y%m%dT%H%M%S%.f";

/// Identifier of one physical journal segment.
///
/// Rendered as `<revision>_<timestamp>_journal`, e.g.
/// `00000042_20261019T101500.123456Z_journal`. The revision count is
/// zero-padded and the timestamp uses the ISO-8601 basic format, so lexical
/// order of the rendered names equals the derived `Ord` (revision first, then
/// timestamp).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenerationId {
    revision: u64,
    created_at: DateTime<Utc>,
}

impl GenerationId {
    /// Timestamps are truncated to microseconds so they survive a round trip
    /// through the file name.
    pub fn new(revision: u64, created_at: DateTime<Utc>) -> Self {
        let created_at =
            DateTime::from_timestamp_micros(created_at.timestamp_micros()).unwrap_or(created_at);
        Self {
            revision,
            created_at,
        }
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn file_name(&self) -> String {
        format!(
            "{:0width$}_{}{}",
            self.revision,
            self.created_at.format(TIMESTAMP_FORMAT),
            SUFFIX,
            width = REVISION_WIDTH
        )
    }

    /// Returns an identifier that sorts strictly after `latest`.
    ///
    /// Identifiers already after `latest` are returned unchanged. Otherwise the
    /// revision is raised to `latest`'s and the timestamp set one microsecond
    /// past it.
    pub fn succeeding(self, latest: &GenerationId) -> Self {
        if self > *latest {
            return self;
        }
        Self {
            revision: latest.revision,
            created_at: latest.created_at + Duration::microseconds(1),
        }
    }

    /// The next identifier in the same revision.
    pub fn bump(&self) -> Self {
        Self {
            revision: self.revision,
            created_at: self.created_at + Duration::microseconds(1),
        }
    }

    /// Parse a generation file name; `None` for anything else in the directory.
    pub fn parse(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(SUFFIX)?;
        let (revision, timestamp) = stem.split_once('_')?;
        if revision.len() < REVISION_WIDTH || !revision.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let revision = revision.parse().ok()?;
        let timestamp = timestamp.strip_suffix('Z')?;
        let naive = NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_PARSE_FORMAT).ok()?;
        Some(Self {
            revision,
            created_at: naive.and_utc(),
        })
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

impl FromStr for GenerationId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("not a generation identifier: {}", s))
    }
}

impl TryFrom<String> for GenerationId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GenerationId> for String {
    fn from(id: GenerationId) -> Self {
        id.file_name()
    }
}

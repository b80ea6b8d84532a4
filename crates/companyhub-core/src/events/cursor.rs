use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Position of an entry in the event log.
///
/// Cursors use the Redis stream id layout `<millis>-<seq>` and order first
/// by milliseconds, then by sequence number. A consumer reading "after" a
/// cursor receives only entries strictly greater than it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor {
    millis: u64,
    seq: u64,
}

impl Cursor {
    /// The position before any entry.
    pub const ZERO: Cursor = Cursor { millis: 0, seq: 0 };

    pub const fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for Cursor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (millis, seq) = match s.split_once('-') {
            Some((millis, seq)) => (millis, Some(seq)),
            None => (s, None),
        };
        let millis = millis
            .parse::<u64>()
            .map_err(|_| CoreError::invalid_cursor(s))?;
        let seq = match seq {
            Some(seq) => seq.parse::<u64>().map_err(|_| CoreError::invalid_cursor(s))?,
            None => 0,
        };
        Ok(Self::new(millis, seq))
    }
}

impl Serialize for Cursor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Where a consumer starts reading when it subscribes for the first time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Skip everything already in the log.
    Latest,
    /// Replay the whole retained log.
    Beginning,
    /// Resume after a previously applied entry.
    After(Cursor),
}

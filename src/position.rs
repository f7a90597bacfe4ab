//! Stream positions.
//!
//! A [`Position`] marks progress through the source's change stream: the
//! wall-clock second a change was committed plus its ordinal within that
//! second. Positions order lexicographically by `(secs, inc)`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error parsing a position from its text form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid position '{input}': expected <secs>.<inc>")]
pub struct ParsePositionError {
    input: String,
}

/// Totally ordered marker of change-stream progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    /// Seconds since the Unix epoch.
    pub secs: u32,
    /// Ordinal of the change within `secs`.
    pub inc: u32,
}

impl Position {
    /// Position used to open a stream when nothing has been archived yet.
    pub const ZERO: Position = Position { secs: 0, inc: 0 };

    pub const fn new(secs: u32, inc: u32) -> Self {
        Self { secs, inc }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.secs, self.inc)
    }
}

impl FromStr for Position {
    type Err = ParsePositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePositionError {
            input: s.to_string(),
        };
        let (secs, inc) = s.split_once('.').ok_or_else(err)?;
        Ok(Self {
            secs: secs.parse().map_err(|_| err())?,
            inc: inc.parse().map_err(|_| err())?,
        })
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Position {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

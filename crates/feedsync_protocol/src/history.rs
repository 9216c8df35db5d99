//! History entries and the subsumption check.

use crate::error::{ProtocolError, ProtocolResult};
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded edit of an item.
///
/// Entries are immutable once created. A sync's history keeps them newest
/// first; the first entry is the "topmost" one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawHistory")]
pub struct History {
    by: Option<String>,
    when: Option<DateTime<Utc>>,
    sequence: u32,
}

impl History {
    /// Creates a history entry.
    ///
    /// An empty `by` counts as absent. `when` is normalized to whole UTC
    /// seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidArgument`] if `sequence` is zero or if
    /// neither `by` nor `when` is present.
    pub fn new(
        by: Option<impl Into<String>>,
        when: Option<DateTime<Utc>>,
        sequence: u32,
    ) -> ProtocolResult<Self> {
        let by = by.map(Into::into).filter(|b: &String| !b.is_empty());
        if by.is_none() && when.is_none() {
            return Err(ProtocolError::invalid_argument(
                "history requires either `by` or `when`",
            ));
        }
        if sequence == 0 {
            return Err(ProtocolError::invalid_argument(
                "history sequence must be positive",
            ));
        }
        Ok(Self {
            by,
            when: when.map(timestamp::normalize),
            sequence,
        })
    }

    /// The author of the edit.
    pub fn by(&self) -> Option<&str> {
        self.by.as_deref()
    }

    /// When the edit happened.
    pub fn when(&self) -> Option<DateTime<Utc>> {
        self.when
    }

    /// The update counter value this edit produced.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Returns true if `reference` already accounts for this entry.
    ///
    /// With authors on both sides, the authors must be identical and
    /// `reference` must be at least as recent in sequence. Anonymous entries
    /// cannot be attributed, so they are only subsumed by an entry with the
    /// same timestamp and a sequence at least as high.
    pub fn is_subsumed_by(&self, reference: &History) -> bool {
        match (&self.by, &reference.by) {
            (Some(by), Some(other)) => by == other && reference.sequence >= self.sequence,
            (None, None) => {
                self.when.is_some()
                    && self.when == reference.when
                    && reference.sequence >= self.sequence
            }
            _ => false,
        }
    }
}

/// Stored form of a history entry, validated through [`History::new`].
#[derive(Deserialize)]
struct RawHistory {
    #[serde(default)]
    by: Option<String>,
    #[serde(default)]
    when: Option<DateTime<Utc>>,
    sequence: u32,
}

impl TryFrom<RawHistory> for History {
    type Error = ProtocolError;

    fn try_from(raw: RawHistory) -> ProtocolResult<Self> {
        History::new(raw.by, raw.when, raw.sequence)
    }
}

/// Returns true when `reference` subsumes `candidate`.
pub fn subsumes(candidate: &History, reference: &History) -> bool {
    candidate.is_subsumed_by(reference)
}

//! Persisted entity types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evaluate::{AlertCandidate, AlertKind};

/// A fired alert as persisted by the store.
///
/// Created when a candidate survives the suppression gate; after that only
/// `acknowledged` ever changes, through [`Store::acknowledge_alert`]. The
/// evaluation path never mutates existing records.
///
/// [`Store::acknowledge_alert`]: crate::store::Store::acknowledge_alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Store-assigned identifier; 0 until saved.
    pub id: i64,
    pub source_id: String,
    pub host_id: String,
    pub kind: AlertKind,
    pub message: String,
    pub fired_at: DateTime<Utc>,
    pub acknowledged: bool,
}

impl AlertRecord {
    /// Build an unsaved record from an admitted candidate.
    pub fn from_candidate(candidate: &AlertCandidate, fired_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            source_id: candidate.source_id.clone(),
            host_id: candidate.host_id.clone(),
            kind: candidate.kind,
            message: candidate.message.clone(),
            fired_at,
            acknowledged: false,
        }
    }
}

/// Reporting state of one source, updated on every accepted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLiveness {
    pub source_id: String,
    pub host_id: String,
    pub last_seen_at: DateTime<Utc>,
}

/// Query filter for [`Store::list_alerts`](crate::store::Store::list_alerts).
#[derive(Debug, Clone)]
pub struct AlertFilter {
    /// Restrict to (un)acknowledged alerts; `None` returns both.
    pub acknowledged: Option<bool>,
    /// Start of time range (inclusive).
    pub since: DateTime<Utc>,
    /// End of time range (inclusive).
    pub until: DateTime<Utc>,
}

use serde::{Serialize, Deserialize};
use std::collections::{BTreeMap, BTreeSet};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::validation::{validate_options, validate_user_id, ValidationError};

/// Returns a new time-ordered poll id.
///
/// Ids are UUIDv7: a millisecond timestamp prefix followed by random bits, so
/// their hyphenated form sorts by creation time.
pub fn new_poll_id() -> Uuid {
    Uuid::now_v7()
}

/// A poll and its current tally.
///
/// Values returned by the store are point-in-time snapshots; they do not see
/// votes recorded after they were loaded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub owner: String,
    pub votes: u64,
    pub voters: BTreeSet<String>,
    pub options: BTreeMap<String, u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub options: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub poll_id: Uuid,
    pub option: String,
    pub user: String,
}

impl Poll {
    /// Builds a fresh poll owned by `owner` with every option at zero.
    pub fn new(owner: impl Into<String>, options: &[String]) -> Result<Self, ValidationError> {
        let owner = owner.into();
        validate_user_id(&owner)?;
        validate_options(options)?;

        Ok(Self {
            id: new_poll_id(),
            owner,
            votes: 0,
            voters: BTreeSet::new(),
            options: options.iter().map(|name| (name.clone(), 0)).collect(),
        })
    }

    pub fn has_option(&self, option: &str) -> bool {
        self.options.contains_key(option)
    }

    pub fn has_voted(&self, user_id: &str) -> bool {
        self.voters.contains(user_id)
    }

    /// Creation time carried in the id, if the id is time-ordered.
    pub fn created_at(&self) -> Option<OffsetDateTime> {
        let (secs, nanos) = self.id.get_timestamp()?.to_unix();
        let nanos = i128::from(secs) * 1_000_000_000 + i128::from(nanos);
        OffsetDateTime::from_unix_timestamp_nanos(nanos).ok()
    }

    /// True when the total equals both the voter count and the sum of tallies.
    pub fn is_consistent(&self) -> bool {
        let tallied: u64 = self.options.values().sum();
        self.votes == self.voters.len() as u64 && self.votes == tallied
    }
}

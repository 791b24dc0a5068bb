//! Store-client seam for poll records.
//!
//! A `PollTable` behaves like a key-value table keyed by poll id with one
//! conditional write: [`PollTable::update_vote`]. Implementations must apply
//! the vote condition and mutation as a single indivisible step.

use std::collections::HashMap;
use std::fmt;
use async_trait::async_trait;
use uuid::Uuid;

/// One stored poll item, in the store's own representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRecord {
    pub id: Uuid,
    pub user: String,
    pub votes: i64,
    pub voters: Vec<String>,
    pub options: HashMap<String, i64>,
}

/// Why a conditional vote update was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionFailure {
    MissingItem,
    AlreadyVoted,
    MissingOption,
}

impl fmt::Display for ConditionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionFailure::MissingItem => write!(f, "item does not exist"),
            ConditionFailure::AlreadyVoted => write!(f, "voter already present"),
            ConditionFailure::MissingOption => write!(f, "option does not exist"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("conditional check failed: {0}")]
    ConditionalCheckFailed(ConditionFailure),
    #[error("malformed item: {0}")]
    Malformed(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait PollTable: Send + Sync {
    /// Writes `record`, replacing any item with the same id.
    async fn put_item(&self, record: &PollRecord) -> Result<(), TableError>;

    /// Deletes the item. Missing items are not an error.
    async fn delete_item(&self, id: Uuid) -> Result<(), TableError>;

    /// Strongly consistent point read.
    async fn get_item(&self, id: Uuid) -> Result<Option<PollRecord>, TableError>;

    /// Adds `voter` to the voter set and increments both the total and the
    /// tally of `option`, only if the item exists, `option` is one of its
    /// options and `voter` has not voted yet.
    async fn update_vote(&self, id: Uuid, voter: &str, option: &str) -> Result<(), TableError>;
}

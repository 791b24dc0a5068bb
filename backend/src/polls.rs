use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use shared::{validate_user_id, Poll};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use crate::error::PollError;
use crate::table::{ConditionFailure, PollRecord, PollTable, TableError};

/// Create, remove, load and vote on polls held in a [`PollTable`].
///
/// Each operation is one request against the table. The table is the only
/// serialization point; nothing here is locked or cached.
#[derive(Clone)]
pub struct PollStore {
    table: Arc<dyn PollTable>,
}

impl PollStore {
    pub fn new(table: Arc<dyn PollTable>) -> Self {
        Self { table }
    }

    /// Writes a new poll with every option at zero.
    ///
    /// An existing item with the same id is overwritten; ids are time-ordered
    /// with random bits, so collisions are not checked for.
    #[instrument(skip(self, poll), fields(poll_id = %poll.id))]
    pub async fn create(&self, poll: &Poll) -> Result<(), PollError> {
        let record = PollRecord {
            id: poll.id,
            user: poll.owner.clone(),
            votes: 0,
            voters: Vec::new(),
            options: poll.options.keys().map(|name| (name.clone(), 0)).collect(),
        };

        self.table
            .put_item(&record)
            .await
            .map_err(|source| PollError::StoreWrite { context: "putting item", source })?;

        info!("Created poll with {} options", record.options.len());
        Ok(())
    }

    /// Deletes the poll. Removing an unknown id succeeds.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: Uuid) -> Result<(), PollError> {
        self.table
            .delete_item(id)
            .await
            .map_err(|source| PollError::StoreWrite { context: "deleting item", source })?;

        info!("Removed poll");
        Ok(())
    }

    /// Reads the current state of the poll.
    #[instrument(skip(self))]
    pub async fn load(&self, id: Uuid) -> Result<Poll, PollError> {
        let record = match self.table.get_item(id).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(PollError::NotFound),
            Err(TableError::Malformed(detail)) => return Err(PollError::Decode(detail)),
            Err(source) => return Err(PollError::StoreRead { context: "getting item", source }),
        };

        let poll = Poll::try_from(record).map_err(PollError::Decode)?;
        debug!("Loaded poll with {} votes", poll.votes);
        Ok(poll)
    }

    /// Records one vote for `option` by `user_id`.
    ///
    /// Returns [`PollError::AlreadyVoted`] if the user is already a voter on
    /// this poll; in that case nothing is changed.
    #[instrument(skip(self))]
    pub async fn vote(&self, id: Uuid, user_id: &str, option: &str) -> Result<(), PollError> {
        validate_user_id(user_id)?;

        match self.table.update_vote(id, user_id, option).await {
            Ok(()) => {
                info!("Vote recorded");
                Ok(())
            }
            Err(TableError::ConditionalCheckFailed(failure)) => {
                warn!("Vote rejected: {}", failure);
                Err(match failure {
                    ConditionFailure::AlreadyVoted => PollError::AlreadyVoted,
                    ConditionFailure::MissingItem => PollError::NotFound,
                    ConditionFailure::MissingOption => PollError::UnknownOption(option.to_string()),
                })
            }
            Err(source) => Err(PollError::StoreWrite { context: "updating item", source }),
        }
    }
}

impl TryFrom<PollRecord> for Poll {
    type Error = String;

    fn try_from(record: PollRecord) -> Result<Self, Self::Error> {
        let votes = u64::try_from(record.votes)
            .map_err(|_| format!("negative vote count {}", record.votes))?;

        let mut voters = BTreeSet::new();
        for voter in record.voters {
            if !voters.insert(voter.clone()) {
                return Err(format!("duplicate voter {}", voter));
            }
        }

        let options = record
            .options
            .into_iter()
            .map(|(name, tally)| {
                u64::try_from(tally)
                    .map(|tally| (name.clone(), tally))
                    .map_err(|_| format!("negative tally {} for option {}", tally, name))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Poll { id: record.id, owner: record.user, votes, voters, options })
    }
}

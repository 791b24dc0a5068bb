use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use tracing::error;
use uuid::Uuid;
use crate::table::{ConditionFailure, PollRecord, PollTable, TableError};

/// In-process poll table.
///
/// Every operation holds the map lock for its whole duration, which makes
/// `update_vote` atomic with respect to other callers.
#[derive(Debug, Default)]
pub struct MemoryPollTable {
    items: Mutex<HashMap<Uuid, PollRecord>>,
}

impl MemoryPollTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, TableError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, TableError> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, PollRecord>>, TableError> {
        self.items.lock().map_err(|e| {
            error!("Failed to acquire poll table lock: {}", e);
            TableError::Unavailable("poll table lock poisoned".into())
        })
    }
}

#[async_trait]
impl PollTable for MemoryPollTable {
    async fn put_item(&self, record: &PollRecord) -> Result<(), TableError> {
        self.lock()?.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete_item(&self, id: Uuid) -> Result<(), TableError> {
        self.lock()?.remove(&id);
        Ok(())
    }

    async fn get_item(&self, id: Uuid) -> Result<Option<PollRecord>, TableError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    async fn update_vote(&self, id: Uuid, voter: &str, option: &str) -> Result<(), TableError> {
        let mut items = self.lock()?;
        let item = items
            .get_mut(&id)
            .ok_or(TableError::ConditionalCheckFailed(ConditionFailure::MissingItem))?;

        if item.voters.iter().any(|v| v == voter) {
            return Err(TableError::ConditionalCheckFailed(ConditionFailure::AlreadyVoted));
        }

        let tally = item
            .options
            .get_mut(option)
            .ok_or(TableError::ConditionalCheckFailed(ConditionFailure::MissingOption))?;

        *tally += 1;
        item.votes += 1;
        item.voters.push(voter.to_string());
        Ok(())
    }
}

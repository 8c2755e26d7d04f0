use std::{collections::HashMap, fs::read_to_string, path::Path};

use async_trait::async_trait;
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::home::inventory::Room;

/// Status returned for users the store has never heard of.
pub const NOT_FOUND: u16 = 404;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub rooms: Vec<Room>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found(UserRecord),
    /// The store answered with a status code instead of a record.
    Failed(u16),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn fetch_user(&self, user: &str) -> FetchOutcome;
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("can't read user records: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed user records: {0}")]
    Json(#[from] serde_json::Error),
}

/// User records kept in memory, keyed by user id.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: HashMap<String, UserRecord>,
}

impl MemoryUserStore {
    pub fn new(users: HashMap<String, UserRecord>) -> Self {
        Self { users }
    }

    /// Reads a JSON object of `{ "<user>": { "rooms": [...] } }`.
    pub fn load(path: &Path) -> Result<Self, UserStoreError> {
        let content = read_to_string(path)?;
        let users: HashMap<String, UserRecord> = serde_json::from_str(&content)?;
        info!("Loaded {} user records from {}", users.len(), path.display());
        Ok(Self::new(users))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn fetch_user(&self, user: &str) -> FetchOutcome {
        match self.users.get(user) {
            Some(record) => FetchOutcome::Found(record.clone()),
            None => {
                debug!("No record for user {user:?}");
                FetchOutcome::Failed(NOT_FOUND)
            }
        }
    }
}

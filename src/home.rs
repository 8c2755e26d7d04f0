//! The home page controller: which room is in focus and what each room holds.
//!
//! [`Home`] owns all state. Renderers read it through [`Home::view`] and change
//! it only through the operations below. Duplicate room names, unknown rooms
//! and unknown items are reported as [`HomeError`]s and leave state untouched.

pub mod inventory;
pub mod navigation;

use log::*;
use serde::Serialize;
use thiserror::Error;

use crate::{
    home::{
        inventory::{Inventory, ItemChange, Policy, RenameMode, Room, Stuff},
        navigation::{Focus, Navigator, Target},
    },
    session::Identity,
    users::{FetchOutcome, UserStore},
};

#[derive(Debug, Error)]
pub enum HomeError {
    #[error("no room named {0:?}")]
    RoomNotFound(String),
    #[error("room {0:?} already exists")]
    DuplicateRoom(String),
    #[error("{0:?} is reserved")]
    ReservedName(String),
    #[error("invalid room name {0:?}")]
    InvalidName(String),
    #[error("invalid item key {0:?}")]
    InvalidKey(String),
    #[error("room {room:?} has no item {key:?}")]
    ItemNotFound { room: String, key: String },
    #[error("expected exactly one changed item, got {0}")]
    InvalidChange(usize),
}

impl HomeError {
    /// Short tag sent to clients alongside the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomNotFound(_) => "room_not_found",
            Self::DuplicateRoom(_) => "duplicate_room",
            Self::ReservedName(_) => "reserved_name",
            Self::InvalidName(_) => "invalid_name",
            Self::InvalidKey(_) => "invalid_key",
            Self::ItemNotFound { .. } => "item_not_found",
            Self::InvalidChange(_) => "invalid_change",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hydration {
    /// Nobody is signed in, nothing was fetched.
    Anonymous,
    /// The user's rooms were loaded.
    Loaded(usize),
    /// The store failed with this status and the session was revoked.
    Revoked(u16),
    AlreadyHydrated,
}

#[derive(Debug, Clone)]
pub struct HomeSettings {
    pub history_depth: usize,
    pub rename: RenameMode,
    pub policy: Policy,
}

impl Default for HomeSettings {
    fn default() -> Self {
        Self {
            history_depth: 1,
            rename: RenameMode::default(),
            policy: Policy::default(),
        }
    }
}

/// Read-only snapshot for renderers.
#[derive(Debug, Clone, Serialize)]
pub struct StateView {
    pub rooms: Inventory,
    pub current_room: Focus,
    pub previous_room: Option<String>,
}

#[derive(Debug)]
pub struct Home {
    inventory: Inventory,
    navigator: Navigator,
    rename: RenameMode,
    policy: Policy,
    hydrated: bool,
}

impl Default for Home {
    fn default() -> Self {
        Self::new(&HomeSettings::default())
    }
}

impl Home {
    pub fn new(settings: &HomeSettings) -> Self {
        Self {
            inventory: Inventory::new(),
            navigator: Navigator::new(settings.history_depth),
            rename: settings.rename,
            policy: settings.policy.clone(),
            hydrated: false,
        }
    }

    pub fn rooms(&self) -> &Inventory {
        &self.inventory
    }

    pub fn current_room(&self) -> &Focus {
        self.navigator.current()
    }

    pub fn previous_room(&self) -> Option<&str> {
        self.navigator.previous()
    }

    pub fn view(&self) -> StateView {
        StateView {
            rooms: self.inventory.clone(),
            current_room: self.navigator.current().clone(),
            previous_room: self.navigator.previous().map(str::to_owned),
        }
    }

    pub fn select_room(&mut self, target: Target) -> Result<(), HomeError> {
        if let Target::Room(name) = &target {
            if !self.inventory.contains(name) {
                return Err(HomeError::RoomNotFound(name.clone()));
            }
        }
        self.navigator.select(target);
        Ok(())
    }

    /// Adds a room and puts it in focus.
    pub fn add_room(&mut self, name: impl Into<String>, stuff: Stuff) -> Result<(), HomeError> {
        let name = name.into();
        self.inventory
            .add_room(Room::new(name.clone(), stuff), &self.policy)?;
        info!("Added room {name:?}");
        self.navigator.focus_room(name);
        Ok(())
    }

    pub fn update_item(&mut self, room: &str, change: ItemChange) -> Result<(), HomeError> {
        self.inventory
            .update_item(room, change, self.rename, &self.policy)
    }

    /// Loads the signed-in user's rooms. Only the first call with a user does
    /// anything.
    pub async fn hydrate(
        &mut self,
        identity: &mut impl Identity,
        store: &dyn UserStore,
    ) -> Hydration {
        if self.hydrated {
            return Hydration::AlreadyHydrated;
        }
        let Some(user) = identity.current_user() else {
            return Hydration::Anonymous;
        };
        self.hydrated = true;

        match store.fetch_user(&user).await {
            FetchOutcome::Failed(status) => {
                warn!("Couldn't find user {user:?} (status {status}), revoking session");
                identity.revoke();
                Hydration::Revoked(status)
            }
            FetchOutcome::Found(record) => {
                if !record.rooms.is_empty() {
                    self.inventory.replace(record.rooms, &self.policy);
                }
                info!("Loaded {} rooms for {user:?}", self.inventory.len());
                Hydration::Loaded(self.inventory.len())
            }
        }
    }
}

use std::collections::VecDeque;

use log::*;
use serde::{Serialize, Serializer};

/// Wire name of the add-room pseudo room.
pub const ADD_ROOM: &str = "add_room";

/// What the detail pane is showing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Focus {
    #[default]
    Nothing,
    AddRoom,
    Room(String),
}

impl Focus {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Focus::Nothing => None,
            Focus::AddRoom => Some(ADD_ROOM),
            Focus::Room(name) => Some(name),
        }
    }

    pub fn room(&self) -> Option<&str> {
        match self {
            Focus::Room(name) => Some(name),
            _ => None,
        }
    }
}

impl Serialize for Focus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_str().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Leave the add-room form.
    Cancel,
    AddRoom,
    Room(String),
}

impl From<Option<String>> for Target {
    fn from(target: Option<String>) -> Self {
        match target {
            None => Target::Cancel,
            Some(name) if name == ADD_ROOM => Target::AddRoom,
            Some(name) => Target::Room(name),
        }
    }
}

impl From<&str> for Target {
    fn from(target: &str) -> Self {
        Target::from(Some(target.to_owned()))
    }
}

/// Focus state machine with a bounded history of rooms to return to when an
/// add-room flow is cancelled. A depth of 1 remembers a single room.
#[derive(Debug, Clone)]
pub struct Navigator {
    current: Focus,
    history: VecDeque<Option<String>>,
    depth: usize,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Navigator {
    pub fn new(depth: usize) -> Self {
        Self {
            current: Focus::Nothing,
            history: VecDeque::with_capacity(depth),
            depth,
        }
    }

    pub fn current(&self) -> &Focus {
        &self.current
    }

    /// Most recent remembered room, if any.
    pub fn previous(&self) -> Option<&str> {
        self.history.back().and_then(|room| room.as_deref())
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn select(&mut self, target: Target) -> &Focus {
        match target {
            Target::AddRoom => {
                if self.current != Focus::AddRoom {
                    let from = self.current.room().map(str::to_owned);
                    self.remember(from);
                    self.current = Focus::AddRoom;
                }
            }
            Target::Cancel => {
                self.current = match self.history.pop_back().flatten() {
                    Some(room) => Focus::Room(room),
                    None => Focus::Nothing,
                };
            }
            Target::Room(room) => self.current = Focus::Room(room),
        }
        debug!("Focus is now {:?}", self.current);
        &self.current
    }

    /// Focuses a room without going through history.
    pub fn focus_room(&mut self, room: impl Into<String>) {
        self.current = Focus::Room(room.into());
    }

    fn remember(&mut self, room: Option<String>) {
        if self.depth == 0 {
            return;
        }
        if self.history.len() == self.depth {
            self.history.pop_front();
        }
        self.history.push_back(room);
    }
}

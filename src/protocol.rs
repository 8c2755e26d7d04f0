use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::home::{
    StateView,
    inventory::{ItemPatch, Stuff},
};

#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Operation {
    Handshake {
        #[serde(default)]
        user: Option<String>,
    },
    /// `null` cancels, `"add_room"` opens the add-room form.
    SelectRoom { target: Option<String> },
    AddRoom {
        name: String,
        #[serde(default)]
        stuff: Stuff,
    },
    UpdateItem {
        room: String,
        changes: HashMap<String, ItemPatch>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reply {
    State { state: StateView },
    Error { kind: &'static str, message: String },
}

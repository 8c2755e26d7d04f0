use std::{collections::HashMap, sync::Arc};

use log::*;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::home::{HomeError, navigation::ADD_ROOM};

pub type Stuff = HashMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub name: String,
    #[serde(default)]
    pub stuff: Stuff,
}

impl Room {
    pub fn new(name: impl Into<String>, stuff: Stuff) -> Self {
        Self {
            name: name.into(),
            stuff,
        }
    }
}

/// One item edit as sent by a client, keyed by the item it edits.
///
/// A missing (or `null`) field keeps what the item already has.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemChange {
    pub key: String,
    pub rename: Option<String>,
    pub value: Option<Value>,
}

impl ItemChange {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            rename: None,
            value: Some(value),
        }
    }

    pub fn rename(key: impl Into<String>, new_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rename: Some(new_key.into()),
            value: None,
        }
    }

    /// Accepts exactly one `{ key: patch }` entry.
    pub fn from_changes(changes: HashMap<String, ItemPatch>) -> Result<Self, HomeError> {
        let count = changes.len();
        let mut entries = changes.into_iter();
        match (entries.next(), entries.next()) {
            (Some((key, patch)), None) => Ok(Self {
                key,
                rename: patch.name,
                value: patch.value,
            }),
            _ => Err(HomeError::InvalidChange(count)),
        }
    }
}

/// What happens to the old key when an item is renamed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum RenameMode {
    /// The value is written under the new key and the old key stays.
    #[default]
    Copy,
    /// The old key is removed.
    Move,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub room_name_max_length: usize,
    pub item_key_max_length: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            room_name_max_length: 64,
            item_key_max_length: 128,
        }
    }
}

impl Policy {
    pub fn check_room_name(&self, name: &str) -> Result<(), HomeError> {
        let length = name.chars().count();
        if length == 0 || length > self.room_name_max_length {
            return Err(HomeError::InvalidName(name.to_owned()));
        }
        if name == ADD_ROOM {
            return Err(HomeError::ReservedName(name.to_owned()));
        }
        Ok(())
    }

    pub fn check_item_key(&self, key: &str) -> Result<(), HomeError> {
        let length = key.chars().count();
        if length == 0 || length > self.item_key_max_length {
            return Err(HomeError::InvalidKey(key.to_owned()));
        }
        Ok(())
    }
}

/// Ordered room list with copy-on-write sharing.
///
/// Clones are cheap and never observe later edits: every edit swaps in a
/// fresh `Arc<Room>` for the touched room and shares the others.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    rooms: Arc<Vec<Arc<Room>>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rooms(&self) -> &[Arc<Room>] {
        &self.rooms
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Room>> {
        self.rooms.iter().find(|room| room.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.rooms.iter().position(|room| room.name == name)
    }

    /// Swaps in a whole new room list, keeping only the first room of each name
    /// and skipping rooms `add_room` would refuse. Returns how many were dropped.
    pub fn replace(&mut self, rooms: Vec<Room>, policy: &Policy) -> usize {
        let mut kept: Vec<Arc<Room>> = Vec::with_capacity(rooms.len());
        let mut dropped = 0;
        for room in rooms {
            if kept.iter().any(|r| r.name == room.name) {
                warn!("Dropping duplicate room {:?}", room.name);
                dropped += 1;
                continue;
            }
            let checked = policy
                .check_room_name(&room.name)
                .and_then(|()| room.stuff.keys().try_for_each(|key| policy.check_item_key(key)));
            if let Err(e) = checked {
                warn!("Dropping room {:?}: {e}", room.name);
                dropped += 1;
                continue;
            }
            kept.push(Arc::new(room));
        }
        self.rooms = Arc::new(kept);
        dropped
    }

    pub fn add_room(&mut self, room: Room, policy: &Policy) -> Result<(), HomeError> {
        policy.check_room_name(&room.name)?;
        if self.contains(&room.name) {
            return Err(HomeError::DuplicateRoom(room.name));
        }
        for key in room.stuff.keys() {
            policy.check_item_key(key)?;
        }
        Arc::make_mut(&mut self.rooms).push(Arc::new(room));
        Ok(())
    }

    pub fn update_item(
        &mut self,
        room_name: &str,
        change: ItemChange,
        mode: RenameMode,
        policy: &Policy,
    ) -> Result<(), HomeError> {
        let index = self
            .position(room_name)
            .ok_or_else(|| HomeError::RoomNotFound(room_name.to_owned()))?;
        let current = &self.rooms[index];

        let ItemChange { key, rename, value } = change;
        let new_key = rename.unwrap_or_else(|| key.clone());
        policy.check_item_key(&new_key)?;
        let new_value = match value {
            Some(value) => value,
            None => current
                .stuff
                .get(&key)
                .cloned()
                .ok_or_else(|| HomeError::ItemNotFound {
                    room: room_name.to_owned(),
                    key: key.clone(),
                })?,
        };

        let mut stuff = current.stuff.clone();
        if mode == RenameMode::Move && new_key != key {
            stuff.remove(&key);
        }
        debug!("Room {room_name:?}: {key:?} -> {new_key:?} = {new_value}");
        stuff.insert(new_key, new_value);

        let updated = Arc::new(Room {
            name: current.name.clone(),
            stuff,
        });
        Arc::make_mut(&mut self.rooms)[index] = updated;
        Ok(())
    }
}

impl Serialize for Inventory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rooms.iter().map(|room| room.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn stuff(entries: &[(&str, Value)]) -> Stuff {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn kitchen_and_garage() -> Inventory {
        let mut inventory = Inventory::new();
        inventory.replace(
            vec![
                Room::new("Kitchen", stuff(&[("fridge", json!("white"))])),
                Room::new("Garage", stuff(&[("bike", json!("red"))])),
            ],
            &Policy::default(),
        );
        inventory
    }

    #[test]
    fn add_room_appends_in_order() {
        let mut inventory = kitchen_and_garage();
        inventory
            .add_room(Room::new("Attic", Stuff::new()), &Policy::default())
            .unwrap();
        let names: Vec<&str> = inventory.rooms().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Kitchen", "Garage", "Attic"]);
    }

    #[test]
    fn add_room_rejects_duplicate_name() {
        let mut inventory = kitchen_and_garage();
        let err = inventory
            .add_room(Room::new("Kitchen", Stuff::new()), &Policy::default())
            .unwrap_err();
        assert!(matches!(err, HomeError::DuplicateRoom(name) if name == "Kitchen"));
        assert_eq!(inventory.len(), 2);
    }

    #[test]
    fn add_room_rejects_reserved_and_bad_names() {
        let mut inventory = Inventory::new();
        let policy = Policy {
            room_name_max_length: 4,
            ..Policy::default()
        };
        assert!(matches!(
            inventory.add_room(Room::new("", Stuff::new()), &policy),
            Err(HomeError::InvalidName(_))
        ));
        assert!(matches!(
            inventory.add_room(Room::new("Basement", Stuff::new()), &policy),
            Err(HomeError::InvalidName(_))
        ));
        assert!(matches!(
            inventory.add_room(Room::new(ADD_ROOM, Stuff::new()), &Policy::default()),
            Err(HomeError::ReservedName(_))
        ));
        assert!(inventory.is_empty());
    }

    #[test]
    fn value_change_copies_only_the_touched_room() {
        let mut inventory = kitchen_and_garage();
        let before = inventory.clone();

        inventory
            .update_item(
                "Kitchen",
                ItemChange::set("fridge", json!("black")),
                RenameMode::Copy,
                &Policy::default(),
            )
            .unwrap();

        assert_eq!(
            inventory.get("Kitchen").unwrap().stuff,
            stuff(&[("fridge", json!("black"))])
        );
        assert_eq!(
            before.get("Kitchen").unwrap().stuff,
            stuff(&[("fridge", json!("white"))])
        );
        assert!(!Arc::ptr_eq(
            before.get("Kitchen").unwrap(),
            inventory.get("Kitchen").unwrap()
        ));
        assert_eq!(before.get("Garage"), inventory.get("Garage"));
    }

    #[test]
    fn rename_in_copy_mode_keeps_old_key() {
        let mut inventory = kitchen_and_garage();
        inventory
            .update_item(
                "Kitchen",
                ItemChange::rename("fridge", "refrigerator"),
                RenameMode::Copy,
                &Policy::default(),
            )
            .unwrap();
        assert_eq!(
            inventory.get("Kitchen").unwrap().stuff,
            stuff(&[
                ("fridge", json!("white")),
                ("refrigerator", json!("white"))
            ])
        );
    }

    #[test]
    fn rename_in_move_mode_drops_old_key() {
        let mut inventory = kitchen_and_garage();
        inventory
            .update_item(
                "Kitchen",
                ItemChange {
                    key: "fridge".into(),
                    rename: Some("refrigerator".into()),
                    value: Some(json!("steel")),
                },
                RenameMode::Move,
                &Policy::default(),
            )
            .unwrap();
        assert_eq!(
            inventory.get("Kitchen").unwrap().stuff,
            stuff(&[("refrigerator", json!("steel"))])
        );
    }

    #[test]
    fn update_inserts_new_item_when_value_given() {
        let mut inventory = kitchen_and_garage();
        inventory
            .update_item(
                "Garage",
                ItemChange::set("car", json!({"make": "volvo", "year": 1999})),
                RenameMode::Copy,
                &Policy::default(),
            )
            .unwrap();
        let garage = inventory.get("Garage").unwrap();
        assert_eq!(garage.stuff.len(), 2);
        assert_eq!(garage.stuff["car"]["year"], json!(1999));
    }

    #[test]
    fn update_reports_missing_room_and_item() {
        let mut inventory = kitchen_and_garage();
        let before = inventory.clone();

        let err = inventory
            .update_item(
                "Cellar",
                ItemChange::set("wine", json!(12)),
                RenameMode::Copy,
                &Policy::default(),
            )
            .unwrap_err();
        assert!(matches!(err, HomeError::RoomNotFound(name) if name == "Cellar"));

        let err = inventory
            .update_item(
                "Kitchen",
                ItemChange::rename("oven", "stove"),
                RenameMode::Copy,
                &Policy::default(),
            )
            .unwrap_err();
        assert!(matches!(err, HomeError::ItemNotFound { key, .. } if key == "oven"));

        assert!(Arc::ptr_eq(&before.rooms, &inventory.rooms));
    }

    #[test]
    fn change_must_carry_exactly_one_entry() {
        assert!(matches!(
            ItemChange::from_changes(HashMap::new()),
            Err(HomeError::InvalidChange(0))
        ));

        let two: HashMap<String, ItemPatch> = serde_json::from_value(json!({
            "fridge": { "value": "black" },
            "oven": { "name": "stove" }
        }))
        .unwrap();
        assert!(matches!(
            ItemChange::from_changes(two),
            Err(HomeError::InvalidChange(2))
        ));

        let one: HashMap<String, ItemPatch> =
            serde_json::from_value(json!({ "fridge": { "name": "refrigerator" } })).unwrap();
        assert_eq!(
            ItemChange::from_changes(one).unwrap(),
            ItemChange::rename("fridge", "refrigerator")
        );
    }

    #[test]
    fn replace_keeps_first_of_duplicate_names() {
        let mut inventory = Inventory::new();
        let dropped = inventory.replace(
            vec![
                Room::new("Kitchen", stuff(&[("fridge", json!("white"))])),
                Room::new("Kitchen", stuff(&[("fridge", json!("black"))])),
            ],
            &Policy::default(),
        );
        assert_eq!(dropped, 1);
        assert_eq!(inventory.len(), 1);
        assert_eq!(inventory.get("Kitchen").unwrap().stuff["fridge"], json!("white"));
    }

    #[test]
    fn replace_skips_rooms_add_room_would_refuse() {
        let mut inventory = Inventory::new();
        let dropped = inventory.replace(
            vec![
                Room::new(ADD_ROOM, Stuff::new()),
                Room::new("", Stuff::new()),
                Room::new("Attic", stuff(&[("", json!(1))])),
                Room::new("Garage", stuff(&[("bike", json!("red"))])),
            ],
            &Policy::default(),
        );
        assert_eq!(dropped, 3);
        let names: Vec<&str> = inventory.rooms().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Garage"]);
    }

    #[test]
    fn bad_item_key_is_reported_as_key() {
        let mut inventory = kitchen_and_garage();
        let err = inventory
            .update_item(
                "Kitchen",
                ItemChange::rename("fridge", ""),
                RenameMode::Copy,
                &Policy::default(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_key");
        assert!(matches!(err, HomeError::InvalidKey(key) if key.is_empty()));
    }

    #[test]
    fn serializes_as_room_list() {
        let inventory = kitchen_and_garage();
        assert_eq!(
            serde_json::to_value(&inventory).unwrap(),
            json!([
                { "name": "Kitchen", "stuff": { "fridge": "white" } },
                { "name": "Garage", "stuff": { "bike": "red" } }
            ])
        );
    }
}

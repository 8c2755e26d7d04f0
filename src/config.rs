use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
};

use log::*;
use serde::Deserialize;

use crate::home::{
    HomeSettings,
    inventory::{Policy, RenameMode},
};

pub const PATH: &str = "config.ron";

pub fn get_config() -> Option<Config> {
    load_config(Path::new(PATH))
}

pub fn load_config(path: &Path) -> Option<Config> {
    match read_to_string(path) {
        Ok(content) => {
            info!("Reading {}", path.display());
            match ron::from_str(content.as_str()) {
                Ok(config) => Some(config),
                Err(e) => {
                    error!("Couldn't deserealize {}:\n{e}", path.display());
                    None
                }
            }
        }
        Err(_) => {
            info!("{} not found, using defaults", path.display());
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind: String,
    /// JSON file with the user records served to clients.
    pub users: PathBuf,
    pub mpsc_channel_buffer: usize,
    pub max_clients: usize,
    /// How many rooms a cancelled add-room flow can walk back through.
    pub history_depth: usize,
    pub rename: RenameMode,
    pub policy: Policy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:9000".to_owned(),
            users: PathBuf::from("users.json"),
            mpsc_channel_buffer: 16,
            max_clients: 256,
            history_depth: 1,
            rename: RenameMode::default(),
            policy: Policy::default(),
        }
    }
}

impl Config {
    pub fn home_settings(&self) -> HomeSettings {
        HomeSettings {
            history_depth: self.history_depth,
            rename: self.rename,
            policy: self.policy.clone(),
        }
    }
}

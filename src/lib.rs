pub mod client;
pub mod config;
pub mod home;
pub mod protocol;
pub mod server;
pub mod session;
pub mod status;
pub mod users;
mod utils;

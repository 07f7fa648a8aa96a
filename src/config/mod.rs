//! Configuration management for the volume bot

pub mod bot;
pub mod settings;

pub use bot::*;
pub use settings::*;

use lazy_static::lazy_static;

lazy_static! {
    pub static ref SETTINGS: Settings = Settings::load();
}

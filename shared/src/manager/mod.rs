pub mod config;
pub mod cooldowns;
pub mod error;
#[allow(clippy::module_inception)]
pub mod manager;
pub mod rules;

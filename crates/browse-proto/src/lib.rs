//! Shared data model, configuration and platform paths for mediabrowse.

pub mod config;
pub mod platform;
pub mod protocol;

//! Subcommand handlers

pub mod config;
pub mod context;
pub mod generate;
pub mod list;
pub mod patch;
pub mod verify;

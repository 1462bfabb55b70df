//! xcsynth library - expose modules for testing
//!
//! The binary is a thin clap layer over these modules.

pub mod commands;
pub mod common;
pub mod errors;
pub mod scanner;
pub mod session;

pub use common::GlobalOpts;
pub use xcsynth_logger as logger;

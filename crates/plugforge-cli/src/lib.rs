//! plugforge library - expose modules for testing
//!
//! The binary is a thin clap front end over these modules.

pub mod commands;
pub mod common;
pub mod driver;
pub mod errors;
pub mod report;

pub use common::GlobalOpts;
pub use plugforge_logger as logger;

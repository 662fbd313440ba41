//! Command implementations for the arxgraph CLI
//!
//! Each command module provides a `run` function that executes the command logic.

pub mod export;
pub mod extract;
pub mod import;
pub mod stats;

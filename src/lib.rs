//! Jailtree library exports.
//!
//! The binary is a thin clap wrapper; everything it does goes through
//! these modules, which integration tests drive directly.

pub mod action;
pub mod commands;
pub mod config;
pub mod copy;
pub mod loader;
pub mod manifest;
pub mod process;
pub mod spec;
pub mod update;

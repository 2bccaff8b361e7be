//! Shared helpers for the entry points

pub mod command_helpers;
pub mod logging;

//! # Hearth API
//!
//! Entry-point layer - commands, HTTP routes, and the `hearth` binary.
//!
//! This crate contains:
//! - Command functions (register, list, replace credential, deactivate,
//!   manual sync, batch sync)
//! - Application context (dependency injection)
//! - The axum router exposing the commands over HTTP
//!
//! ## Architecture
//! - Depends on `common`, `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture

pub mod commands;
pub mod context;
pub mod routes;
pub mod utils;

// Re-export for convenience
pub use commands::*;
pub use context::*;
pub use routes::router;

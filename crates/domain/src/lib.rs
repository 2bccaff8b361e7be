//! # Hearth Domain
//!
//! Business domain types for external calendar ingestion.
//!
//! This crate contains:
//! - Calendar source, credential, and event models
//! - Sync result types
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Hearth crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;

//! Command functions - the operations every entry point calls into

mod sources;
mod sync;

pub use sources::*;
pub use sync::*;

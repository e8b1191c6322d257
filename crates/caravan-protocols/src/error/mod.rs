//! Error types for the Caravan protocol layer.

mod engine;
mod handler;
mod store;

pub use engine::*;
pub use handler::*;
pub use store::*;

// Application layer: request validation and use cases on top of the store.
// Everything here runs before the transfer engine is invoked; the engine
// itself only guarantees data consistency.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;

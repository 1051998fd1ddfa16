//! Repository Layer
//!
//! Remote data access abstractions and implementations.

mod traits;
mod rest;
mod memory;


pub use traits::{Backend, Repository};
pub use rest::{RestBackend, RestRepository};
pub use memory::{MemoryBackend, MemoryRepository};

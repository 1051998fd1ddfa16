//! Command Wrappers
//!
//! Thin async bindings from the components to the client library, organized
//! by domain. Errors come back as display strings for the UI.

mod auth;
mod category;
mod spot;
mod places;

// Re-export all public items
pub use auth::*;
pub use category::*;
pub use spot::*;
pub use places::*;

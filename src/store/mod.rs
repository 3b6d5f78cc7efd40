//! Persistent storage for saved commands
//!
//! This module handles:
//! - Serializing access to the shared namespace across front-ends
//! - The JSON-file backend used on the host

mod file;
mod guard;

pub use file::FileStore;
pub use guard::StoreGuard;

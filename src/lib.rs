//! Demotape Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod library;
pub mod media;
pub mod pipeline;
pub mod server;
pub mod slug;

// Re-export commonly used types for convenience
pub use library::{LibraryStore, SqliteLibraryStore};
pub use server::{make_app, run_server, RequestsLoggingLevel, ServerConfig};

//! Session lifecycle state.

pub mod registry;

pub use registry::{MemorySessionStore, SessionError, SessionRecord, SessionStore};

//! The protocol engine: capability seam, session driver, static catalog.

pub mod capability;
pub mod catalog;
pub mod session;

pub use capability::CapabilitySet;
pub use catalog::StaticCatalog;
pub use session::{EngineSession, OutboundWriter};

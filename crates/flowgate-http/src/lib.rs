//! HTTP transports for the Flowgate gateway.
//!
//! Two encodings of the same protocol engine share this crate. The
//! Streamable transport runs one engine turn per POST and answers with JSON
//! or a finite event stream; the legacy transport holds one SSE connection
//! open per client and takes input through a companion POST endpoint. Both
//! sit behind the same auth, origin, and session layers.

pub mod auth;
pub mod config;
pub mod error;
pub mod origin;
pub mod server;
pub mod session;
pub mod transport;

pub use auth::{OpenResolver, Principal, PrincipalResolver, StaticTokenResolver};
pub use config::{load_config, ConfigError, ServerConfig};
pub use error::TransportError;
pub use origin::OriginPolicy;
pub use server::{build_router, AppState, HttpTransport};
pub use session::{MemorySessionStore, SessionRecord, SessionStore};
pub use transport::{LegacyConnections, TurnConfig};

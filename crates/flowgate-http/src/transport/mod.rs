//! HTTP transport surfaces and the engine orchestration between them.

pub mod legacy;
pub mod orchestrator;
pub mod streamable;
pub mod streams;

pub use legacy::LegacyConnections;
pub use orchestrator::{run_turn, ContentPreference, RenderedOutput, TurnConfig, TurnOutcome};
pub use streamable::{LAST_EVENT_ID_HEADER, SESSION_HEADER};
pub use streams::{ReadStream, WriteStream};

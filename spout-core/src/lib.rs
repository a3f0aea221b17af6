//! Core library for container log fan-out: attach to running containers, multicast
//! their output to listeners, and forward selected records through a persisted routing table.

pub mod attach;
pub mod colorizer;
mod error;
pub mod forward;
mod models;
pub mod routes;
pub mod runtime;
pub mod source;

pub use attach::{AttachManager, RecordReceiver, RecordSender};
pub use colorizer::Colorizer;
pub use error::{Result, SpoutError};
pub use forward::{Forwarder, Forwarders, SyslogForwarder, DEFAULT_DATETIME_FORMAT};
pub use models::{short_id, Container, LogRecord, Route, Target, SHORT_ID_LEN};
pub use routes::{RouteFileStore, RouteManager, RouteStore};
pub use runtime::{ContainerRuntime, DockerRuntime, LogChunk, MemoryRuntime, RuntimeEvent};
pub use source::Source;

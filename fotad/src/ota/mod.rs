//! Over-the-air update orchestration

pub mod delivery;
pub mod kind;
pub mod mapper;
pub mod orchestrator;
pub mod package;
pub mod pending;
pub mod registry;
pub mod session;
pub mod status;
pub mod telemetry;
pub mod trigger;

pub use delivery::{ChunkSource, DeliverySettings, Dispatcher, WriteRequest};
pub use kind::UpdateKind;
pub use orchestrator::{Resolution, UpdateOrchestrator};
pub use package::PackageDescriptor;
pub use status::LifecycleStatus;
pub use telemetry::{StatusEvent, TelemetrySink, TracingTelemetry};

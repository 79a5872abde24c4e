//! Telemetry ingestion and distribution core.
//!
//! One persistent MQTT connection feeds a single decode-and-fan-out path:
//! inbound messages update the [`registry::DeviceRegistry`] and
//! [`telemetry::TelemetryStore`], then fan out over the [`bus::EventBus`]
//! to any number of observers. Outbound device commands ride the same
//! connection through [`ingest::commands::CommandDispatcher`].

pub mod bus;
pub mod ingest;
pub mod registry;
pub mod telemetry;

pub use bus::EventBus;
pub use ingest::{commands::CommandDispatcher, IngestState, IngestSupervisor};
pub use registry::DeviceRegistry;
pub use telemetry::TelemetryStore;

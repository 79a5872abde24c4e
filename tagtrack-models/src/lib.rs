pub mod constants;
pub mod device;
pub mod event;
pub mod retry;
pub mod settings;
pub mod web;

pub use device::{Device, DevicePatch, DeviceStatus, GeoPoint, NetworkHealth, TelemetrySample};
pub use event::{EventCategory, TrackEvent};
pub use settings::Settings;

//! Device domain entities.

pub mod model;
pub mod status;

pub use model::{Device, DeviceMeta};
pub use status::DeviceStatus;

pub mod bus;
pub mod configuration;
pub mod device;
pub mod devices;
pub mod dispatch;
pub mod edid;
pub mod error;
pub mod link;
pub mod phy;
pub mod properties;
pub mod registers;
pub mod timing;
pub mod tx;

pub use crate::bus::MemoryPort;
pub use crate::bus::Polarity;
pub use crate::bus::RegisterPort;
pub use crate::configuration::DeviceConfig;
pub use crate::configuration::DualMode;
pub use crate::device::Chip;
pub use crate::devices::attach;
pub use crate::devices::Configuration;
pub use crate::devices::Device;
pub use crate::devices::Error;
pub use crate::devices::Type;
pub use crate::link::FaultReason;
pub use crate::link::LinkState;
pub use crate::link::StatusSnapshot;

pub use bincode;
pub use video_bridge_types as types;

pub fn flag() -> error::Flag<devices::Error, error::Warning> {
    error::Flag::new()
}

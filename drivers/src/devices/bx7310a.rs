use crate::bus;
use crate::configuration::{DeviceConfig, DualMode};
use crate::device;
use crate::dispatch;
use crate::edid;
use crate::error;
use crate::link;
use crate::properties;
use video_bridge_types::PixelFormat;

pub type Configuration = DeviceConfig;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Attach(#[from] device::AttachError),
}

pub struct Device {
    runtime: device::Runtime,
}

impl device::Chip for Device {
    type Configuration = DeviceConfig;

    type Error = Error;

    type Properties = properties::Bridge<Self::Configuration>;

    const CHIP_ID: u32 = 0x7310_00A0;

    const PROPERTIES: Self::Properties = Self::Properties {
        name: "BX7310 rev. A",
        chip_id: Self::CHIP_ID,
        max_lanes: 4,
        timings: link::Timings {
            lock_polls: 15,
            lock_poll_interval: std::time::Duration::from_millis(20),
            power_on_retries: 3,
            tx_configure_retries: 3,
            hot_plug_debounce: std::time::Duration::from_millis(50),
            // rev. A re-checks immediately on a detected change
            resolution_debounce: std::time::Duration::ZERO,
        },
        default_configuration: DeviceConfig {
            lanes: 4,
            continuous_clock: false,
            dual_mode: DualMode::Auto,
            hdcp: false,
            pixel_format: PixelFormat::Yuv422_8,
        },
    };

    fn attach<P, IntoError, IntoWarning>(
        port: std::sync::Arc<P>,
        lines: bus::Lines,
        configuration: Self::Configuration,
        poll_period: Option<std::time::Duration>,
        error_flag: error::Flag<IntoError, IntoWarning>,
    ) -> Result<Self, Self::Error>
    where
        P: bus::RegisterPort + Send + Sync + 'static,
        IntoError: From<bus::Error> + Clone + Send + 'static,
        IntoWarning: From<error::Warning> + Clone + Send + 'static,
    {
        Ok(Self {
            runtime: device::Runtime::attach(
                port,
                lines,
                Self::CHIP_ID,
                Self::PROPERTIES.timings,
                configuration,
                poll_period,
                error_flag,
            )?,
        })
    }

    fn update_configuration(&self, configuration: Self::Configuration) {
        self.runtime.update_configuration(configuration);
    }

    fn status(&self) -> link::StatusSnapshot {
        self.runtime.status()
    }

    fn state(&self) -> link::LinkState {
        self.runtime.state()
    }

    fn handle_interrupt(&self) -> Result<dispatch::Causes, bus::Error> {
        self.runtime.handle_interrupt()
    }

    fn write_edid(&self, blocks: &[u8]) -> Result<(), edid::Error> {
        self.runtime.write_edid(blocks)
    }

    fn read_edid(&self, start_block: usize, count: usize) -> Result<Vec<u8>, edid::Error> {
        self.runtime.read_edid(start_block, count)
    }

    fn edid_blocks_written(&self) -> usize {
        self.runtime.edid_blocks_written()
    }
}

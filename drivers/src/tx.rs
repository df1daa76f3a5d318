use crate::bus;
use crate::bus::SharedPort;
use crate::configuration::{DeviceConfig, DualMode};
use crate::registers::{
    CsiConfigDone, CsiControl, CsiErrorStatus, CsiFormat, CsiPhyPower, CsiReset, CsiStatus,
    CsiWordCount, Register, CSI_BLOCK_STRIDE_WORDS, CSI_CONTROL_ENABLE, CSI_OUTPUT_BLOCKS,
    CSI_STATUS_PHY_LOCKED,
};
use video_bridge_types::{PixelFormat, VideoTiming};

/// Above this detected pixel clock the stream is split across both
/// transmit lane-groups.
pub const DUAL_MODE_PIXEL_CLOCK_THRESHOLD_HZ: u64 = 200_000_000;

pub const PHY_LOCK_POLLS: u32 = 10;
pub const PHY_LOCK_POLL_INTERVAL: std::time::Duration = std::time::Duration::from_millis(5);

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Bus(#[from] bus::Error),

    #[error("CSI PHY on transmit block {0} did not lock within the poll budget")]
    PhyNotLocked(usize),
}

pub fn dual_mode(configuration: &DeviceConfig, timing: &VideoTiming) -> bool {
    matches!(configuration.dual_mode, DualMode::Forced)
        || timing.pixel_clock_hz > DUAL_MODE_PIXEL_CLOCK_THRESHOLD_HZ
}

/// Bytes per line on each active transmit block.
pub fn word_count(timing: &VideoTiming, format: PixelFormat, outputs: usize) -> u32 {
    timing.active_width * format.bits_per_pixel() / 8 / outputs as u32
}

/// CSI transmit datapath programming.
///
/// `configure` is idempotent because it always starts by disabling every
/// block; the datapath is never left partially enabled.
pub trait TransmitConfigurator: Send {
    fn configure(
        &mut self,
        configuration: &DeviceConfig,
        timing: &VideoTiming,
    ) -> Result<(), Error>;

    /// Re-asserts the enable bits on the blocks programmed by the last
    /// successful `configure`, without reprogramming anything.
    fn enable(&mut self) -> Result<(), Error>;

    /// Drops the enable bits on every block. Idempotent.
    fn disable(&mut self) -> Result<(), Error>;

    /// Transmit-only soft recovery: disable, clear error status, re-enable.
    /// Never touches the receive side.
    fn recover(&mut self) -> Result<(), Error>;

    /// Clears and reports the transmit error-status bits; `true` means the
    /// link was already clean.
    fn link_clean(&mut self) -> Result<bool, Error>;
}

pub struct CsiTx {
    port: SharedPort,
    active_outputs: usize,
    lock_poll_interval: std::time::Duration,
}

impl CsiTx {
    pub fn new(port: SharedPort) -> Self {
        Self {
            port,
            active_outputs: 0,
            lock_poll_interval: PHY_LOCK_POLL_INTERVAL,
        }
    }

    fn stride(block: usize) -> u16 {
        block as u16 * CSI_BLOCK_STRIDE_WORDS
    }

    fn disable_block(&self, block: usize) -> Result<(), bus::Error> {
        let control = CsiControl::default().offset(Self::stride(block));
        self.port.update_bits(control.address(), CSI_CONTROL_ENABLE, 0)
    }

    fn clear_block_errors(&self, block: usize) -> Result<u32, bus::Error> {
        let status = CsiErrorStatus::default().offset(Self::stride(block));
        let raw = status.read(self.port.as_ref())?;
        if raw != 0 {
            // write-1-to-clear
            self.port.write(status.address(), raw)?;
        }
        Ok(raw)
    }
}

impl TransmitConfigurator for CsiTx {
    fn configure(
        &mut self,
        configuration: &DeviceConfig,
        timing: &VideoTiming,
    ) -> Result<(), Error> {
        let outputs = if dual_mode(configuration, timing) {
            2
        } else {
            1
        };
        for block in 0..CSI_OUTPUT_BLOCKS {
            self.disable_block(block)?;
        }
        for block in 0..outputs {
            CsiReset { soft_reset: 1 }
                .offset(Self::stride(block))
                .write(self.port.as_ref())?;
            CsiReset { soft_reset: 0 }
                .offset(Self::stride(block))
                .write(self.port.as_ref())?;
        }
        for block in 0..outputs {
            CsiPhyPower { enable: 1 }
                .offset(Self::stride(block))
                .write(self.port.as_ref())?;
        }
        for block in 0..outputs {
            let status = CsiStatus::default().offset(Self::stride(block));
            let mut locked = false;
            for _ in 0..PHY_LOCK_POLLS {
                if status.read(self.port.as_ref())? & CSI_STATUS_PHY_LOCKED != 0 {
                    locked = true;
                    break;
                }
                std::thread::sleep(self.lock_poll_interval);
            }
            if !locked {
                return Err(Error::PhyNotLocked(block));
            }
        }
        let word_count = word_count(timing, configuration.pixel_format, outputs);
        for block in 0..outputs {
            CsiWordCount { value: word_count }
                .offset(Self::stride(block))
                .write(self.port.as_ref())?;
            CsiFormat {
                data_type: configuration.pixel_format.data_type() as u32,
            }
            .offset(Self::stride(block))
            .write(self.port.as_ref())?;
            CsiControl {
                enable: 1,
                lanes: configuration.lanes as u32,
                continuous_clock: configuration.continuous_clock as u32,
            }
            .offset(Self::stride(block))
            .write(self.port.as_ref())?;
        }
        // configuration-done strobes in the same order the blocks were disabled
        for block in 0..outputs {
            CsiConfigDone { strobe: 1 }
                .offset(Self::stride(block))
                .write(self.port.as_ref())?;
        }
        self.active_outputs = outputs;
        Ok(())
    }

    fn enable(&mut self) -> Result<(), Error> {
        for block in 0..self.active_outputs {
            let control = CsiControl::default().offset(Self::stride(block));
            self.port
                .update_bits(control.address(), CSI_CONTROL_ENABLE, CSI_CONTROL_ENABLE)?;
        }
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Error> {
        for block in 0..CSI_OUTPUT_BLOCKS {
            self.disable_block(block)?;
        }
        Ok(())
    }

    fn recover(&mut self) -> Result<(), Error> {
        for block in 0..self.active_outputs {
            self.disable_block(block)?;
        }
        for block in 0..self.active_outputs {
            self.clear_block_errors(block)?;
        }
        for block in 0..self.active_outputs {
            let control = CsiControl::default().offset(Self::stride(block));
            self.port
                .update_bits(control.address(), CSI_CONTROL_ENABLE, CSI_CONTROL_ENABLE)?;
        }
        Ok(())
    }

    fn link_clean(&mut self) -> Result<bool, Error> {
        let mut clean = true;
        for block in 0..CSI_OUTPUT_BLOCKS {
            if self.clear_block_errors(block)? != 0 {
                clean = false;
            }
        }
        Ok(clean)
    }
}

use crate::bus;
use crate::bus::SharedPort;
use crate::registers::{
    PhyControl, Register, SysStatus, SYS_STATUS_PHY_LOCKED, SYS_STATUS_SYNC_DETECTED,
};

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Bus(#[from] bus::Error),

    #[error("receive PHY did not lock within the poll budget")]
    NotLocked,
}

/// Receive analog front-end power sequencing.
///
/// The controller never retries on its own; the poll budget and the retry
/// policy belong to the link state machine.
pub trait PhyController: Send {
    /// Idempotent: an already powered PHY is powered off first and left to
    /// settle, the hardware does not tolerate overlapping enable pulses.
    fn power_on(&mut self, pixel_clock_hint: Option<u64>) -> Result<(), Error>;

    fn power_off(&mut self) -> Result<(), Error>;

    fn is_locked(&self) -> bool;
}

pub const POWER_SETTLE: std::time::Duration = std::time::Duration::from_millis(10);

pub struct RxPhy {
    port: SharedPort,
    powered: bool,
}

impl RxPhy {
    pub fn new(port: SharedPort) -> Self {
        Self {
            port,
            powered: false,
        }
    }
}

/// PLL band selection from the expected pixel clock, widest band when the
/// caller has no expectation yet.
fn band(pixel_clock_hint: Option<u64>) -> u32 {
    match pixel_clock_hint {
        None => 3,
        Some(hz) if hz <= 74_250_000 => 0,
        Some(hz) if hz <= 150_000_000 => 1,
        Some(hz) if hz <= 300_000_000 => 2,
        Some(_) => 3,
    }
}

impl PhyController for RxPhy {
    fn power_on(&mut self, pixel_clock_hint: Option<u64>) -> Result<(), Error> {
        if self.powered {
            self.power_off()?;
            std::thread::sleep(POWER_SETTLE);
        }
        PhyControl {
            enable: 1,
            pll_enable: 1,
            band: band(pixel_clock_hint),
        }
        .write(self.port.as_ref())?;
        self.powered = true;
        Ok(())
    }

    fn power_off(&mut self) -> Result<(), Error> {
        PhyControl {
            enable: 0,
            pll_enable: 0,
            band: 0,
        }
        .write(self.port.as_ref())?;
        self.powered = false;
        Ok(())
    }

    fn is_locked(&self) -> bool {
        match SysStatus::default().read(self.port.as_ref()) {
            Ok(raw) => {
                raw & SYS_STATUS_PHY_LOCKED != 0 && raw & SYS_STATUS_SYNC_DETECTED != 0
            }
            Err(_) => false,
        }
    }
}

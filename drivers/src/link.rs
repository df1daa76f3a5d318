use crate::bus;
use crate::bus::{HotPlugOutput, PresenceSensor, SharedPort};
use crate::configuration::DeviceConfig;
use crate::phy::PhyController;
use crate::registers::{AudioControl, EdidLock, HdcpControl, Register};
use crate::timing::TimingReader;
use crate::tx::TransmitConfigurator;
use video_bridge_types::VideoTiming;

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize)]
pub enum FaultReason {
    PhyLockFailed,
    TimingInvalid,
    TxConfigureFailed,
}

impl FaultReason {
    fn code(self) -> u8 {
        match self {
            Self::PhyLockFailed => 1,
            Self::TimingInvalid => 2,
            Self::TxConfigureFailed => 3,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::PhyLockFailed),
            2 => Some(Self::TimingInvalid),
            3 => Some(Self::TxConfigureFailed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LinkState {
    Idle,
    Acquiring { attempt: u32 },
    Locked { timing: VideoTiming },
    Streaming { timing: VideoTiming },
    ResolutionPending,
    Faulted { reason: FaultReason },
}

/// Poll budgets, retry bounds and debounce widths.
///
/// Everything is attempt-count times fixed-delay, never a wall-clock
/// deadline, so sequencing stays deterministic and testable.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Timings {
    pub lock_polls: u32,
    pub lock_poll_interval: std::time::Duration,
    pub power_on_retries: u32,
    pub tx_configure_retries: u32,
    pub hot_plug_debounce: std::time::Duration,
    pub resolution_debounce: std::time::Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            lock_polls: 15,
            lock_poll_interval: std::time::Duration::from_millis(20),
            power_on_retries: 3,
            tx_configure_retries: 3,
            hot_plug_debounce: std::time::Duration::from_millis(50),
            resolution_debounce: std::time::Duration::from_millis(100),
        }
    }
}

/// Lock-free view of the link, safe to read from any thread while the
/// state machine runs. Fields are individually atomic.
#[derive(Default)]
pub struct Status {
    presence: std::sync::atomic::AtomicBool,
    timing_valid: std::sync::atomic::AtomicBool,
    active_width: std::sync::atomic::AtomicU32,
    active_height: std::sync::atomic::AtomicU32,
    total_width: std::sync::atomic::AtomicU32,
    total_height: std::sync::atomic::AtomicU32,
    pixel_clock_hz: std::sync::atomic::AtomicU64,
    interlaced: std::sync::atomic::AtomicBool,
    audio_present: std::sync::atomic::AtomicBool,
    audio_sample_rate_hz: std::sync::atomic::AtomicU32,
    fault: std::sync::atomic::AtomicU8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TimingSummary {
    pub active_width: u32,
    pub active_height: u32,
    pub total_width: u32,
    pub total_height: u32,
    pub pixel_clock_hz: u64,
    pub interlaced: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct StatusSnapshot {
    pub presence: bool,
    pub timing: Option<TimingSummary>,
    pub audio_present: bool,
    pub audio_sample_rate_hz: u32,
    pub fault: Option<FaultReason>,
}

use std::sync::atomic::Ordering;

impl Status {
    pub(crate) fn set_presence(&self, present: bool) {
        self.presence.store(present, Ordering::Release);
    }

    pub(crate) fn set_timing(&self, timing: Option<&VideoTiming>) {
        match timing {
            Some(timing) => {
                self.active_width.store(timing.active_width, Ordering::Release);
                self.active_height
                    .store(timing.active_height, Ordering::Release);
                self.total_width.store(timing.total_width, Ordering::Release);
                self.total_height
                    .store(timing.total_height, Ordering::Release);
                self.pixel_clock_hz
                    .store(timing.pixel_clock_hz, Ordering::Release);
                self.interlaced.store(timing.interlaced, Ordering::Release);
                self.timing_valid.store(true, Ordering::Release);
            }
            None => self.timing_valid.store(false, Ordering::Release),
        }
    }

    pub(crate) fn set_audio(&self, present: bool, sample_rate_hz: u32) {
        self.audio_present.store(present, Ordering::Release);
        self.audio_sample_rate_hz
            .store(sample_rate_hz, Ordering::Release);
    }

    pub(crate) fn set_fault(&self, fault: Option<FaultReason>) {
        self.fault
            .store(fault.map(FaultReason::code).unwrap_or(0), Ordering::Release);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            presence: self.presence.load(Ordering::Acquire),
            timing: if self.timing_valid.load(Ordering::Acquire) {
                Some(TimingSummary {
                    active_width: self.active_width.load(Ordering::Acquire),
                    active_height: self.active_height.load(Ordering::Acquire),
                    total_width: self.total_width.load(Ordering::Acquire),
                    total_height: self.total_height.load(Ordering::Acquire),
                    pixel_clock_hz: self.pixel_clock_hz.load(Ordering::Acquire),
                    interlaced: self.interlaced.load(Ordering::Acquire),
                })
            } else {
                None
            },
            audio_present: self.audio_present.load(Ordering::Acquire),
            audio_sample_rate_hz: self.audio_sample_rate_hz.load(Ordering::Acquire),
            fault: FaultReason::from_code(self.fault.load(Ordering::Acquire)),
        }
    }
}

/// Prerequisites programmed between lock and stream enable.
pub trait SourceHandshake: Send {
    fn prepare(&mut self, configuration: &DeviceConfig) -> Result<(), bus::Error>;
}

pub struct RegisterHandshake {
    port: SharedPort,
}

impl RegisterHandshake {
    pub fn new(port: SharedPort) -> Self {
        Self { port }
    }
}

impl SourceHandshake for RegisterHandshake {
    fn prepare(&mut self, configuration: &DeviceConfig) -> Result<(), bus::Error> {
        HdcpControl {
            enable: configuration.hdcp as u32,
        }
        .write(self.port.as_ref())?;
        AudioControl { mute: 0 }.write(self.port.as_ref())?;
        EdidLock { lock: 1 }.write(self.port.as_ref())?;
        Ok(())
    }
}

pub struct Parts {
    pub phy: Box<dyn PhyController>,
    pub timing_reader: Box<dyn TimingReader>,
    pub tx: Box<dyn TransmitConfigurator>,
    pub handshake: Box<dyn SourceHandshake>,
    pub presence: Box<dyn PresenceSensor>,
    pub hot_plug: HotPlugOutput,
    pub validator: Box<dyn Fn(&VideoTiming) -> bool + Send>,
}

/// Owns the link state and drives the acquire, validate, configure and
/// stream sequence. Every method must be called with the device's
/// configuration lock held (the machine is the lock's protected value).
pub struct LinkStateMachine {
    state: LinkState,
    configuration: DeviceConfig,
    timings: Timings,
    phy: Box<dyn PhyController>,
    timing_reader: Box<dyn TimingReader>,
    tx: Box<dyn TransmitConfigurator>,
    handshake: Box<dyn SourceHandshake>,
    presence: Box<dyn PresenceSensor>,
    hot_plug: HotPlugOutput,
    validator: Box<dyn Fn(&VideoTiming) -> bool + Send>,
    status: std::sync::Arc<Status>,
}

impl LinkStateMachine {
    pub fn new(
        parts: Parts,
        configuration: DeviceConfig,
        timings: Timings,
        status: std::sync::Arc<Status>,
    ) -> Self {
        Self {
            state: LinkState::Idle,
            configuration,
            timings,
            phy: parts.phy,
            timing_reader: parts.timing_reader,
            tx: parts.tx,
            handshake: parts.handshake,
            presence: parts.presence,
            hot_plug: parts.hot_plug,
            validator: parts.validator,
            status,
        }
    }

    pub fn state(&self) -> &LinkState {
        &self.state
    }

    pub fn configuration(&self) -> &DeviceConfig {
        &self.configuration
    }

    /// Takes effect on the next transmit configure, not retroactively.
    pub fn set_configuration(&mut self, configuration: DeviceConfig) {
        self.configuration = configuration;
    }

    pub fn read_presence(&self) -> bool {
        self.presence.read_presence()
    }

    /// Debounced hot-plug task body. Re-samples the line: presence may
    /// have changed again between interrupt delivery and this call.
    pub fn handle_presence(&mut self) {
        let present = self.presence.read_presence();
        self.status.set_presence(present);
        if present {
            if matches!(self.state, LinkState::Idle) {
                self.acquire();
            }
        } else {
            self.teardown_to_idle();
        }
    }

    /// Debounced resolution re-check. Only meaningful while streaming;
    /// a presence loss in the meantime already tore the link down.
    pub fn handle_resolution_change(&mut self) {
        let current = match &self.state {
            LinkState::Streaming { timing } => *timing,
            _ => return,
        };
        self.state = LinkState::ResolutionPending;
        if let Err(error) = self.tx.disable() {
            log::warn!("transmit disable failed during re-check: {}", error);
        }
        match self.timing_reader.read() {
            Ok(fresh) if fresh.same_mode(&current) => {
                log::debug!("resolution change was spurious, resuming stream");
                match self.tx.enable() {
                    Ok(()) => self.state = LinkState::Streaming { timing: current },
                    Err(error) => {
                        log::warn!("stream resume failed, reconfiguring: {}", error);
                        self.bring_up(current);
                    }
                }
            }
            _ => {
                log::info!(
                    "video mode changed (was {}x{} total {}x{}), relinking",
                    current.active_width,
                    current.active_height,
                    current.total_width,
                    current.total_height
                );
                self.status.set_timing(None);
                if let Err(error) = self.phy.power_off() {
                    log::warn!("PHY power-off failed during relink: {}", error);
                }
                self.hot_plug.set(false);
                self.acquire();
            }
        }
    }

    /// Transmit-only recovery: the receive side did not fail and is never
    /// touched, so this must not re-run PHY acquisition.
    pub fn recover_transmit(&mut self) {
        if !matches!(self.state, LinkState::Streaming { .. }) {
            return;
        }
        for retry in 0..self.timings.tx_configure_retries {
            match self.tx.recover() {
                Ok(()) => {
                    log::debug!("transmit datapath recovered");
                    return;
                }
                Err(error) => {
                    log::warn!("transmit recovery failed (retry {}): {}", retry, error);
                }
            }
        }
        self.fault(FaultReason::TxConfigureFailed);
    }

    /// Device detach: forces the transmit path disabled before the caller
    /// withdraws register access.
    pub fn shutdown(&mut self) {
        self.teardown_to_idle();
    }

    fn teardown_to_idle(&mut self) {
        self.hot_plug.set(false);
        if let Err(error) = self.tx.disable() {
            log::warn!("transmit disable failed during teardown: {}", error);
        }
        if let Err(error) = self.phy.power_off() {
            log::warn!("PHY power-off failed during teardown: {}", error);
        }
        self.status.set_timing(None);
        self.status.set_audio(false, 0);
        self.status.set_fault(None);
        if !matches!(self.state, LinkState::Idle) {
            log::info!("link idle");
        }
        self.state = LinkState::Idle;
    }

    fn acquire(&mut self) {
        let mut pixel_clock_hint = None;
        let mut invalid_timing_seen = false;
        for attempt in 0..self.timings.power_on_retries {
            self.state = LinkState::Acquiring { attempt };
            log::debug!("acquiring, power-on attempt {}", attempt);
            if let Err(error) = self.phy.power_on(pixel_clock_hint) {
                log::warn!("PHY power-on failed: {}", error);
                continue;
            }
            for _ in 0..self.timings.lock_polls {
                if !self.presence.read_presence() {
                    self.status.set_presence(false);
                    self.teardown_to_idle();
                    return;
                }
                std::thread::sleep(self.timings.lock_poll_interval);
                if !self.phy.is_locked() {
                    continue;
                }
                let timing = match self.timing_reader.read() {
                    Ok(timing) => timing,
                    Err(error) => {
                        log::warn!("timing read failed: {}", error);
                        continue;
                    }
                };
                if timing.pixel_clock_hz != 0 {
                    pixel_clock_hint = Some(timing.pixel_clock_hz);
                }
                if !(self.validator)(&timing) {
                    invalid_timing_seen = true;
                    continue;
                }
                match self.tx.link_clean() {
                    Ok(true) => (),
                    _ => continue,
                }
                log::info!(
                    "receive PHY locked: {}x{}{} @ {} Hz",
                    timing.active_width,
                    timing.active_height,
                    if timing.interlaced { "i" } else { "p" },
                    timing.pixel_clock_hz
                );
                self.state = LinkState::Locked { timing };
                self.bring_up(timing);
                return;
            }
        }
        // a source lost during the last settle window is an unplug, not
        // a fault
        if !self.presence.read_presence() {
            self.status.set_presence(false);
            self.teardown_to_idle();
            return;
        }
        if let Err(error) = self.phy.power_off() {
            log::warn!("PHY power-off failed after acquisition: {}", error);
        }
        self.fault(if invalid_timing_seen {
            FaultReason::TimingInvalid
        } else {
            FaultReason::PhyLockFailed
        });
    }

    fn bring_up(&mut self, timing: VideoTiming) {
        if let Err(error) = self.handshake.prepare(&self.configuration) {
            log::warn!("source handshake failed: {}", error);
            self.fault(FaultReason::TxConfigureFailed);
            return;
        }
        self.hot_plug.set(true);
        for retry in 0..self.timings.tx_configure_retries {
            match self.tx.configure(&self.configuration, &timing) {
                Ok(()) => {
                    log::info!("streaming");
                    self.status.set_timing(Some(&timing));
                    self.status.set_fault(None);
                    self.state = LinkState::Streaming { timing };
                    return;
                }
                Err(error) => {
                    log::warn!("transmit configure failed (retry {}): {}", retry, error);
                }
            }
        }
        // transmit-side fault: the receive side keeps whatever it had
        self.fault(FaultReason::TxConfigureFailed);
    }

    fn fault(&mut self, reason: FaultReason) {
        log::warn!("link faulted: {:?}", reason);
        self.status.set_timing(None);
        self.status.set_fault(Some(reason));
        self.state = LinkState::Faulted { reason };
    }
}

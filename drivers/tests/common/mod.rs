#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};

use video_bridge_drivers::bus;
use video_bridge_drivers::bus::{MemoryPort, RegisterPort};
use video_bridge_drivers::configuration::{DeviceConfig, DualMode};
use video_bridge_drivers::link;
use video_bridge_drivers::phy;
use video_bridge_drivers::registers::{
    CsiStatus, HActive, HBackPorch, HFrontPorch, HSyncWidth, HTotal, PhyControl, PixelClock,
    Register, ScanFlags, SysStatus, VActive, VBackPorch, VFrontPorch, VSyncWidth, VTotal,
    CSI_BLOCK_STRIDE_WORDS, CSI_STATUS_PHY_LOCKED, SCAN_H_SYNC_POSITIVE, SCAN_INTERLACED,
    SCAN_V_SYNC_POSITIVE, SYS_STATUS_DDC5V, SYS_STATUS_PHY_LOCKED, SYS_STATUS_SYNC_DETECTED,
    SYS_STATUS_TMDS_CLOCK,
};
use video_bridge_drivers::timing;
use video_bridge_drivers::tx;
use video_bridge_types::{PixelFormat, VideoTiming};

/// Simulated bridge hardware: a register file plus scripted receive-PHY
/// lock latency and counters for power cycles and lock polls.
pub struct SimPort {
    pub mem: MemoryPort,
    pub lock_after_polls: AtomicU32,
    reads_since_power: AtomicU32,
    pub total_status_reads: AtomicU32,
    pub power_cycles: AtomicU32,
}

impl SimPort {
    pub fn new(lock_after_polls: u32) -> Self {
        Self {
            mem: MemoryPort::new(),
            lock_after_polls: AtomicU32::new(lock_after_polls),
            reads_since_power: AtomicU32::new(0),
            total_status_reads: AtomicU32::new(0),
            power_cycles: AtomicU32::new(0),
        }
    }

    pub fn set_timing(&self, timing: &VideoTiming) {
        self.mem.set(HActive::default().address(), timing.active_width);
        self.mem.set(VActive::default().address(), timing.active_height);
        self.mem.set(HTotal::default().address(), timing.total_width);
        self.mem.set(VTotal::default().address(), timing.total_height);
        self.mem
            .set(HFrontPorch::default().address(), timing.h_front_porch);
        self.mem.set(HSyncWidth::default().address(), timing.h_sync);
        self.mem
            .set(HBackPorch::default().address(), timing.h_back_porch);
        self.mem
            .set(VFrontPorch::default().address(), timing.v_front_porch);
        self.mem.set(VSyncWidth::default().address(), timing.v_sync);
        self.mem
            .set(VBackPorch::default().address(), timing.v_back_porch);
        self.mem
            .set(PixelClock::default().address(), timing.pixel_clock_hz as u32);
        let mut flags = 0;
        if timing.interlaced {
            flags |= SCAN_INTERLACED;
        }
        if timing.h_sync_positive {
            flags |= SCAN_H_SYNC_POSITIVE;
        }
        if timing.v_sync_positive {
            flags |= SCAN_V_SYNC_POSITIVE;
        }
        self.mem.set(ScanFlags::default().address(), flags);
    }
}

impl RegisterPort for SimPort {
    fn read(&self, address: u16) -> Result<u32, bus::Error> {
        if address == SysStatus::default().address() {
            self.total_status_reads.fetch_add(1, Ordering::SeqCst);
            if self.mem.get(PhyControl::default().address()) & 1 != 0 {
                let reads = self.reads_since_power.fetch_add(1, Ordering::SeqCst) + 1;
                if reads > self.lock_after_polls.load(Ordering::SeqCst) {
                    return Ok(SYS_STATUS_DDC5V
                        | SYS_STATUS_TMDS_CLOCK
                        | SYS_STATUS_PHY_LOCKED
                        | SYS_STATUS_SYNC_DETECTED);
                }
            }
            return Ok(0);
        }
        let csi_status_0 = CsiStatus::default().address();
        let csi_status_1 = CsiStatus::default().offset(CSI_BLOCK_STRIDE_WORDS).address();
        if address == csi_status_0 || address == csi_status_1 {
            return Ok(CSI_STATUS_PHY_LOCKED);
        }
        self.mem.read(address)
    }

    fn write(&self, address: u16, value: u32) -> Result<(), bus::Error> {
        if address == PhyControl::default().address() && value & 1 != 0 {
            self.power_cycles.fetch_add(1, Ordering::SeqCst);
            self.reads_since_power.store(0, Ordering::SeqCst);
        }
        self.mem.write(address, value)
    }
}

/// Scripted presence line. The level can be set at any time; optionally
/// the line flips on its own after `flip_after` samples, to model a cable
/// pull in the middle of a synchronous sequence.
pub struct SimPresence {
    level: std::sync::atomic::AtomicBool,
    flip_after: Option<u32>,
    reads: AtomicU32,
}

impl SimPresence {
    pub fn new(level: bool) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            level: std::sync::atomic::AtomicBool::new(level),
            flip_after: None,
            reads: AtomicU32::new(0),
        })
    }

    pub fn flipping_after(level: bool, flip_after: u32) -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            level: std::sync::atomic::AtomicBool::new(level),
            flip_after: Some(flip_after),
            reads: AtomicU32::new(0),
        })
    }

    pub fn set_level(&self, level: bool) {
        self.level.store(level, Ordering::SeqCst);
    }
}

pub struct PresenceLine(pub std::sync::Arc<SimPresence>);

impl bus::InputLine for PresenceLine {
    fn level(&self) -> Option<bool> {
        let reads = self.0.reads.fetch_add(1, Ordering::SeqCst) + 1;
        let level = self.0.level.load(Ordering::SeqCst);
        match self.0.flip_after {
            Some(flip_after) if reads > flip_after => Some(!level),
            _ => Some(level),
        }
    }
}

/// Records every level driven onto the hot-plug-detect output.
#[derive(Clone, Default)]
pub struct HpdRecorder(pub std::sync::Arc<std::sync::Mutex<Vec<bool>>>);

impl HpdRecorder {
    pub fn levels(&self) -> Vec<bool> {
        self.0.lock().unwrap().clone()
    }
}

impl bus::OutputLine for HpdRecorder {
    fn set_level(&mut self, level: bool) {
        self.0.lock().unwrap().push(level);
    }
}

pub fn default_configuration() -> DeviceConfig {
    DeviceConfig {
        lanes: 4,
        continuous_clock: false,
        dual_mode: DualMode::Auto,
        hdcp: false,
        pixel_format: PixelFormat::Yuv422_8,
    }
}

/// Hardware poll budgets with millisecond-scale delays so tests stay fast.
pub fn fast_timings() -> link::Timings {
    link::Timings {
        lock_polls: 15,
        lock_poll_interval: std::time::Duration::from_millis(1),
        power_on_retries: 3,
        tx_configure_retries: 3,
        hot_plug_debounce: std::time::Duration::from_millis(5),
        resolution_debounce: std::time::Duration::from_millis(20),
    }
}

pub fn timing_1080p60() -> VideoTiming {
    VideoTiming {
        active_width: 1920,
        active_height: 1080,
        total_width: 2200,
        total_height: 1125,
        h_front_porch: 88,
        h_sync: 44,
        h_back_porch: 148,
        v_front_porch: 4,
        v_sync: 5,
        v_back_porch: 36,
        pixel_clock_hz: 148_500_000,
        interlaced: false,
        h_sync_positive: true,
        v_sync_positive: true,
    }
}

pub fn timing_2160p30() -> VideoTiming {
    VideoTiming {
        active_width: 3840,
        active_height: 2160,
        total_width: 4400,
        total_height: 2250,
        h_front_porch: 176,
        h_sync: 88,
        h_back_porch: 296,
        v_front_porch: 8,
        v_sync: 10,
        v_back_porch: 72,
        pixel_clock_hz: 297_000_000,
        interlaced: false,
        h_sync_positive: true,
        v_sync_positive: true,
    }
}

/// Link state machine parts wired to the simulated hardware.
pub fn parts(
    port: &std::sync::Arc<SimPort>,
    presence: std::sync::Arc<SimPresence>,
    hot_plug: HpdRecorder,
) -> link::Parts {
    let shared: bus::SharedPort = port.clone();
    link::Parts {
        phy: Box::new(phy::RxPhy::new(shared.clone())),
        timing_reader: Box::new(timing::DetectedTimingReader::new(shared.clone())),
        tx: Box::new(tx::CsiTx::new(shared.clone())),
        handshake: Box::new(link::RegisterHandshake::new(shared)),
        presence: Box::new(bus::PresenceInput::new(
            Box::new(PresenceLine(presence)),
            bus::Polarity::ActiveHigh,
        )),
        hot_plug: bus::HotPlugOutput::new(Box::new(hot_plug), bus::Polarity::ActiveHigh),
        validator: Box::new(timing::acceptable),
    }
}

pub fn wait_until<Predicate: Fn() -> bool>(description: &str, predicate: Predicate) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !predicate() {
        if std::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", description);
        }
        std::thread::sleep(std::time::Duration::from_millis(5));
    }
}

pub fn machine(
    port: &std::sync::Arc<SimPort>,
    presence: std::sync::Arc<SimPresence>,
    hot_plug: HpdRecorder,
) -> (link::LinkStateMachine, std::sync::Arc<link::Status>) {
    let status = std::sync::Arc::new(link::Status::default());
    (
        link::LinkStateMachine::new(
            parts(port, presence, hot_plug),
            default_configuration(),
            fast_timings(),
            status.clone(),
        ),
        status,
    )
}

use crate::bus;
use crate::bus::SharedPort;
use crate::registers::{
    HActive, HBackPorch, HFrontPorch, HSyncWidth, HTotal, PixelClock, Register, ScanFlags,
    VActive, VBackPorch, VFrontPorch, VSyncWidth, VTotal, SCAN_H_SYNC_POSITIVE, SCAN_INTERLACED,
    SCAN_V_SYNC_POSITIVE,
};
use video_bridge_types::VideoTiming;

/// Pure accessor over the timing-detect bank.
///
/// Returns whatever the hardware currently reports, including all-zero
/// readings during blanking or with no signal; deciding whether a reading
/// is usable is the caller's job.
pub trait TimingReader: Send {
    fn read(&self) -> Result<VideoTiming, bus::Error>;
}

pub struct DetectedTimingReader {
    port: SharedPort,
}

impl DetectedTimingReader {
    pub fn new(port: SharedPort) -> Self {
        Self { port }
    }
}

impl TimingReader for DetectedTimingReader {
    fn read(&self) -> Result<VideoTiming, bus::Error> {
        let port = self.port.as_ref();
        let flags = ScanFlags::default().read(port)?;
        Ok(VideoTiming {
            active_width: HActive::default().read(port)?,
            active_height: VActive::default().read(port)?,
            total_width: HTotal::default().read(port)?,
            total_height: VTotal::default().read(port)?,
            h_front_porch: HFrontPorch::default().read(port)?,
            h_sync: HSyncWidth::default().read(port)?,
            h_back_porch: HBackPorch::default().read(port)?,
            v_front_porch: VFrontPorch::default().read(port)?,
            v_sync: VSyncWidth::default().read(port)?,
            v_back_porch: VBackPorch::default().read(port)?,
            pixel_clock_hz: PixelClock::default().read(port)? as u64,
            interlaced: flags & SCAN_INTERLACED != 0,
            h_sync_positive: flags & SCAN_H_SYNC_POSITIVE != 0,
            v_sync_positive: flags & SCAN_V_SYNC_POSITIVE != 0,
        })
    }
}

/// Default validation policy for detected timings.
///
/// Stands in for the format-enumeration tables: rejects degenerate
/// readings and anything outside the bridge's receivable range.
pub fn acceptable(timing: &VideoTiming) -> bool {
    timing.pixel_clock_hz >= 13_500_000
        && timing.pixel_clock_hz <= 600_000_000
        && timing.active_width >= 640
        && timing.active_width <= 4096
        && timing.active_height >= 240
        && timing.active_height <= 2160
        && timing.total_width > timing.active_width
        && timing.total_height > timing.active_height
}

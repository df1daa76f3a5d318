/// Detected or programmed video timing, replaced wholesale on every
/// detection cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct VideoTiming {
    pub active_width: u32,
    pub active_height: u32,
    pub total_width: u32,
    pub total_height: u32,
    pub h_front_porch: u32,
    pub h_sync: u32,
    pub h_back_porch: u32,
    pub v_front_porch: u32,
    pub v_sync: u32,
    pub v_back_porch: u32,
    pub pixel_clock_hz: u64,
    pub interlaced: bool,
    pub h_sync_positive: bool,
    pub v_sync_positive: bool,
}

impl VideoTiming {
    /// Whether two readings describe the same video mode.
    ///
    /// Sync polarities are ignored, sources re-negotiate them freely
    /// without an actual mode change.
    pub fn same_mode(&self, other: &Self) -> bool {
        self.active_width == other.active_width
            && self.active_height == other.active_height
            && self.total_width == other.total_width
            && self.total_height == other.total_height
            && self.h_front_porch == other.h_front_porch
            && self.h_sync == other.h_sync
            && self.h_back_porch == other.h_back_porch
            && self.v_front_porch == other.v_front_porch
            && self.v_sync == other.v_sync
            && self.v_back_porch == other.v_back_porch
            && self.pixel_clock_hz == other.pixel_clock_hz
            && self.interlaced == other.interlaced
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PixelFormat {
    Rgb888,
    Yuv422_8,
}

impl PixelFormat {
    /// CSI-2 data type code carried in the packet header.
    pub fn data_type(self) -> u8 {
        match self {
            Self::Rgb888 => 0x24,
            Self::Yuv422_8 => 0x1e,
        }
    }

    pub fn bits_per_pixel(self) -> u32 {
        match self {
            Self::Rgb888 => 24,
            Self::Yuv422_8 => 16,
        }
    }
}

use crate::bus;
use crate::bus::RegisterPort;

pub struct RuntimeRegister {
    pub address: u16,
    pub value: u32,
}

pub trait Register {
    fn address(&self) -> u16;

    fn value(&self) -> u32;

    fn offset(&self, registers: u16) -> RuntimeRegister;

    fn read<P: RegisterPort + ?Sized>(&self, port: &P) -> Result<u32, bus::Error> {
        port.read(self.address())
    }

    fn write<P: RegisterPort + ?Sized>(&self, port: &P) -> Result<(), bus::Error> {
        port.write(self.address(), self.value())
    }
}

impl Register for RuntimeRegister {
    fn address(&self) -> u16 {
        self.address
    }
    fn value(&self) -> u32 {
        self.value
    }
    fn offset(&self, registers: u16) -> RuntimeRegister {
        RuntimeRegister {
            address: self.address + registers * 4,
            value: self.value,
        }
    }
}

macro_rules! register {
    ($name:ident, $address:literal, {$($subname:ident: $substart:literal..$subend:literal),+ $(,)?}) => {
        #[derive(Default)]
        pub struct $name {
            $(
                pub $subname: u32,
            )+
        }
        $(
            const _: () = assert!($substart < $subend);
        )+
        impl Register for $name {
            fn address(&self) -> u16 {
                $address
            }
            fn value(&self) -> u32 {
                0u32
                $(
                    | ((self.$subname & (((1u64 << ($subend - $substart)) - 1) as u32)) << $substart)
                )+
            }
            fn offset(&self, registers: u16) -> RuntimeRegister {
                RuntimeRegister {
                    address: $address + registers * 4,
                    value: self.value(),
                }
            }
        }
    };
}

// system block
register! { ChipId,       0x0000, { value: 0..32 } }
register! { SysStatus,    0x0004, { value: 0..32 } }
register! { PhyControl,   0x0010, { enable: 0..1, pll_enable: 1..2, band: 2..5 } }
register! { HpdControl,   0x0014, { asserted: 0..1 } }
register! { HdcpControl,  0x0018, { enable: 0..1 } }
register! { AudioControl, 0x001C, { mute: 0..1 } }

// interrupt block
register! { IntStatus, 0x0020, { value: 0..32 } }
register! { IntClear,  0x0024, { value: 0..32 } }
register! { IntMask,   0x0028, { hot_plug: 0..1, resolution_change: 1..2, transmit_error: 2..3, audio: 3..4 } }

// timing-detect bank, read only
register! { HActive,     0x0040, { value: 0..32 } }
register! { VActive,     0x0044, { value: 0..32 } }
register! { HTotal,      0x0048, { value: 0..32 } }
register! { VTotal,      0x004C, { value: 0..32 } }
register! { HFrontPorch, 0x0050, { value: 0..32 } }
register! { HSyncWidth,  0x0054, { value: 0..32 } }
register! { HBackPorch,  0x0058, { value: 0..32 } }
register! { VFrontPorch, 0x005C, { value: 0..32 } }
register! { VSyncWidth,  0x0060, { value: 0..32 } }
register! { VBackPorch,  0x0064, { value: 0..32 } }
register! { PixelClock,  0x0068, { value: 0..32 } }
register! { ScanFlags,   0x006C, { value: 0..32 } }

// audio status, read only
register! { AudioStatus, 0x0080, { value: 0..32 } }
register! { AudioRate,   0x0084, { value: 0..32 } }

// EDID
register! { EdidLength, 0x0090, { bytes: 0..16 } }
register! { EdidLock,   0x0094, { lock: 0..1 } }
register! { EdidRam,    0x1000, { value: 0..32 } }

// CSI transmit block 0; block 1 lives CSI_BLOCK_STRIDE_WORDS words higher
register! { CsiControl,     0x0100, { enable: 0..1, lanes: 1..4, continuous_clock: 4..5 } }
register! { CsiReset,       0x0104, { soft_reset: 0..1 } }
register! { CsiStatus,      0x0108, { value: 0..32 } }
register! { CsiErrorStatus, 0x010C, { value: 0..32 } }
register! { CsiWordCount,   0x0110, { value: 0..16 } }
register! { CsiFormat,      0x0114, { data_type: 0..8 } }
register! { CsiPhyPower,    0x0118, { enable: 0..1 } }
register! { CsiConfigDone,  0x011C, { strobe: 0..1 } }

pub const CSI_BLOCK_STRIDE_WORDS: u16 = 16;
pub const CSI_OUTPUT_BLOCKS: usize = 2;

pub const SYS_STATUS_DDC5V: u32 = 1 << 0;
pub const SYS_STATUS_TMDS_CLOCK: u32 = 1 << 1;
pub const SYS_STATUS_PHY_LOCKED: u32 = 1 << 2;
pub const SYS_STATUS_SYNC_DETECTED: u32 = 1 << 3;

pub const INT_HOT_PLUG: u32 = 1 << 0;
pub const INT_RESOLUTION_CHANGE: u32 = 1 << 1;
pub const INT_TRANSMIT_ERROR: u32 = 1 << 2;
pub const INT_AUDIO: u32 = 1 << 3;

pub const SCAN_INTERLACED: u32 = 1 << 0;
pub const SCAN_H_SYNC_POSITIVE: u32 = 1 << 1;
pub const SCAN_V_SYNC_POSITIVE: u32 = 1 << 2;

pub const AUDIO_STATUS_PRESENT: u32 = 1 << 0;

pub const CSI_CONTROL_ENABLE: u32 = 1 << 0;
pub const CSI_STATUS_PHY_LOCKED: u32 = 1 << 0;

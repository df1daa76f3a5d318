#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error("register bus i/o failure at address {address:#06x}")]
    Io { address: u16 },
}

/// 32-bit register transport to the bridge, typically I2C-backed.
///
/// The transport is assumed reliable; an `Err` means the bus itself failed,
/// not that the device rejected the access.
pub trait RegisterPort {
    fn read(&self, address: u16) -> Result<u32, Error>;

    fn write(&self, address: u16, value: u32) -> Result<(), Error>;

    fn update_bits(&self, address: u16, mask: u32, value: u32) -> Result<(), Error> {
        let current = self.read(address)?;
        let next = (current & !mask) | (value & mask);
        if next == current {
            return Ok(());
        }
        self.write(address, next)
    }
}

pub type SharedPort = std::sync::Arc<dyn RegisterPort + Send + Sync>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    fn apply(self, level: bool) -> bool {
        match self {
            Self::ActiveHigh => level,
            Self::ActiveLow => !level,
        }
    }
}

/// GPIO-style input. `None` means the line could not be read.
pub trait InputLine: Send {
    fn level(&self) -> Option<bool>;
}

/// GPIO-style output.
pub trait OutputLine: Send {
    fn set_level(&mut self, level: bool);
}

/// Level-triggered source presence (5V / hot-plug input).
pub trait PresenceSensor: Send {
    fn read_presence(&self) -> bool;
}

pub struct PresenceInput {
    line: Box<dyn InputLine>,
    polarity: Polarity,
}

impl PresenceInput {
    pub fn new(line: Box<dyn InputLine>, polarity: Polarity) -> Self {
        Self { line, polarity }
    }
}

impl PresenceSensor for PresenceInput {
    /// An unreadable line reads as absent (fail safe to the disabled state).
    fn read_presence(&self) -> bool {
        self.line
            .level()
            .map(|level| self.polarity.apply(level))
            .unwrap_or(false)
    }
}

/// Hot-plug-detect toward the source, driven only by the link state machine.
pub struct HotPlugOutput {
    line: Box<dyn OutputLine>,
    polarity: Polarity,
}

impl HotPlugOutput {
    pub fn new(line: Box<dyn OutputLine>, polarity: Polarity) -> Self {
        Self { line, polarity }
    }

    pub fn set(&mut self, asserted: bool) {
        self.line.set_level(self.polarity.apply(asserted));
    }
}

/// The two board-level lines wired to the bridge.
pub struct Lines {
    pub presence: Box<dyn InputLine>,
    pub presence_polarity: Polarity,
    pub hot_plug: Box<dyn OutputLine>,
    pub hot_plug_polarity: Polarity,
}

/// In-memory register file, for simulations and tests.
#[derive(Clone, Default)]
pub struct MemoryPort {
    registers: std::sync::Arc<std::sync::Mutex<std::collections::HashMap<u16, u32>>>,
    writes: std::sync::Arc<std::sync::Mutex<Vec<(u16, u32)>>>,
}

impl MemoryPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdoor write that does not appear in the write log.
    pub fn set(&self, address: u16, value: u32) {
        self.registers
            .lock()
            .expect("mutex is not poisoned")
            .insert(address, value);
    }

    pub fn get(&self, address: u16) -> u32 {
        *self
            .registers
            .lock()
            .expect("mutex is not poisoned")
            .get(&address)
            .unwrap_or(&0)
    }

    pub fn writes(&self) -> Vec<(u16, u32)> {
        self.writes.lock().expect("mutex is not poisoned").clone()
    }

    pub fn clear_writes(&self) {
        self.writes.lock().expect("mutex is not poisoned").clear();
    }
}

impl RegisterPort for MemoryPort {
    fn read(&self, address: u16) -> Result<u32, Error> {
        Ok(self.get(address))
    }

    fn write(&self, address: u16, value: u32) -> Result<(), Error> {
        self.writes
            .lock()
            .expect("mutex is not poisoned")
            .push((address, value));
        self.set(address, value);
        Ok(())
    }
}

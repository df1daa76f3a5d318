use crate::bus;
use crate::bus::SharedPort;
use crate::registers::{EdidLength, EdidLock, EdidRam, Register};

pub const BLOCK_SIZE: usize = 128;
pub const MAX_BLOCKS: usize = 4;

#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    #[error(transparent)]
    Bus(#[from] bus::Error),

    #[error("EDID data length {0} is not a multiple of the 128-byte block size")]
    NotBlockAligned(usize),

    #[error("{0} EDID blocks requested, at most 4 supported")]
    TooManyBlocks(usize),

    #[error("requested blocks {start_block}+{count} exceed the {written} written")]
    OutOfRange {
        start_block: usize,
        count: usize,
        written: usize,
    },
}

/// Capability table presented to the source over DDC.
///
/// The byte contents are the host's business; this store only moves them
/// in and out of the bridge's EDID RAM and keeps the written-block count.
pub struct EdidStore {
    port: SharedPort,
    blocks_written: usize,
}

impl EdidStore {
    pub fn new(port: SharedPort) -> Self {
        Self {
            port,
            blocks_written: 0,
        }
    }

    /// Writing zero blocks clears the store.
    pub fn write(&mut self, blocks: &[u8]) -> Result<(), Error> {
        if blocks.len() % BLOCK_SIZE != 0 {
            return Err(Error::NotBlockAligned(blocks.len()));
        }
        let count = blocks.len() / BLOCK_SIZE;
        if count > MAX_BLOCKS {
            return Err(Error::TooManyBlocks(count));
        }
        if count == 0 {
            EdidLength { bytes: 0 }.write(self.port.as_ref())?;
            EdidLock { lock: 0 }.write(self.port.as_ref())?;
            self.blocks_written = 0;
            return Ok(());
        }
        for (word, chunk) in blocks.chunks_exact(4).enumerate() {
            // unwrap: chunks_exact yields 4-byte slices
            EdidRam {
                value: u32::from_le_bytes(chunk.try_into().unwrap()),
            }
            .offset(word as u16)
            .write(self.port.as_ref())?;
        }
        EdidLength {
            bytes: blocks.len() as u32,
        }
        .write(self.port.as_ref())?;
        EdidLock { lock: 1 }.write(self.port.as_ref())?;
        self.blocks_written = count;
        Ok(())
    }

    pub fn read(&self, start_block: usize, count: usize) -> Result<Vec<u8>, Error> {
        if start_block + count > self.blocks_written {
            return Err(Error::OutOfRange {
                start_block,
                count,
                written: self.blocks_written,
            });
        }
        let first_word = start_block * BLOCK_SIZE / 4;
        let words = count * BLOCK_SIZE / 4;
        let mut bytes = Vec::with_capacity(count * BLOCK_SIZE);
        for word in first_word..first_word + words {
            let value = EdidRam { value: 0 }
                .offset(word as u16)
                .read(self.port.as_ref())?;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Ok(bytes)
    }

    pub fn blocks_written(&self) -> usize {
        self.blocks_written
    }
}

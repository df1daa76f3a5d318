use std::sync::Arc;

use video_bridge_drivers::bus::MemoryPort;
use video_bridge_drivers::edid::{EdidStore, Error, BLOCK_SIZE, MAX_BLOCKS};
use video_bridge_drivers::registers::{EdidLength, EdidLock, Register};

fn patterned(blocks: usize) -> Vec<u8> {
    (0..blocks * BLOCK_SIZE).map(|index| index as u8).collect()
}

#[test]
fn written_bytes_read_back_exactly() {
    let port = MemoryPort::new();
    let mut store = EdidStore::new(Arc::new(port.clone()));
    let data = patterned(2);

    store.write(&data).unwrap();

    assert_eq!(store.blocks_written(), 2);
    assert_eq!(store.read(0, 2).unwrap(), data);
    assert_eq!(store.read(1, 1).unwrap(), data[BLOCK_SIZE..]);
    assert_eq!(port.get(EdidLength::default().address()), 2 * BLOCK_SIZE as u32);
    assert_eq!(port.get(EdidLock::default().address()), 1);
}

#[test]
fn four_blocks_are_accepted() {
    let port = MemoryPort::new();
    let mut store = EdidStore::new(Arc::new(port.clone()));
    let data = patterned(MAX_BLOCKS);
    store.write(&data).unwrap();
    assert_eq!(store.blocks_written(), MAX_BLOCKS);
    assert_eq!(store.read(0, MAX_BLOCKS).unwrap(), data);
}

#[test]
fn empty_write_clears_the_store() {
    let port = MemoryPort::new();
    let mut store = EdidStore::new(Arc::new(port.clone()));
    store.write(&patterned(1)).unwrap();

    store.write(&[]).unwrap();

    assert_eq!(store.blocks_written(), 0);
    assert_eq!(port.get(EdidLength::default().address()), 0);
    assert_eq!(port.get(EdidLock::default().address()), 0);
    assert!(matches!(
        store.read(0, 1),
        Err(Error::OutOfRange {
            start_block: 0,
            count: 1,
            written: 0
        })
    ));
}

#[test]
fn partial_blocks_are_rejected() {
    let port = MemoryPort::new();
    let mut store = EdidStore::new(Arc::new(port.clone()));
    assert!(matches!(
        store.write(&[0u8; 100]),
        Err(Error::NotBlockAligned(100))
    ));
    assert_eq!(store.blocks_written(), 0);
    assert!(port.writes().is_empty());
}

#[test]
fn more_than_four_blocks_are_rejected() {
    let port = MemoryPort::new();
    let mut store = EdidStore::new(Arc::new(port.clone()));
    assert!(matches!(
        store.write(&patterned(MAX_BLOCKS + 1)),
        Err(Error::TooManyBlocks(5))
    ));
    assert!(port.writes().is_empty());
}

#[test]
fn reads_past_the_written_count_are_rejected() {
    let port = MemoryPort::new();
    let mut store = EdidStore::new(Arc::new(port.clone()));
    store.write(&patterned(1)).unwrap();
    assert!(matches!(
        store.read(1, 1),
        Err(Error::OutOfRange {
            start_block: 1,
            count: 1,
            written: 1
        })
    ));
}

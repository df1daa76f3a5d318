use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use video_bridge_drivers::bus::MemoryPort;
use video_bridge_drivers::dispatch::{read_and_clear, read_audio_status, DeferredSlot, PollLoop};
use video_bridge_drivers::registers::{
    AudioRate, AudioStatus, IntClear, IntStatus, Register, AUDIO_STATUS_PRESENT, INT_HOT_PLUG,
    INT_RESOLUTION_CHANGE, INT_TRANSMIT_ERROR,
};

#[test]
fn interrupt_causes_are_classified_and_acknowledged() {
    let port = MemoryPort::new();
    port.set(
        IntStatus::default().address(),
        INT_HOT_PLUG | INT_TRANSMIT_ERROR,
    );

    let causes = read_and_clear(&port).unwrap();

    assert!(causes.hot_plug);
    assert!(causes.transmit_error);
    assert!(!causes.resolution_change);
    assert!(!causes.audio);
    // exactly the observed bits are acknowledged
    assert_eq!(
        port.writes(),
        vec![(
            IntClear::default().address(),
            INT_HOT_PLUG | INT_TRANSMIT_ERROR
        )]
    );
}

#[test]
fn quiet_status_writes_nothing() {
    let port = MemoryPort::new();
    let causes = read_and_clear(&port).unwrap();
    assert_eq!(causes, Default::default());
    assert!(port.writes().is_empty());
}

#[test]
fn audio_status_reads_rate_only_when_present() {
    let port = MemoryPort::new();
    port.set(AudioRate::default().address(), 48_000);
    assert_eq!(read_audio_status(&port).unwrap(), (false, 0));

    port.set(AudioStatus::default().address(), AUDIO_STATUS_PRESENT);
    assert_eq!(read_audio_status(&port).unwrap(), (true, 48_000));
}

#[test]
fn resolution_change_interrupt_sets_only_its_cause() {
    let port = MemoryPort::new();
    port.set(IntStatus::default().address(), INT_RESOLUTION_CHANGE);
    let causes = read_and_clear(&port).unwrap();
    assert!(causes.resolution_change);
    assert!(!causes.hot_plug);
}

#[test]
fn burst_of_schedules_runs_the_task_once() {
    let count = Arc::new(AtomicU32::new(0));
    let task_count = count.clone();
    let slot = DeferredSlot::new("burst", move || {
        task_count.fetch_add(1, Ordering::SeqCst);
    });

    for _ in 0..5 {
        slot.schedule(std::time::Duration::from_millis(40));
    }
    std::thread::sleep(std::time::Duration::from_millis(300));

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn rescheduling_moves_the_deadline() {
    let count = Arc::new(AtomicU32::new(0));
    let task_count = count.clone();
    let slot = DeferredSlot::new("reschedule", move || {
        task_count.fetch_add(1, Ordering::SeqCst);
    });

    slot.schedule(std::time::Duration::from_millis(200));
    std::thread::sleep(std::time::Duration::from_millis(100));
    slot.schedule(std::time::Duration::from_millis(300));
    // past the first deadline, before the replacement one
    std::thread::sleep(std::time::Duration::from_millis(150));
    assert_eq!(count.load(Ordering::SeqCst), 0);

    std::thread::sleep(std::time::Duration::from_millis(300));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn cancel_discards_the_pending_task() {
    let count = Arc::new(AtomicU32::new(0));
    let task_count = count.clone();
    let slot = DeferredSlot::new("cancel", move || {
        task_count.fetch_add(1, Ordering::SeqCst);
    });

    slot.schedule(std::time::Duration::from_millis(50));
    slot.cancel();
    std::thread::sleep(std::time::Duration::from_millis(200));

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn drop_joins_and_discards_the_pending_task() {
    let count = Arc::new(AtomicU32::new(0));
    let task_count = count.clone();
    let slot = DeferredSlot::new("drop", move || {
        task_count.fetch_add(1, Ordering::SeqCst);
    });

    slot.schedule(std::time::Duration::from_millis(200));
    drop(slot);

    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn poll_loop_runs_until_dropped() {
    let count = Arc::new(AtomicU32::new(0));
    let callback_count = count.clone();
    let poll_loop = PollLoop::new(std::time::Duration::from_millis(5), move || {
        callback_count.fetch_add(1, Ordering::SeqCst);
    });

    std::thread::sleep(std::time::Duration::from_millis(100));
    drop(poll_loop);
    let after_drop = count.load(Ordering::SeqCst);
    assert!(after_drop >= 1);

    std::thread::sleep(std::time::Duration::from_millis(100));
    assert_eq!(count.load(Ordering::SeqCst), after_drop);
}

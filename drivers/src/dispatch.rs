use crate::bus;
use crate::bus::RegisterPort;
use crate::registers::{
    AudioRate, AudioStatus, IntClear, IntStatus, Register, AUDIO_STATUS_PRESENT, INT_AUDIO,
    INT_HOT_PLUG, INT_RESOLUTION_CHANGE, INT_TRANSMIT_ERROR,
};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Causes {
    pub hot_plug: bool,
    pub resolution_change: bool,
    pub transmit_error: bool,
    pub audio: bool,
}

/// Reads the interrupt status and clears exactly the observed bits.
///
/// Status is read before the clear so a cause raised between the two
/// operations is kept pending for the next dispatch. Touches only the
/// interrupt status/clear registers, safe without the configuration lock.
pub fn read_and_clear<P: RegisterPort + ?Sized>(port: &P) -> Result<Causes, bus::Error> {
    let raw = IntStatus::default().read(port)?;
    if raw != 0 {
        IntClear { value: raw }.write(port)?;
    }
    Ok(Causes {
        hot_plug: raw & INT_HOT_PLUG != 0,
        resolution_change: raw & INT_RESOLUTION_CHANGE != 0,
        transmit_error: raw & INT_TRANSMIT_ERROR != 0,
        audio: raw & INT_AUDIO != 0,
    })
}

/// Audio presence and sample rate from the status bank. The decoding
/// internals live in hardware; this only snapshots the result.
pub fn read_audio_status<P: RegisterPort + ?Sized>(port: &P) -> Result<(bool, u32), bus::Error> {
    let present = AudioStatus::default().read(port)? & AUDIO_STATUS_PRESENT != 0;
    let rate = if present {
        AudioRate::default().read(port)?
    } else {
        0
    };
    Ok((present, rate))
}

struct SlotState {
    deadline: Option<std::time::Instant>,
    shutdown: bool,
}

/// Single-slot debounced task: at most one pending instance, latest
/// scheduling request wins, cancelable, joined on drop.
pub struct DeferredSlot {
    shared: std::sync::Arc<(std::sync::Mutex<SlotState>, std::sync::Condvar)>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl DeferredSlot {
    pub fn new<Task>(name: &'static str, mut task: Task) -> Self
    where
        Task: FnMut() + Send + 'static,
    {
        let shared = std::sync::Arc::new((
            std::sync::Mutex::new(SlotState {
                deadline: None,
                shutdown: false,
            }),
            std::sync::Condvar::new(),
        ));
        let thread_shared = shared.clone();
        Self {
            shared,
            thread: Some(std::thread::spawn(move || {
                let (lock, condvar) = &*thread_shared;
                'outer: loop {
                    {
                        let mut state = lock.lock().expect("mutex is not poisoned");
                        loop {
                            if state.shutdown {
                                break 'outer;
                            }
                            match state.deadline {
                                None => {
                                    state = condvar.wait(state).expect("mutex is not poisoned");
                                }
                                Some(deadline) => {
                                    let now = std::time::Instant::now();
                                    if now >= deadline {
                                        state.deadline = None;
                                        break;
                                    }
                                    state = condvar
                                        .wait_timeout(state, deadline - now)
                                        .expect("mutex is not poisoned")
                                        .0;
                                }
                            }
                        }
                    }
                    log::debug!("deferred task \"{}\" firing", name);
                    task();
                }
            })),
        }
    }

    /// Replaces any pending instance: bursts of the same cause collapse
    /// into one execution anchored at the latest request.
    pub fn schedule(&self, delay: std::time::Duration) {
        let (lock, condvar) = &*self.shared;
        lock.lock().expect("mutex is not poisoned").deadline =
            Some(std::time::Instant::now() + delay);
        condvar.notify_one();
    }

    pub fn cancel(&self) {
        let (lock, condvar) = &*self.shared;
        lock.lock().expect("mutex is not poisoned").deadline = None;
        condvar.notify_one();
    }
}

impl Drop for DeferredSlot {
    fn drop(&mut self) {
        {
            let (lock, condvar) = &*self.shared;
            let mut state = lock.lock().expect("mutex is not poisoned");
            state.deadline = None;
            state.shutdown = true;
            condvar.notify_one();
        }
        if let Some(thread) = self.thread.take() {
            // unwrap: not joining self
            thread.join().unwrap();
        }
    }
}

/// Fixed-period dispatch fallback for integrations without an interrupt
/// line.
pub struct PollLoop {
    running: std::sync::Arc<std::sync::atomic::AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl PollLoop {
    pub fn new<Callback>(period: std::time::Duration, mut callback: Callback) -> Self
    where
        Callback: FnMut() + Send + 'static,
    {
        let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
        let thread_running = running.clone();
        Self {
            running,
            thread: Some(std::thread::spawn(move || {
                while thread_running.load(std::sync::atomic::Ordering::Acquire) {
                    callback();
                    std::thread::sleep(period);
                }
            })),
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.running
            .store(false, std::sync::atomic::Ordering::Release);
        if let Some(thread) = self.thread.take() {
            thread.join().expect("poll loop joined self");
        }
    }
}

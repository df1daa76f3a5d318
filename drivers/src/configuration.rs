use video_bridge_types::PixelFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DualMode {
    /// Split across two lane-groups only when the pixel clock demands it.
    Auto,
    /// Hardware-pinned to dual output.
    Forced,
}

/// Semi-static control inputs. Changes take effect on the next transmit
/// configure call, never retroactively on an already-streaming link.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DeviceConfig {
    pub lanes: u8,
    pub continuous_clock: bool,
    pub dual_mode: DualMode,
    pub hdcp: bool,
    pub pixel_format: PixelFormat,
}

impl DeviceConfig {
    pub fn deserialize_bincode(data: &[u8]) -> bincode::Result<DeviceConfig> {
        bincode::deserialize(data)
    }
}

/// Applies configuration updates on a background thread so control writes
/// never block on register sequencing.
///
/// The pending slot holds at most one configuration: writing into it
/// replaces whatever is still waiting, so bursts of updates coalesce and
/// only the latest one is applied.
pub struct Updater<Configuration> {
    pending: std::sync::Arc<(std::sync::Mutex<Option<Configuration>>, std::sync::Condvar)>,
    running: std::sync::Arc<std::sync::atomic::AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl<Configuration: Clone + Send + 'static> Updater<Configuration> {
    pub fn new<ContextType, Apply>(
        initial_configuration: Configuration,
        context: ContextType,
        apply: Apply,
    ) -> Self
    where
        ContextType: Send + 'static,
        Apply: Fn(ContextType, &Configuration, &Configuration) -> ContextType + Send + 'static,
    {
        let pending = std::sync::Arc::new((
            std::sync::Mutex::new(None),
            std::sync::Condvar::new(),
        ));
        let running = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(true));
        let thread_pending = pending.clone();
        let thread_running = running.clone();
        Self {
            pending,
            running,
            thread: Some(std::thread::spawn(move || {
                let mut context = context;
                let mut previous = initial_configuration;
                while thread_running.load(std::sync::atomic::Ordering::Acquire) {
                    let next = {
                        let (lock, condvar) = &*thread_pending;
                        let mut slot = lock.lock().expect("mutex is not poisoned");
                        if slot.is_none() {
                            slot = condvar
                                .wait_timeout(slot, std::time::Duration::from_millis(100))
                                .expect("mutex is not poisoned")
                                .0;
                        }
                        slot.take()
                    };
                    // apply outside the slot lock, update() never blocks on
                    // register sequencing
                    if let Some(configuration) = next {
                        context = apply(context, &previous, &configuration);
                        previous = configuration;
                    }
                }
            })),
        }
    }

    pub fn update(&self, configuration: Configuration) {
        let (lock, condvar) = &*self.pending;
        *lock.lock().expect("mutex is not poisoned") = Some(configuration);
        condvar.notify_one();
    }
}

impl<Configuration> Drop for Updater<Configuration> {
    fn drop(&mut self) {
        self.running
            .store(false, std::sync::atomic::Ordering::Release);
        let (lock, condvar) = &*self.pending;
        *lock.lock().expect("mutex is not poisoned") = None;
        condvar.notify_one();
        if let Some(thread) = self.thread.take() {
            // unwrap: not joining self
            thread.join().unwrap();
        }
    }
}

use crate::bus;
use crate::bus::SharedPort;
use crate::configuration;
use crate::configuration::DeviceConfig;
use crate::dispatch;
use crate::edid;
use crate::error;
use crate::link;
use crate::phy;
use crate::registers::{ChipId, IntMask, Register};
use crate::timing;
use crate::tx;

#[derive(thiserror::Error, Debug, Clone)]
pub enum AttachError {
    #[error(transparent)]
    Bus(#[from] bus::Error),

    #[error("unexpected chip id (expected {expected:#010x}, found {found:#010x})")]
    UnexpectedChipId { expected: u32, found: u32 },
}

/// A supported bridge chip revision.
pub trait Chip: Sized {
    type Configuration;
    type Error;
    type Properties;

    const CHIP_ID: u32;

    const PROPERTIES: Self::Properties;

    /// `poll_period` enables the timer-dispatch fallback for integrations
    /// without an interrupt line; with a real line, pass `None` and call
    /// `handle_interrupt` from the ISR glue.
    fn attach<P, IntoError, IntoWarning>(
        port: std::sync::Arc<P>,
        lines: bus::Lines,
        configuration: Self::Configuration,
        poll_period: Option<std::time::Duration>,
        error_flag: error::Flag<IntoError, IntoWarning>,
    ) -> Result<Self, Self::Error>
    where
        P: bus::RegisterPort + Send + Sync + 'static,
        IntoError: From<bus::Error> + Clone + Send + 'static,
        IntoWarning: From<error::Warning> + Clone + Send + 'static;

    fn update_configuration(&self, configuration: Self::Configuration);

    fn status(&self) -> link::StatusSnapshot;

    fn state(&self) -> link::LinkState;

    fn handle_interrupt(&self) -> Result<dispatch::Causes, bus::Error>;

    fn write_edid(&self, blocks: &[u8]) -> Result<(), edid::Error>;

    fn read_edid(&self, start_block: usize, count: usize) -> Result<Vec<u8>, edid::Error>;

    fn edid_blocks_written(&self) -> usize;
}

#[derive(Clone)]
struct DispatchContext {
    port: SharedPort,
    core: std::sync::Arc<std::sync::Mutex<link::LinkStateMachine>>,
    status: std::sync::Arc<link::Status>,
    hotplug_slot: std::sync::Arc<dispatch::DeferredSlot>,
    resolution_slot: std::sync::Arc<dispatch::DeferredSlot>,
    timings: link::Timings,
}

impl DispatchContext {
    /// Interrupt bottom-half: classify, recover, schedule. Only the
    /// status/clear read runs without the configuration lock; transmit
    /// recovery takes it, every other cause is deferred.
    fn dispatch(&self) -> Result<dispatch::Causes, bus::Error> {
        let causes = dispatch::read_and_clear(self.port.as_ref())?;
        // transmit errors are cleared before any resolution-change
        // scheduling so a burst with both causes does not leave a stale
        // error flag pending for a whole debounce window
        if causes.transmit_error {
            self.core
                .lock()
                .expect("mutex is not poisoned")
                .recover_transmit();
        }
        if causes.hot_plug {
            self.hotplug_slot.schedule(self.timings.hot_plug_debounce);
        }
        if causes.resolution_change {
            self.resolution_slot
                .schedule(self.timings.resolution_debounce);
        }
        if causes.audio {
            let (present, sample_rate_hz) = dispatch::read_audio_status(self.port.as_ref())?;
            self.status.set_audio(present, sample_rate_hz);
        }
        Ok(causes)
    }
}

/// Everything common to the supported chip revisions: the configuration
/// lock around the link state machine, the deferred-work slots, the EDID
/// store and the optional poll loop.
pub struct Runtime {
    context: Option<DispatchContext>,
    edid: std::sync::Mutex<edid::EdidStore>,
    hotplug_slot: Option<std::sync::Arc<dispatch::DeferredSlot>>,
    resolution_slot: Option<std::sync::Arc<dispatch::DeferredSlot>>,
    configuration_updater: Option<configuration::Updater<DeviceConfig>>,
    poll_loop: Option<dispatch::PollLoop>,
    core: std::sync::Arc<std::sync::Mutex<link::LinkStateMachine>>,
    status: std::sync::Arc<link::Status>,
    port: SharedPort,
}

impl Runtime {
    pub fn attach<IntoError, IntoWarning>(
        port: SharedPort,
        lines: bus::Lines,
        chip_id: u32,
        timings: link::Timings,
        configuration: DeviceConfig,
        poll_period: Option<std::time::Duration>,
        error_flag: error::Flag<IntoError, IntoWarning>,
    ) -> Result<Self, AttachError>
    where
        IntoError: From<bus::Error> + Clone + Send + 'static,
        IntoWarning: From<error::Warning> + Clone + Send + 'static,
    {
        let found = ChipId::default().read(port.as_ref())?;
        if found != chip_id {
            return Err(AttachError::UnexpectedChipId {
                expected: chip_id,
                found,
            });
        }
        let status = std::sync::Arc::new(link::Status::default());
        let core = std::sync::Arc::new(std::sync::Mutex::new(link::LinkStateMachine::new(
            link::Parts {
                phy: Box::new(phy::RxPhy::new(port.clone())),
                timing_reader: Box::new(timing::DetectedTimingReader::new(port.clone())),
                tx: Box::new(tx::CsiTx::new(port.clone())),
                handshake: Box::new(link::RegisterHandshake::new(port.clone())),
                presence: Box::new(bus::PresenceInput::new(
                    lines.presence,
                    lines.presence_polarity,
                )),
                hot_plug: bus::HotPlugOutput::new(lines.hot_plug, lines.hot_plug_polarity),
                validator: Box::new(timing::acceptable),
            },
            configuration.clone(),
            timings.clone(),
            status.clone(),
        )));
        let resolution_slot = {
            let core = core.clone();
            std::sync::Arc::new(dispatch::DeferredSlot::new("res_change", move || {
                core.lock()
                    .expect("mutex is not poisoned")
                    .handle_resolution_change();
            }))
        };
        let hotplug_slot = {
            let core = core.clone();
            let resolution_slot = resolution_slot.clone();
            std::sync::Arc::new(dispatch::DeferredSlot::new("hotplug", move || {
                let mut core = core.lock().expect("mutex is not poisoned");
                // debounced work for a lost source is cancelled before the
                // link is torn down
                if !core.read_presence() {
                    resolution_slot.cancel();
                }
                core.handle_presence();
            }))
        };
        let configuration_updater = {
            let core = core.clone();
            configuration::Updater::new(
                configuration,
                core,
                |core, _previous_configuration, configuration| {
                    core.lock()
                        .expect("mutex is not poisoned")
                        .set_configuration(configuration.clone());
                    core
                },
            )
        };
        IntMask {
            hot_plug: 1,
            resolution_change: 1,
            transmit_error: 1,
            audio: 1,
        }
        .write(port.as_ref())?;
        let context = DispatchContext {
            port: port.clone(),
            core: core.clone(),
            status: status.clone(),
            hotplug_slot: hotplug_slot.clone(),
            resolution_slot: resolution_slot.clone(),
            timings,
        };
        let poll_loop = poll_period.map(|period| {
            let context = context.clone();
            dispatch::PollLoop::new(period, move || match context.dispatch() {
                Ok(causes) => {
                    if causes.transmit_error {
                        error_flag.park_warning(error::Warning::TransmitErrorRecovered);
                    }
                }
                Err(error) => error_flag.park_error(error),
            })
        });
        // sample the initial presence level
        hotplug_slot.schedule(std::time::Duration::ZERO);
        Ok(Self {
            context: Some(context),
            edid: std::sync::Mutex::new(edid::EdidStore::new(port.clone())),
            hotplug_slot: Some(hotplug_slot),
            resolution_slot: Some(resolution_slot),
            configuration_updater: Some(configuration_updater),
            poll_loop,
            core,
            status,
            port,
        })
    }

    pub fn update_configuration(&self, configuration: DeviceConfig) {
        if let Some(updater) = &self.configuration_updater {
            updater.update(configuration);
        }
    }

    pub fn status(&self) -> link::StatusSnapshot {
        self.status.snapshot()
    }

    pub fn state(&self) -> link::LinkState {
        self.core
            .lock()
            .expect("mutex is not poisoned")
            .state()
            .clone()
    }

    pub fn handle_interrupt(&self) -> Result<dispatch::Causes, bus::Error> {
        self.context
            .as_ref()
            .expect("dispatch context is present until drop")
            .dispatch()
    }

    pub fn write_edid(&self, blocks: &[u8]) -> Result<(), edid::Error> {
        self.edid
            .lock()
            .expect("mutex is not poisoned")
            .write(blocks)
    }

    pub fn read_edid(&self, start_block: usize, count: usize) -> Result<Vec<u8>, edid::Error> {
        self.edid
            .lock()
            .expect("mutex is not poisoned")
            .read(start_block, count)
    }

    pub fn edid_blocks_written(&self) -> usize {
        self.edid
            .lock()
            .expect("mutex is not poisoned")
            .blocks_written()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // every deferred task is cancelled and joined before the transmit
        // path is forced off and register access is withdrawn
        self.poll_loop.take();
        self.configuration_updater.take();
        self.context.take();
        self.hotplug_slot.take();
        self.resolution_slot.take();
        self.core
            .lock()
            .expect("mutex is not poisoned")
            .shutdown();
        let _ = IntMask::default().write(self.port.as_ref());
    }
}

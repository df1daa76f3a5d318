use crate::bus;
use crate::device::Chip;
use crate::dispatch;
use crate::edid;
use crate::error;
use crate::link;
use crate::registers::Register;

macro_rules! register {
    ($($module:ident),+) => {
        paste::paste! {
            $(
                pub mod $module;
            )+

            #[derive(Debug, Copy, Clone)]
            pub enum Type {
                $(
                    [<$module:camel>],
                )+
            }

            impl std::fmt::Display for Type {
                fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    match self {
                        $(
                            Self::[<$module:camel>] => write!(formatter, stringify!($module)),
                        )+
                    }
                }
            }

            impl Type {
                pub fn name(self) -> &'static str {
                    match self {
                        $(
                            Type::[<$module:camel>] => $module::Device::PROPERTIES.name,
                        )+
                    }
                }
            }

            #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
            #[serde(tag = "type", content = "configuration")]
            pub enum Configuration {
                $(
                    #[serde(rename = "" $module)]
                    [<$module:camel>]($module::Configuration),
                )+
            }

            impl Configuration {
                pub fn deserialize_bincode(
                    device_type: Type,
                    data: &[u8]
                ) -> bincode::Result<Configuration> {
                    match device_type {
                        $(
                            Type::[<$module:camel>] => Ok(
                                Configuration::[<$module:camel>](bincode::deserialize(data)?)
                            ),
                        )+
                    }
                }

                pub fn type_name(&self) -> &'static str {
                    match self {
                        $(
                            Configuration::[<$module:camel>](_) => Type::[<$module:camel>].name(),
                        )+
                    }
                }
            }

            pub enum Device {
                $(
                    [<$module:camel>]($module::Device),
                )+
            }

            /// Attaches to the bridge behind `port`. Without an explicit
            /// configuration, the chip-id register selects the revision and
            /// its default configuration is used.
            pub fn attach<P, IntoError, IntoWarning>(
                port: std::sync::Arc<P>,
                lines: bus::Lines,
                configuration: Option<Configuration>,
                poll_period: Option<std::time::Duration>,
                error_flag: error::Flag<IntoError, IntoWarning>,
            ) -> Result<Device, Error>
            where
                P: bus::RegisterPort + Send + Sync + 'static,
                IntoError: From<bus::Error> + Clone + Send + 'static,
                IntoWarning: From<error::Warning> + Clone + Send + 'static,
            {
                match configuration {
                    Some(configuration) => match configuration {
                        $(
                            Configuration::[<$module:camel>](configuration) => Ok(
                                Device::[<$module:camel>]($module::Device::attach(
                                    port,
                                    lines,
                                    configuration,
                                    poll_period,
                                    error_flag,
                                )?)
                            ),
                        )+
                    },
                    None => {
                        let found = crate::registers::ChipId::default().read(port.as_ref())?;
                        $(
                            if found == $module::Device::CHIP_ID {
                                return Ok(Device::[<$module:camel>]($module::Device::attach(
                                    port,
                                    lines,
                                    $module::Device::PROPERTIES.default_configuration.clone(),
                                    poll_period,
                                    error_flag,
                                )?));
                            }
                        )+
                        Err(Error::UnknownChip(found))
                    }
                }
            }

            #[derive(Debug, serde::Serialize)]
            pub enum Properties {
                $(
                    #[serde(rename = "" $module)]
                    [<$module:camel>](<$module::Device as Chip>::Properties),
                )+
            }

            impl Device {
                pub fn name(&self) -> &'static str {
                    match self {
                        $(
                            Self::[<$module:camel>](_) => $module::Device::PROPERTIES.name,
                        )+
                    }
                }

                pub fn properties(&self) -> Properties {
                    match self {
                        $(
                            Self::[<$module:camel>](_) => Properties::[<$module:camel>]($module::Device::PROPERTIES),
                        )+
                    }
                }

                pub fn status(&self) -> link::StatusSnapshot {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.status(),
                        )+
                    }
                }

                pub fn state(&self) -> link::LinkState {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.state(),
                        )+
                    }
                }

                pub fn handle_interrupt(&self) -> Result<dispatch::Causes, bus::Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.handle_interrupt(),
                        )+
                    }
                }

                pub fn write_edid(&self, blocks: &[u8]) -> Result<(), edid::Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.write_edid(blocks),
                        )+
                    }
                }

                pub fn read_edid(
                    &self,
                    start_block: usize,
                    count: usize,
                ) -> Result<Vec<u8>, edid::Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.read_edid(start_block, count),
                        )+
                    }
                }

                pub fn edid_blocks_written(&self) -> usize {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => device.edid_blocks_written(),
                        )+
                    }
                }

                pub fn update_configuration(&self, configuration: Configuration) -> Result<(), Error> {
                    match self {
                        $(
                            Self::[<$module:camel>](device) => match configuration {
                                Configuration::[<$module:camel>](configuration) => {
                                    device.update_configuration(configuration);
                                    Ok(())
                                },
                                configuration => Err(Error::UpdateMismatch {
                                    configuration: configuration.type_name().to_owned(),
                                    device: $module::Device::PROPERTIES.name.to_owned(),
                                })
                            },
                        )+
                    }
                }
            }

            #[derive(Debug, PartialEq, Eq)]
            pub struct ParseTypeError {
                on: String
            }

            impl std::fmt::Display for ParseTypeError {
                fn fmt(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                    write!(formatter, "unknown device type \"{}\"", self.on)
                }
            }

            impl std::str::FromStr for Type {
                type Err = ParseTypeError;

                fn from_str(string: &str) -> Result<Self, Self::Err> {
                    match string {
                        $(
                            stringify!($module) => paste::paste! {Ok(Self::[<$module:camel>])},
                        )+
                        _ => Err(Self::Err {on: string.to_owned()}),
                    }
                }
            }

            #[derive(thiserror::Error, Debug, Clone)]
            pub enum Error {
                #[error(transparent)]
                Bus(#[from] bus::Error),

                #[error("no supported bridge responded (chip id {0:#010x})")]
                UnknownChip(u32),

                #[error("configuration for {configuration:?} is not compatible with device {device:?}")]
                UpdateMismatch {
                    configuration: String,
                    device: String,
                },

                $(
                    #[error(transparent)]
                    [<$module:camel>](#[from] $module::Error),
                )+
            }
        }
    };
}

register! { bx7310a, bx7310b }

use crate::link;

#[derive(Debug, serde::Serialize)]
pub struct Bridge<Configuration> {
    pub name: &'static str,
    pub chip_id: u32,
    pub max_lanes: u8,
    pub timings: link::Timings,
    pub default_configuration: Configuration,
}

//! Demand ports.
use crate::id::PortID;
use crate::input::read_csv;
use crate::vessel::VesselSize;
use anyhow::{ensure, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const PORTS_FILE_NAME: &str = "ports.csv";

/// A map of [`Port`]s, keyed by port ID
pub type PortMap = IndexMap<PortID, Port>;

/// A port with fuel demand to be satisfied by the distribution plan.
#[derive(PartialEq, Debug, Clone, Deserialize)]
pub struct Port {
    /// Unique identifier for the port (e.g. "port1216")
    pub id: PortID,
    /// Human-readable port name (e.g. "Southampton_UK")
    pub name: String,
    /// Latitude of the port in decimal degrees
    pub latitude: f64,
    /// Longitude of the port in decimal degrees
    pub longitude: f64,
    /// The largest vessel class this port can berth.
    ///
    /// Classes are ordered by size, so a port admitting a large class admits
    /// every smaller one too.
    #[serde(default = "VesselSize::largest")]
    pub max_class: VesselSize,
}

impl Port {
    /// Whether vessels of the given size can call at this port
    pub fn admits(&self, size: VesselSize) -> bool {
        size <= self.max_class
    }
}

/// Read the ports file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model input files
pub fn read_ports(model_dir: &Path) -> Result<PortMap> {
    let file_path = model_dir.join(PORTS_FILE_NAME);
    let ports: Vec<Port> = read_csv(&file_path)?;

    let mut map = PortMap::new();
    for port in ports {
        let id = port.id.clone();
        ensure!(map.insert(id.clone(), port).is_none(), "Duplicate port ID {id}");
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits() {
        let port = Port {
            id: "port1".into(),
            name: "Smallville".into(),
            latitude: 0.0,
            longitude: 0.0,
            max_class: VesselSize::Small,
        };
        assert!(port.admits(VesselSize::Small));
        assert!(!port.admits(VesselSize::Large));
    }
}

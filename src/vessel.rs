//! Vessel classes available for offshore transport.
//!
//! The fleet is fixed: a small ship type and a large one. Which classes are
//! actually used is a declared capability decided once, before the solve
//! (see [`crate::fixing`]); nothing downstream re-checks it.
use crate::id::VesselClassID;
use indexmap::IndexMap;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// A map of [`VesselClass`]es, keyed by class ID
pub type VesselClassMap = IndexMap<VesselClassID, VesselClass>;

/// Size category of a vessel class.
///
/// Ordered by size so that port admissibility can be expressed as "largest
/// class this port can berth".
#[derive(
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Clone,
    Copy,
    Debug,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
)]
pub enum VesselSize {
    /// Small ship type (Handysize-class carrier)
    #[string = "small"]
    Small,
    /// Large ship type (Panamax-class carrier)
    #[string = "large"]
    Large,
}

impl VesselSize {
    /// The largest size in the fleet; default admissibility for ports.
    pub fn largest() -> Self {
        Self::Large
    }
}

/// A class of ammonia carrier with its own transport cost surface.
#[derive(PartialEq, Debug, Clone)]
pub struct VesselClass {
    /// Unique identifier for the vessel class (e.g. "panamax")
    pub id: VesselClassID,
    /// Human-readable description
    pub description: String,
    /// Size category, used for port admissibility
    pub size: VesselSize,
    /// Whether routes are created for this class at all
    pub enabled: bool,
}

/// The two-ship fleet the cost surfaces are provided for.
pub fn standard_fleet() -> VesselClassMap {
    [
        VesselClass {
            id: "handysize".into(),
            description: "Large Handysize carrier".into(),
            size: VesselSize::Small,
            enabled: true,
        },
        VesselClass {
            id: "panamax".into(),
            description: "Panamax carrier".into(),
            size: VesselSize::Large,
            enabled: true,
        },
    ]
    .into_iter()
    .map(|class| (class.id.clone(), class))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_ordering() {
        assert!(VesselSize::Small < VesselSize::Large);
    }

    #[test]
    fn test_standard_fleet() {
        let fleet = standard_fleet();
        assert_eq!(fleet.len(), 2);
        assert!(fleet.values().all(|class| class.enabled));
    }
}

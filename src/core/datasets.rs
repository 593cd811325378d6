use serde::{Deserialize, Serialize};

/// Interferogram dataset families, reference family first
pub const IFGRAM_DATASET_NAMES: &[&str] = &[
    "unwrapPhase",
    "coherence",
    "connectComponent",
    "wrapPhase",
    "iono",
    "rangeOffset",
    "azimuthOffset",
];

/// Geometry layers, reference layer first
pub const GEOMETRY_DATASET_NAMES: &[&str] = &[
    "height",
    "latitude",
    "longitude",
    "rangeCoord",
    "azimuthCoord",
    "incidenceAngle",
    "headingAngle",
    "slantRangeDistance",
    "shadowMask",
    "waterMask",
    "commonMask",
    "bperp",
];

const QUALITY_DATASET_NAMES: &[&str] = &["coherence", "connectComponent"];

/// Family whose file supplies size, baseline and metadata of a pair
pub const PAIR_REFERENCE_FAMILY: &str = "unwrapPhase";

/// Layer whose file supplies size and metadata of a geometry record
pub const GEOMETRY_REFERENCE_FAMILY: &str = "height";

/// Logical category of a dataset family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetCategory {
    Observation,
    Quality,
    Geometry,
}

impl DatasetCategory {
    /// Category of a family name; unknown names are observations
    pub fn of(family: &str) -> Self {
        if QUALITY_DATASET_NAMES.contains(&family) {
            DatasetCategory::Quality
        } else if GEOMETRY_DATASET_NAMES.contains(&family) {
            DatasetCategory::Geometry
        } else {
            DatasetCategory::Observation
        }
    }
}

/// Boolean element type for these families
pub fn is_bool_family(family: &str) -> bool {
    family == "connectComponent"
}

/// Boolean element type for geometry layers named `*mask`
pub fn is_mask_layer(layer: &str) -> bool {
    layer.to_lowercase().ends_with("mask")
}

//! Pair and geometry records, processor inference and container assembly

pub mod datasets;
pub mod processor;
pub mod utils;
pub mod pair;
pub mod geometry;
pub mod stack;
pub mod platform_track;

// Re-export main types
pub use datasets::{DatasetCategory, GEOMETRY_DATASET_NAMES, IFGRAM_DATASET_NAMES};
pub use processor::{infer_processor, Processor, ProcessorProbe, GEOMETRY_PROBES, PAIR_PROBES};
pub use pair::{MetadataOverrides, PairMetadata, PairRecord};
pub use geometry::{GeometryAssembler, GeometryParams, GeometryRecord};
pub use stack::{StackAssembler, StackParams};
pub use platform_track::{partition_by_platform_track, DatasetNames, PlatformTrackGroup};

//! I/O modules for reading rasters and writing containers

pub mod sidecar;
pub mod readfile;
pub mod writefile;
pub mod container;
#[cfg(feature = "gdal")]
pub mod gdal_reader;

pub use readfile::{RasterReader, SidecarReader};
pub use writefile::write_raster;
pub use container::{ArrayValues, Dtype, H5Container};
#[cfg(feature = "gdal")]
pub use gdal_reader::GdalReader;

use crate::io::readfile::RasterReader;
use crate::types::{Attributes, PixelBox, Raster, StackError, StackResult};
use gdal::Dataset;
use std::path::Path;

/// Reader for GDAL-readable rasters such as GMTSAR `.grd` grids
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalReader;

impl GdalReader {
    pub fn new() -> Self {
        Self
    }

    fn attributes(dataset: &Dataset) -> StackResult<Attributes> {
        let (width, height) = dataset.raster_size();
        let mut attrs = Attributes::new();
        attrs.insert("LENGTH".to_string(), height.to_string());
        attrs.insert("WIDTH".to_string(), width.to_string());

        // identity transform means no georeferencing
        if let Ok(gt) = dataset.geo_transform() {
            if gt != [0.0, 1.0, 0.0, 0.0, 0.0, 1.0] {
                attrs.insert("X_FIRST".to_string(), gt[0].to_string());
                attrs.insert("X_STEP".to_string(), gt[1].to_string());
                attrs.insert("Y_FIRST".to_string(), gt[3].to_string());
                attrs.insert("Y_STEP".to_string(), gt[5].to_string());
            }
        }
        Ok(attrs)
    }
}

impl RasterReader for GdalReader {
    fn read(
        &self,
        path: &Path,
        _epoch: Option<&str>,
        subset: Option<&PixelBox>,
    ) -> StackResult<(Raster, Attributes)> {
        log::debug!("Reading {} with GDAL", path.display());
        let dataset = Dataset::open(path)?;
        let attrs = Self::attributes(&dataset)?;
        let (width, height) = dataset.raster_size();

        let region = match subset {
            Some(b) => {
                b.check_within(height, width)?;
                *b
            }
            None => PixelBox { x0: 0, y0: 0, x1: width, y1: height },
        };
        let (rows, cols) = region.size();

        let band = dataset.rasterband(1)?;
        let buffer = band.read_as::<f32>(
            (region.x0 as isize, region.y0 as isize),
            (cols, rows),
            (cols, rows),
            None,
        )?;
        let raster = Raster::from_shape_vec((rows, cols), buffer.data)
            .map_err(|e| StackError::InvalidFormat(format!("Failed to reshape GDAL raster: {}", e)))?;
        Ok((raster, attrs))
    }

    fn read_attribute(&self, path: &Path) -> StackResult<Attributes> {
        let dataset = Dataset::open(path)?;
        Self::attributes(&dataset)
    }
}

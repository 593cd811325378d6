use crate::core::datasets::{is_mask_layer, GEOMETRY_REFERENCE_FAMILY};
use crate::core::processor::{infer_processor, Processor, GEOMETRY_PROBES};
use crate::core::utils::{incidence_angle, is_geocoded, slant_range_distance, subset_attributes};
use crate::io::container::{ArrayValues, Dtype, H5Container};
use crate::io::readfile::{RasterReader, SidecarReader};
use crate::types::{
    attr_usize, AccessMode, Attributes, FloatType, PixelBox, PlatformTrack, Raster, StackError, StackResult,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Static geometry layers of one platform/track
#[derive(Clone)]
pub struct GeometryRecord {
    datasets: IndexMap<String, PathBuf>,
    processor: Option<Processor>,
    platform_track: PlatformTrack,
    ifgram_metadata: Option<Attributes>,
    metadata: Option<Attributes>,
    reader: Arc<dyn RasterReader>,
}

impl std::fmt::Debug for GeometryRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeometryRecord")
            .field("datasets", &self.datasets)
            .field("processor", &self.processor)
            .field("platform_track", &self.platform_track)
            .finish()
    }
}

impl GeometryRecord {
    pub fn new<I, K, P>(datasets: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            datasets: datasets.into_iter().map(|(k, p)| (k.into(), p.into())).collect(),
            processor: None,
            platform_track: PlatformTrack::default(),
            ifgram_metadata: None,
            metadata: None,
            reader: Arc::new(SidecarReader),
        }
    }

    pub fn with_processor(mut self, processor: Processor) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn with_platform_track(mut self, platform_track: PlatformTrack) -> Self {
        self.platform_track = platform_track;
        self
    }

    /// Attach the attribute set of a companion interferogram, used to derive
    /// incidence angle and slant range distance in radar coordinates
    pub fn with_ifgram_metadata(mut self, metadata: Attributes) -> Self {
        self.ifgram_metadata = Some(metadata);
        self
    }

    pub fn with_reader(mut self, reader: Arc<dyn RasterReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn datasets(&self) -> &IndexMap<String, PathBuf> {
        &self.datasets
    }

    pub fn processor(&self) -> Option<Processor> {
        self.processor
    }

    pub fn platform_track(&self) -> &PlatformTrack {
        &self.platform_track
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Layer supplying size and metadata: `height`, or the first registered layer
    pub fn reference_family(&self) -> Option<&str> {
        if self.datasets.contains_key(GEOMETRY_REFERENCE_FAMILY) {
            Some(GEOMETRY_REFERENCE_FAMILY)
        } else {
            self.datasets.keys().next().map(String::as_str)
        }
    }

    fn path(&self, family: &str) -> StackResult<&Path> {
        self.datasets
            .get(family)
            .map(PathBuf::as_path)
            .ok_or_else(|| StackError::DatasetNotFound {
                family: family.to_string(),
                owner: format!("geometry {}", self.platform_track),
            })
    }

    fn reference_path(&self) -> StackResult<PathBuf> {
        let family = self.reference_family().unwrap_or(GEOMETRY_REFERENCE_FAMILY);
        self.path(family).map(Path::to_path_buf)
    }

    /// `(length, width)` of the container layers; a subset box takes precedence
    pub fn size(&self, subset: Option<&PixelBox>) -> StackResult<(usize, usize)> {
        if let Some(b) = subset {
            return Ok(b.size());
        }
        let path = self.reference_path()?;
        let attrs = self.reader.read_attribute(&path)?;
        Ok((attr_usize(&attrs, "LENGTH", &path)?, attr_usize(&attrs, "WIDTH", &path)?))
    }

    fn derivation_source(&self) -> Option<&Attributes> {
        self.ifgram_metadata.as_ref().filter(|m| !m.is_empty() && !is_geocoded(m))
    }

    /// Slant range distance from the interferogram metadata, `None` if unavailable or geocoded
    pub fn derived_slant_range_distance(&self, subset: Option<&PixelBox>) -> StackResult<Option<Raster>> {
        match self.derivation_source() {
            Some(meta) => slant_range_distance(meta, subset),
            None => Ok(None),
        }
    }

    /// Incidence angle from the interferogram metadata, `None` if unavailable or geocoded
    pub fn derived_incidence_angle(&self, subset: Option<&PixelBox>) -> StackResult<Option<Raster>> {
        match self.derivation_source() {
            Some(meta) => incidence_angle(meta, subset),
            None => Ok(None),
        }
    }

    /// Attribute set of the reference layer with PROCESSOR injected
    pub fn metadata(&mut self) -> StackResult<Attributes> {
        if let Some(attrs) = &self.metadata {
            return Ok(attrs.clone());
        }
        let path = self.reference_path()?;
        let mut attrs = self.reader.read_attribute(&path)?;
        attr_usize(&attrs, "LENGTH", &path)?;
        attr_usize(&attrs, "WIDTH", &path)?;

        let processor = *self
            .processor
            .get_or_insert_with(|| infer_processor(GEOMETRY_PROBES, &path, &attrs));
        attrs.insert("PROCESSOR".to_string(), processor.label().to_string());

        self.metadata = Some(attrs.clone());
        Ok(attrs)
    }

    /// Read one layer; `family` also selects the band of multiplexed files
    pub fn read_dataset(&self, family: &str, subset: Option<&PixelBox>) -> StackResult<(Raster, Attributes)> {
        let path = self.path(family)?;
        self.reader
            .read(path, Some(family), subset)
            .map_err(|e| StackError::Read {
                family: family.to_string(),
                path: path.to_path_buf(),
                source: Box::new(e),
            })
    }
}

/// Geometry container parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryParams {
    /// Root group name
    pub name: String,
    pub access_mode: AccessMode,
    pub subset: Option<PixelBox>,
    /// Element type of non-mask layers
    pub data_type: FloatType,
}

impl Default for GeometryParams {
    fn default() -> Self {
        Self {
            name: "geometry".to_string(),
            access_mode: AccessMode::Create,
            subset: None,
            data_type: FloatType::Float32,
        }
    }
}

/// Writes one geometry record into a geometry container
pub struct GeometryAssembler {
    params: GeometryParams,
}

impl GeometryAssembler {
    pub fn new(params: GeometryParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(GeometryParams::default())
    }

    pub fn params(&self) -> &GeometryParams {
        &self.params
    }

    /// Write `record` to `output`.
    ///
    /// Returns `Ok(None)` without creating anything when the record has no layers.
    pub fn write<P: AsRef<Path>>(&self, record: &mut GeometryRecord, output: P) -> StackResult<Option<PathBuf>> {
        if record.is_empty() {
            log::info!("No dataset file path in geometry {}, skip writing", record.platform_track());
            return Ok(None);
        }
        let output = output.as_ref();
        let group = self.params.name.as_str();
        let subset = self.params.subset.as_ref();
        let shape = record.size(subset)?;
        let float = Dtype::from(self.params.data_type);

        let mut container = H5Container::open(output, self.params.access_mode)?;
        container.require_group(group)?;

        let names: Vec<String> = record.datasets().keys().cloned().collect();
        let max_digit = names.iter().map(String::len).max().unwrap_or(0);

        for name in &names {
            let dtype = if is_mask_layer(name) { Dtype::Bool } else { float };
            log::info!(
                "create dataset /{}/{:<w$} of {} in size of {:?}",
                group,
                name,
                dtype,
                shape,
                w = max_digit
            );
            let (data, _) = record.read_dataset(name, subset)?;
            check_shape(&data, shape, name, record)?;
            write_layer(&mut container, group, name, dtype, &data)?;
        }

        let derived: [(&str, fn(&GeometryRecord, Option<&PixelBox>) -> StackResult<Option<Raster>>); 2] = [
            ("incidenceAngle", GeometryRecord::derived_incidence_angle),
            ("slantRangeDistance", GeometryRecord::derived_slant_range_distance),
        ];
        for (name, derive) in derived {
            if names.iter().any(|n| n == name) {
                continue;
            }
            if let Some(data) = derive(record, subset)? {
                log::info!("create dataset /{}/{} of {} in size of {:?}", group, name, float, shape);
                check_shape(&data, shape, name, record)?;
                write_layer(&mut container, group, name, float, &data)?;
            }
        }

        let metadata = subset_attributes(&record.metadata()?, subset)?;
        container.set_attributes(group, &metadata)?;
        container.close()?;

        log::info!("Finished writing to {}", output.display());
        Ok(Some(output.to_path_buf()))
    }
}

fn check_shape(data: &Raster, expected: (usize, usize), name: &str, record: &GeometryRecord) -> StackResult<()> {
    if data.dim() != expected {
        return Err(StackError::ShapeMismatch {
            family: name.to_string(),
            owner: format!("geometry {}", record.platform_track()),
            expected,
            found: data.dim(),
        });
    }
    Ok(())
}

fn write_layer(container: &mut H5Container, group: &str, name: &str, dtype: Dtype, data: &Raster) -> StackResult<()> {
    let (length, width) = data.dim();
    container.require_dataset(group, name, &[length, width], length, dtype)?;
    container.write(group, name, 0, ArrayValues::Float(data.view().into_dyn()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::writefile::write_raster;
    use ndarray::Array2;
    use tempfile::TempDir;

    #[test]
    fn test_size_prefers_box() {
        let dir = TempDir::new().unwrap();
        let hgt = dir.path().join("hgt.rdr");
        write_raster(&hgt, &Array2::zeros((10, 12)), &Attributes::new()).unwrap();
        let record = GeometryRecord::new([("height", hgt)]);
        assert_eq!(record.size(None).unwrap(), (10, 12));
        let subset = PixelBox::new(2, 3, 7, 5).unwrap();
        assert_eq!(record.size(Some(&subset)).unwrap(), (2, 5));
    }

    #[test]
    fn test_derived_layers_need_radar_metadata() {
        let record = GeometryRecord::new(Vec::<(String, PathBuf)>::new());
        assert!(record.derived_incidence_angle(None).unwrap().is_none());

        let mut meta = Attributes::new();
        meta.insert("LENGTH".into(), "3".into());
        meta.insert("WIDTH".into(), "4".into());
        meta.insert("STARTING_RANGE".into(), "850000".into());
        meta.insert("RANGE_PIXEL_SIZE".into(), "2.3".into());
        let record = GeometryRecord::new(Vec::<(String, PathBuf)>::new()).with_ifgram_metadata(meta.clone());
        let srd = record.derived_slant_range_distance(None).unwrap().unwrap();
        assert_eq!(srd.dim(), (3, 4));
        // incidence angle needs EARTH_RADIUS and HEIGHT
        assert!(matches!(
            record.derived_incidence_angle(None),
            Err(StackError::MissingAttribute { .. })
        ));

        meta.insert("X_FIRST".into(), "-118.0".into());
        let record = GeometryRecord::new(Vec::<(String, PathBuf)>::new()).with_ifgram_metadata(meta);
        assert!(record.derived_slant_range_distance(None).unwrap().is_none());
        assert!(record.derived_incidence_angle(None).unwrap().is_none());
    }

    #[test]
    fn test_metadata_prefers_processor_attribute() {
        let dir = TempDir::new().unwrap();
        let hgt = dir.path().join("hgt.rdr");
        let mut attrs = Attributes::new();
        attrs.insert("PROCESSOR".into(), "gamma".into());
        write_raster(&hgt, &Array2::zeros((2, 2)), &attrs).unwrap();
        let mut record = GeometryRecord::new([("height", hgt)]);
        assert_eq!(record.metadata().unwrap()["PROCESSOR"], "gamma");
        assert_eq!(record.processor(), Some(Processor::Gamma));
    }
}

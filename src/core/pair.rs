use crate::core::datasets::{DatasetCategory, PAIR_REFERENCE_FAMILY};
use crate::core::processor::{infer_processor, Processor, PAIR_PROBES};
use crate::io::readfile::{RasterReader, SidecarReader};
use crate::types::{
    attr_f64, attr_usize, Attributes, DatePair, PixelBox, PlatformTrack, Raster, StackError, StackResult,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Caller-supplied values that take precedence over anything read from files
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataOverrides {
    pub processor: Option<Processor>,
    pub platform: Option<String>,
    pub track: Option<String>,
}

/// Known per-pair metadata, derived lazily from the reference family
#[derive(Debug, Clone, PartialEq)]
pub struct PairMetadata {
    pub length: usize,
    pub width: usize,
    pub processor: Processor,
    pub platform: Option<String>,
    pub track: Option<String>,
    /// Everything else the reference file carries, plus the injected tags
    pub attributes: Attributes,
}

/// One interferometric pair: its named raster files and derived metadata
#[derive(Clone)]
pub struct PairRecord {
    dates: DatePair,
    datasets: IndexMap<String, PathBuf>,
    platform: Option<String>,
    track: Option<String>,
    processor: Option<Processor>,
    reader: Arc<dyn RasterReader>,
    size: Option<(usize, usize)>,
    bperp: Option<f64>,
    metadata: HashMap<String, Attributes>,
}

impl std::fmt::Debug for PairRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PairRecord")
            .field("dates", &self.dates)
            .field("datasets", &self.datasets)
            .field("platform", &self.platform)
            .field("track", &self.track)
            .field("processor", &self.processor)
            .finish()
    }
}

impl PairRecord {
    /// Create a pair from its family → file registrations, in registration order
    pub fn new<I, K, P>(dates: DatePair, datasets: I) -> Self
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<String>,
        P: Into<PathBuf>,
    {
        Self {
            dates,
            datasets: datasets.into_iter().map(|(k, p)| (k.into(), p.into())).collect(),
            platform: None,
            track: None,
            processor: None,
            reader: Arc::new(SidecarReader),
            size: None,
            bperp: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: MetadataOverrides) -> Self {
        self.processor = overrides.processor.or(self.processor);
        self.platform = overrides.platform.or(self.platform);
        self.track = overrides.track.or(self.track);
        self
    }

    /// Read rasters through `reader` instead of the sidecar reader
    pub fn with_reader(mut self, reader: Arc<dyn RasterReader>) -> Self {
        self.reader = reader;
        self
    }

    pub fn dates(&self) -> DatePair {
        self.dates
    }

    pub fn datasets(&self) -> &IndexMap<String, PathBuf> {
        &self.datasets
    }

    /// Registered families of one category, in registration order
    pub fn families(&self, category: DatasetCategory) -> Vec<String> {
        self.datasets
            .keys()
            .filter(|name| DatasetCategory::of(name) == category)
            .cloned()
            .collect()
    }

    pub fn has_family(&self, family: &str) -> bool {
        self.datasets.contains_key(family)
    }

    pub fn processor(&self) -> Option<Processor> {
        self.processor
    }

    pub fn platform_track(&self) -> PlatformTrack {
        PlatformTrack {
            platform: self.platform.clone(),
            track: self.track.clone(),
        }
    }

    pub fn reader(&self) -> Arc<dyn RasterReader> {
        Arc::clone(&self.reader)
    }

    /// File registered for `family`
    pub fn path(&self, family: &str) -> StackResult<&Path> {
        self.datasets
            .get(family)
            .map(PathBuf::as_path)
            .ok_or_else(|| StackError::DatasetNotFound {
                family: family.to_string(),
                owner: format!("pair {}", self.dates),
            })
    }

    /// `(length, width)` of the reference family raster
    pub fn size(&mut self) -> StackResult<(usize, usize)> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let path = self.path(PAIR_REFERENCE_FAMILY)?.to_path_buf();
        let attrs = self.reader.read_attribute(&path)?;
        let size = (attr_usize(&attrs, "LENGTH", &path)?, attr_usize(&attrs, "WIDTH", &path)?);
        self.size = Some(size);
        Ok(size)
    }

    /// Mean of top and bottom perpendicular baseline of the reference family
    pub fn perpendicular_baseline(&mut self) -> StackResult<f64> {
        if let Some(bperp) = self.bperp {
            return Ok(bperp);
        }
        let path = self.path(PAIR_REFERENCE_FAMILY)?.to_path_buf();
        let attrs = self.reader.read_attribute(&path)?;
        let top = attr_f64(&attrs, "P_BASELINE_TOP_HDR", &path)?;
        let bottom = attr_f64(&attrs, "P_BASELINE_BOTTOM_HDR", &path)?;
        let bperp = (top + bottom) / 2.0;
        self.bperp = Some(bperp);
        Ok(bperp)
    }

    /// Attribute set of the reference family with PROCESSOR, TRACK and PLATFORM injected
    pub fn metadata(&mut self) -> StackResult<Attributes> {
        self.metadata_of(PAIR_REFERENCE_FAMILY)
    }

    /// Attribute set of `family`'s file.
    ///
    /// Infers the processor on first call unless it was overridden. The
    /// injected tags live only in the record's cached copy.
    pub fn metadata_of(&mut self, family: &str) -> StackResult<Attributes> {
        if let Some(attrs) = self.metadata.get(family) {
            return Ok(attrs.clone());
        }
        let path = self.path(family)?.to_path_buf();
        let mut attrs = self.reader.read_attribute(&path)?;
        let length = attr_usize(&attrs, "LENGTH", &path)?;
        let width = attr_usize(&attrs, "WIDTH", &path)?;
        if family == PAIR_REFERENCE_FAMILY {
            self.size = Some((length, width));
        }

        let processor = *self
            .processor
            .get_or_insert_with(|| infer_processor(PAIR_PROBES, &path, &attrs));
        attrs.insert("PROCESSOR".to_string(), processor.label().to_string());
        if let Some(track) = &self.track {
            attrs.insert("TRACK".to_string(), track.clone());
        }
        if let Some(platform) = &self.platform {
            attrs.insert("PLATFORM".to_string(), platform.clone());
        }

        self.metadata.insert(family.to_string(), attrs.clone());
        Ok(attrs)
    }

    /// Typed view of the reference metadata
    pub fn pair_metadata(&mut self) -> StackResult<PairMetadata> {
        let attributes = self.metadata()?;
        let (length, width) = self.size()?;
        Ok(PairMetadata {
            length,
            width,
            processor: self.processor.unwrap_or(Processor::DEFAULT),
            platform: self.platform.clone(),
            track: self.track.clone(),
            attributes,
        })
    }

    /// Read the raster registered for `family`, optionally restricted to `subset`
    pub fn read_dataset(&self, family: &str, subset: Option<&PixelBox>) -> StackResult<(Raster, Attributes)> {
        let path = self.path(family)?;
        self.reader
            .read(path, None, subset)
            .map_err(|e| StackError::Read {
                family: family.to_string(),
                path: path.to_path_buf(),
                source: Box::new(e),
            })
    }
}

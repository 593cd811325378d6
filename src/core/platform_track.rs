use crate::core::datasets::DatasetCategory;
use crate::core::geometry::GeometryRecord;
use crate::core::pair::PairRecord;
use crate::core::utils::median;
use crate::types::{attr_usize, DatePair, PlatformTrack, StackError, StackResult};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::path::PathBuf;

/// Dataset names reconciled across the pairs of one platform/track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetNames {
    /// From the first pair
    pub observation: Vec<String>,
    /// From the first pair
    pub quality: Vec<String>,
    /// Union over all pairs, in order of first appearance
    pub geometry: Vec<String>,
}

/// The pairs of one platform/track, ready for stack assembly
#[derive(Debug, Clone)]
pub struct PlatformTrackGroup {
    label: PlatformTrack,
    pairs: Vec<PairRecord>,
}

/// Split `pairs` into one group per distinct platform/track, in order of first appearance.
///
/// Pair order inside each group follows the input order.
pub fn partition_by_platform_track(pairs: Vec<PairRecord>) -> Vec<PlatformTrackGroup> {
    let mut groups: IndexMap<PlatformTrack, Vec<PairRecord>> = IndexMap::new();
    for pair in pairs {
        groups.entry(pair.platform_track()).or_default().push(pair);
    }
    groups
        .into_iter()
        .map(|(label, pairs)| {
            log::info!("Platform/track {}: {} pairs", label, pairs.len());
            PlatformTrackGroup { label, pairs }
        })
        .collect()
}

impl PlatformTrackGroup {
    /// Pairs of `pairs` tagged with `label`
    pub fn from_pairs(pairs: &[PairRecord], label: &PlatformTrack) -> Self {
        Self {
            label: label.clone(),
            pairs: pairs
                .iter()
                .filter(|pair| &pair.platform_track() == label)
                .cloned()
                .collect(),
        }
    }

    pub fn label(&self) -> &PlatformTrack {
        &self.label
    }

    pub fn pairs(&self) -> &[PairRecord] {
        &self.pairs
    }

    pub fn pairs_mut(&mut self) -> &mut [PairRecord] {
        &mut self.pairs
    }

    pub fn into_pairs(self) -> Vec<PairRecord> {
        self.pairs
    }

    pub fn num_pairs(&self) -> usize {
        self.pairs.len()
    }

    fn sizes(&mut self) -> StackResult<Vec<(usize, usize)>> {
        self.pairs.iter_mut().map(PairRecord::size).collect()
    }

    /// Median `(length, width)` over all member pairs.
    ///
    /// Pairs disagreeing on size are tolerated and reported as a warning.
    pub fn size(&mut self) -> StackResult<(usize, usize)> {
        let sizes = self.sizes()?;
        let size = median_size(&sizes).ok_or_else(|| StackError::EmptyStack(self.label.to_string()))?;
        if sizes.iter().any(|s| *s != sizes[0]) {
            let err = StackError::InconsistentGeometry {
                group: self.label.to_string(),
                sizes,
            };
            log::warn!("{}, using median size {:?}", err, size);
        }
        Ok(size)
    }

    /// Like [`size`](Self::size), but fails when the member pairs disagree
    pub fn check_consistent_size(&mut self) -> StackResult<(usize, usize)> {
        let sizes = self.sizes()?;
        match sizes.first() {
            None => Err(StackError::EmptyStack(self.label.to_string())),
            Some(first) if sizes.iter().all(|s| s == first) => Ok(*first),
            Some(_) => Err(StackError::InconsistentGeometry {
                group: self.label.to_string(),
                sizes,
            }),
        }
    }

    /// Median size of `family` over the pairs registering it.
    ///
    /// Pairs sharing one file, or whose raster is empty, count once or not at all.
    /// Returns the contributing pairs alongside the size.
    pub fn size_for_family(&mut self, family: &str) -> StackResult<(Vec<DatePair>, usize, usize)> {
        let mut files: HashSet<PathBuf> = HashSet::new();
        let mut contributing = Vec::new();
        let mut sizes = Vec::new();

        for pair in self.pairs.iter_mut().filter(|p| p.has_family(family)) {
            let path = pair.path(family)?.to_path_buf();
            let attrs = pair.metadata_of(family)?;
            let length = attr_usize(&attrs, "LENGTH", &path)?;
            let width = attr_usize(&attrs, "WIDTH", &path)?;
            if length == 0 || !files.insert(path) {
                continue;
            }
            contributing.push(pair.dates());
            sizes.push((length, width));
        }

        let (length, width) = median_size(&sizes).ok_or_else(|| StackError::DatasetNotFound {
            family: family.to_string(),
            owner: format!("platform/track {}", self.label),
        })?;
        Ok((contributing, length, width))
    }

    /// Observation and quality names of the first pair; geometry names across all pairs
    pub fn dataset_names(&self) -> DatasetNames {
        let Some(first) = self.pairs.first() else {
            return DatasetNames::default();
        };
        let mut geometry: Vec<String> = Vec::new();
        for pair in &self.pairs {
            for name in pair.families(DatasetCategory::Geometry) {
                if !geometry.contains(&name) {
                    geometry.push(name);
                }
            }
        }
        DatasetNames {
            observation: first.families(DatasetCategory::Observation),
            quality: first.families(DatasetCategory::Quality),
            geometry,
        }
    }

    /// Geometry record of this platform/track.
    ///
    /// Each layer comes from the first pair registering it; the first pair's
    /// reference metadata drives derived layers.
    pub fn geometry_record(&mut self) -> StackResult<GeometryRecord> {
        let names = self.dataset_names();
        let mut layers: Vec<(String, PathBuf)> = Vec::with_capacity(names.geometry.len());
        for name in names.geometry {
            if let Some(pair) = self.pairs.iter().find(|p| p.has_family(&name)) {
                let path = pair.path(&name)?.to_path_buf();
                layers.push((name, path));
            }
        }

        let mut record = GeometryRecord::new(layers).with_platform_track(self.label.clone());
        if let Some(first) = self.pairs.first_mut() {
            record = record.with_ifgram_metadata(first.metadata()?).with_reader(first.reader());
        }
        Ok(record)
    }
}

fn median_size(sizes: &[(usize, usize)]) -> Option<(usize, usize)> {
    let lengths: Vec<usize> = sizes.iter().map(|s| s.0).collect();
    let widths: Vec<usize> = sizes.iter().map(|s| s.1).collect();
    Some((median(&lengths)?, median(&widths)?))
}

use crate::core::datasets::{is_bool_family, DatasetCategory};
use crate::core::pair::PairRecord;
use crate::core::utils::subset_attributes;
use crate::io::container::{ArrayValues, Dtype, H5Container};
use crate::types::{AccessMode, FloatType, PixelBox, StackError, StackResult};
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Rows per chunk of the 1-D and date datasets
const VECTOR_CHUNK: usize = 128;

/// Per-pair datasets written next to the families
const PAIR_DATASETS: [&str; 3] = ["date", "bperp", "dropIfgram"];

/// Interferogram stack container parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackParams {
    /// Root group name
    pub name: String,
    pub access_mode: AccessMode,
    pub subset: Option<PixelBox>,
    /// Element type of non-boolean families; `bperp` is always float32
    pub data_type: FloatType,
    pub show_progress: bool,
}

impl Default for StackParams {
    fn default() -> Self {
        Self {
            name: "ifgramStack".to_string(),
            access_mode: AccessMode::Create,
            subset: None,
            data_type: FloatType::Float32,
            show_progress: true,
        }
    }
}

/// Writes the interferograms of one platform/track into a stack container.
///
/// Layout of the root group:
///
/// ```text
/// /ifgramStack
///     attributes         metadata of the first pair, adjusted for the subset
///     /date              (m, 2) YYYYMMDD strings of master and slave dates
///     /bperp             (m,)   float32 perpendicular baseline in meters
///     /dropIfgram        (m,)   bool, true keeps the pair
///     /unwrapPhase       (m, l, w) float, radian
///     /coherence         (m, l, w) float
///     /connectComponent  (m, l, w) bool
///     ...                one (m, l, w) dataset per further family
/// ```
pub struct StackAssembler {
    params: StackParams,
}

impl StackAssembler {
    pub fn new(params: StackParams) -> Self {
        Self { params }
    }

    pub fn standard() -> Self {
        Self::new(StackParams::default())
    }

    pub fn params(&self) -> &StackParams {
        &self.params
    }

    /// Families written for `pairs`: the first pair's observation and quality
    /// families, which every other pair must register as well
    pub fn stack_families(&self, pairs: &[PairRecord]) -> StackResult<Vec<String>> {
        let first = pairs
            .first()
            .ok_or_else(|| StackError::EmptyStack(self.params.name.clone()))?;
        let families: Vec<String> = first
            .datasets()
            .keys()
            .filter(|name| DatasetCategory::of(name) != DatasetCategory::Geometry)
            .cloned()
            .collect();

        let mut seen = HashSet::new();
        for pair in pairs {
            if !seen.insert(pair.dates()) {
                return Err(StackError::DuplicatePair(pair.dates().to_string()));
            }
            if let Some(missing) = families.iter().find(|f| !pair.has_family(f)) {
                return Err(StackError::DatasetNotFound {
                    family: missing.clone(),
                    owner: format!("pair {}", pair.dates()),
                });
            }
        }
        Ok(families)
    }

    /// `(num_pairs, length, width)` of the stack
    pub fn size(&self, pairs: &mut [PairRecord]) -> StackResult<(usize, usize, usize)> {
        let num_pairs = pairs.len();
        let first = pairs
            .first_mut()
            .ok_or_else(|| StackError::EmptyStack(self.params.name.clone()))?;
        let (length, width) = match &self.params.subset {
            Some(b) => b.size(),
            None => first.size()?,
        };
        Ok((num_pairs, length, width))
    }

    /// Write `pairs`, in the given order, to `output` and return its path.
    ///
    /// Any failure aborts the whole write and leaves `output` as it was. In
    /// update mode, datasets of the root group that this write does not cover
    /// are removed so every dataset has one row per pair.
    pub fn write<P: AsRef<Path>>(&self, pairs: &mut [PairRecord], output: P) -> StackResult<PathBuf> {
        let output = output.as_ref();
        let group = self.params.name.as_str();
        let subset = self.params.subset.as_ref();

        let families = self.stack_families(pairs)?;
        let (num_pairs, length, width) = self.size(pairs)?;
        let float = Dtype::from(self.params.data_type);
        let max_digit = families.iter().map(String::len).max().unwrap_or(0);

        // metadata problems surface before the container is touched
        let mut bperp = Array1::<f32>::zeros(num_pairs);
        for (i, pair) in pairs.iter_mut().enumerate() {
            bperp[i] = pair.perpendicular_baseline()? as f32;
        }
        let metadata = subset_attributes(&pairs[0].metadata()?, subset)?;

        let mut container = H5Container::open(output, self.params.access_mode)?;
        container.require_group(group)?;
        for stale in container
            .datasets(group)?
            .into_iter()
            .filter(|name| !families.contains(name) && !PAIR_DATASETS.contains(&name.as_str()))
        {
            log::warn!("remove dataset /{}/{} not covered by this stack", group, stale);
            container.remove_dataset(group, &stale)?;
        }

        for family in &families {
            let dtype = if is_bool_family(family) { Dtype::Bool } else { float };
            let shape = [num_pairs, length, width];
            log::info!(
                "create dataset /{}/{:<w$} of {} in size of {:?}",
                group,
                family,
                dtype,
                shape,
                w = max_digit
            );
            container.require_dataset(group, family, &shape, 1, dtype)?;

            let progress = self.progress_bar(num_pairs);
            for (i, pair) in pairs.iter().enumerate() {
                let (data, _) = pair.read_dataset(family, subset)?;
                if data.dim() != (length, width) {
                    return Err(StackError::ShapeMismatch {
                        family: family.clone(),
                        owner: format!("pair {}", pair.dates()),
                        expected: (length, width),
                        found: data.dim(),
                    });
                }
                let slice = data.insert_axis(Axis(0)).into_dyn();
                container.write(group, family, i, ArrayValues::Float(slice.view()))?;
                progress.set_message(pair.dates().to_string());
                progress.inc(1);
            }
            progress.finish_and_clear();
        }

        let dates = Array2::from_shape_fn((num_pairs, 2), |(i, j)| pairs[i].dates().to_strings()[j].clone());
        log::info!("create dataset /{}/date", group);
        container.require_dataset(group, "date", &[num_pairs, 2], VECTOR_CHUNK, Dtype::Ascii8)?;
        container.write(group, "date", 0, ArrayValues::Text(dates.view().into_dyn()))?;

        log::info!("create dataset /{}/bperp", group);
        container.require_dataset(group, "bperp", &[num_pairs], VECTOR_CHUNK, Dtype::Float32)?;
        container.write(group, "bperp", 0, ArrayValues::Float(bperp.view().into_dyn()))?;

        log::info!("create dataset /{}/dropIfgram", group);
        let keep = Array1::from_elem(num_pairs, true);
        container.require_dataset(group, "dropIfgram", &[num_pairs], VECTOR_CHUNK, Dtype::Bool)?;
        container.write(group, "dropIfgram", 0, ArrayValues::Bool(keep.view().into_dyn()))?;

        container.set_attributes(group, &metadata)?;
        container.close()?;

        log::info!("Finished writing to {}", output.display());
        Ok(output.to_path_buf())
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.params.show_progress {
            return ProgressBar::hidden();
        }
        let progress = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}/{len:3} {msg}") {
            progress.set_style(style);
        }
        progress
    }
}

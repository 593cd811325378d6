//! HDF5 container holding the stack and geometry groups.
//!
//! Every container opened for writing is built in a staging file next to the
//! target. [`H5Container::close`] renames it over the target; dropping an
//! unclosed container discards it and leaves the target as it was.

use crate::types::{AccessMode, Attributes, FloatType, StackError, StackResult};
use hdf5::types::{FixedAscii, FloatSize, H5Type, TypeDescriptor, VarLenUnicode};
use hdf5::{Dataset, Extent, File, Group, SimpleExtents};
use ndarray::{s, ArrayD, ArrayViewD, Ix1, Ix2, Ix3};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;

/// Element type of a container dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Float32,
    Float64,
    Bool,
    /// Fixed-width 8-byte ASCII strings (`S8`), used for `YYYYMMDD` dates
    Ascii8,
}

impl Dtype {
    fn from_descriptor(descriptor: &TypeDescriptor) -> Option<Self> {
        match descriptor {
            TypeDescriptor::Float(FloatSize::U4) => Some(Dtype::Float32),
            TypeDescriptor::Float(FloatSize::U8) => Some(Dtype::Float64),
            TypeDescriptor::Boolean => Some(Dtype::Bool),
            TypeDescriptor::FixedAscii(8) => Some(Dtype::Ascii8),
            _ => None,
        }
    }
}

impl From<FloatType> for Dtype {
    fn from(value: FloatType) -> Self {
        match value {
            FloatType::Float32 => Dtype::Float32,
            FloatType::Float64 => Dtype::Float64,
        }
    }
}

impl std::fmt::Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dtype::Float32 => "float32",
            Dtype::Float64 => "float64",
            Dtype::Bool => "bool",
            Dtype::Ascii8 => "S8",
        };
        write!(f, "{}", name)
    }
}

/// Values handed to [`H5Container::write`]; floats are converted to the dataset type
#[derive(Debug, Clone)]
pub enum ArrayValues<'a> {
    Float(ArrayViewD<'a, f32>),
    Bool(ArrayViewD<'a, bool>),
    Text(ArrayViewD<'a, String>),
}

impl ArrayValues<'_> {
    fn shape(&self) -> &[usize] {
        match self {
            ArrayValues::Float(v) => v.shape(),
            ArrayValues::Bool(v) => v.shape(),
            ArrayValues::Text(v) => v.shape(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ArrayValues::Float(_) => "float",
            ArrayValues::Bool(_) => "bool",
            ArrayValues::Text(_) => "text",
        }
    }
}

/// Groups of resizable datasets with flat string attributes in one HDF5 file
pub struct H5Container {
    path: PathBuf,
    file: File,
    staging: Option<NamedTempFile>,
}

impl std::fmt::Debug for H5Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("H5Container")
            .field("path", &self.path)
            .field("writable", &self.staging.is_some())
            .finish()
    }
}

impl H5Container {
    /// Open `path` for writing.
    ///
    /// `Create` starts from an empty file, `Update` from a copy of the existing
    /// container (or an empty file when there is none). An existing path that is
    /// not an HDF5 file is never replaced.
    pub fn open<P: AsRef<Path>>(path: P, mode: AccessMode) -> StackResult<Self> {
        let path = path.as_ref().to_path_buf();
        let exists = path.exists();
        if exists && (path.is_dir() || File::open(&path).is_err()) {
            return Err(StackError::Container(format!(
                "{} exists and is not an HDF5 container",
                path.display()
            )));
        }

        let staging = staging_file(&path)?;
        let file = match mode {
            AccessMode::Update if exists => {
                fs::copy(&path, staging.path())?;
                File::open_rw(staging.path())?
            }
            _ => File::create(staging.path())?,
        };
        log::debug!(
            "Opened {} in {:?} mode, staging at {}",
            path.display(),
            mode,
            staging.path().display()
        );

        Ok(Self {
            path,
            file,
            staging: Some(staging),
        })
    }

    /// Open an existing container read-only
    pub fn open_existing<P: AsRef<Path>>(path: P) -> StackResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file,
            staging: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn has_group(&self, group: &str) -> bool {
        self.file.link_exists(group)
    }

    pub fn require_group(&mut self, group: &str) -> StackResult<()> {
        if !self.has_group(group) {
            self.file.create_group(group)?;
        }
        Ok(())
    }

    fn group(&self, group: &str) -> StackResult<Group> {
        if !self.has_group(group) {
            return Err(StackError::Container(format!(
                "no group /{} in {}",
                group,
                self.path.display()
            )));
        }
        Ok(self.file.group(group)?)
    }

    pub fn has_dataset(&self, group: &str, name: &str) -> bool {
        self.group(group)
            .map(|g| g.link_exists(name) && g.dataset(name).is_ok())
            .unwrap_or(false)
    }

    fn dataset(&self, group: &str, name: &str) -> StackResult<Dataset> {
        if !self.has_dataset(group, name) {
            return Err(StackError::Container(format!(
                "no dataset /{}/{} in {}",
                group,
                name,
                self.path.display()
            )));
        }
        Ok(self.group(group)?.dataset(name)?)
    }

    /// Dataset names of `group`, sorted
    pub fn datasets(&self, group: &str) -> StackResult<Vec<String>> {
        let grp = self.group(group)?;
        let mut names: Vec<String> = grp
            .member_names()?
            .into_iter()
            .filter(|name| grp.dataset(name).is_ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Create a dataset resizable along axis 0, chunked by `chunk0` rows
    pub fn create_dataset(
        &mut self,
        group: &str,
        name: &str,
        shape: &[usize],
        chunk0: usize,
        dtype: Dtype,
    ) -> StackResult<()> {
        if shape.is_empty() {
            return Err(StackError::Container(format!("/{}/{} needs at least one axis", group, name)));
        }
        let grp = self.group(group)?;
        let extents: Vec<Extent> = shape
            .iter()
            .enumerate()
            .map(|(axis, &dim)| if axis == 0 { Extent::resizable(dim) } else { Extent::fixed(dim) })
            .collect();
        let mut chunk: Vec<usize> = shape.iter().map(|&dim| dim.max(1)).collect();
        chunk[0] = chunk0.max(1);

        let extents = SimpleExtents::from_vec(extents);
        match dtype {
            Dtype::Float32 => new_resizable::<f32>(&grp, name, extents, chunk)?,
            Dtype::Float64 => new_resizable::<f64>(&grp, name, extents, chunk)?,
            Dtype::Bool => new_resizable::<bool>(&grp, name, extents, chunk)?,
            Dtype::Ascii8 => new_resizable::<FixedAscii<8>>(&grp, name, extents, chunk)?,
        };
        log::debug!("Created /{}/{} {:?} {}", group, name, shape, dtype);
        Ok(())
    }

    /// Create the dataset, or resize an existing one of the same type and
    /// trailing dimensions along axis 0
    pub fn require_dataset(
        &mut self,
        group: &str,
        name: &str,
        shape: &[usize],
        chunk0: usize,
        dtype: Dtype,
    ) -> StackResult<()> {
        if !self.has_dataset(group, name) {
            return self.create_dataset(group, name, shape, chunk0, dtype);
        }
        let existing = self.shape(group, name)?;
        let existing_dtype = self.dtype(group, name)?;
        if existing_dtype != dtype || existing.len() != shape.len() || existing[1..] != shape[1..] {
            return Err(StackError::Container(format!(
                "/{}/{} is {:?} {}, cannot reuse as {:?} {}",
                group, name, existing, existing_dtype, shape, dtype
            )));
        }
        if existing[0] != shape[0] {
            log::info!("resize /{}/{} from {} to {} along axis 0", group, name, existing[0], shape[0]);
            self.resize(group, name, shape[0])?;
        }
        Ok(())
    }

    pub fn resize(&mut self, group: &str, name: &str, len0: usize) -> StackResult<()> {
        let ds = self.dataset(group, name)?;
        let mut shape = ds.shape();
        shape[0] = len0;
        ds.resize(shape)?;
        Ok(())
    }

    pub fn remove_dataset(&mut self, group: &str, name: &str) -> StackResult<()> {
        self.group(group)?.unlink(name)?;
        Ok(())
    }

    pub fn shape(&self, group: &str, name: &str) -> StackResult<Vec<usize>> {
        Ok(self.dataset(group, name)?.shape())
    }

    pub fn dtype(&self, group: &str, name: &str) -> StackResult<Dtype> {
        let descriptor = self.dataset(group, name)?.dtype()?.to_descriptor()?;
        Dtype::from_descriptor(&descriptor).ok_or_else(|| {
            StackError::Container(format!("/{}/{} has unsupported type {:?}", group, name, descriptor))
        })
    }

    /// Write `values` into rows `start0..` of a dataset
    pub fn write(&mut self, group: &str, name: &str, start0: usize, values: ArrayValues<'_>) -> StackResult<()> {
        let ds = self.dataset(group, name)?;
        let dtype = self.dtype(group, name)?;
        let shape = ds.shape();
        let dims = values.shape();
        if dims.is_empty() || dims.len() != shape.len() || dims[1..] != shape[1..] || start0 + dims[0] > shape[0] {
            return Err(StackError::Container(format!(
                "cannot write {:?} at row {} into /{}/{} of shape {:?}",
                dims, start0, group, name, shape
            )));
        }

        match (values, dtype) {
            (ArrayValues::Float(v), Dtype::Float32) => write_rows(&ds, start0, v),
            (ArrayValues::Float(v), Dtype::Float64) => write_rows(&ds, start0, v.mapv(f64::from).view()),
            (ArrayValues::Float(v), Dtype::Bool) => write_rows(&ds, start0, v.mapv(|x| x != 0.0).view()),
            (ArrayValues::Bool(v), Dtype::Bool) => write_rows(&ds, start0, v),
            (ArrayValues::Text(v), Dtype::Ascii8) => {
                let text = v.iter().map(|s| to_ascii8(s)).collect::<StackResult<Vec<_>>>()?;
                let text = ArrayD::from_shape_vec(v.raw_dim(), text)
                    .map_err(|e| StackError::Container(e.to_string()))?;
                write_rows(&ds, start0, text.view())
            }
            (values, dtype) => Err(StackError::Container(format!(
                "cannot write {} values into {} dataset /{}/{}",
                values.kind(),
                dtype,
                group,
                name
            ))),
        }
    }

    /// Set string attributes of `group`, overwriting keys already present
    pub fn set_attributes(&mut self, group: &str, attrs: &Attributes) -> StackResult<()> {
        let grp = self.group(group)?;
        let existing = grp.attr_names()?;
        for (key, value) in attrs {
            let value = to_var_len_unicode(value)?;
            if existing.contains(key) {
                grp.attr(key)?.write_scalar(&value)?;
            } else {
                grp.new_attr::<VarLenUnicode>()
                    .create(key.as_str())?
                    .write_scalar(&value)?;
            }
        }
        Ok(())
    }

    pub fn attributes(&self, group: &str) -> StackResult<Attributes> {
        let grp = self.group(group)?;
        let mut attrs = Attributes::new();
        for name in grp.attr_names()? {
            let value: VarLenUnicode = grp.attr(&name)?.read_scalar()?;
            attrs.insert(name, value.to_string());
        }
        Ok(attrs)
    }

    /// Read a numeric or boolean dataset as float32
    pub fn read_f32(&self, group: &str, name: &str) -> StackResult<ArrayD<f32>> {
        let ds = self.dataset(group, name)?;
        match self.dtype(group, name)? {
            Dtype::Float32 => Ok(ds.read_dyn::<f32>()?),
            Dtype::Float64 => Ok(ds.read_dyn::<f64>()?.mapv(|v| v as f32)),
            Dtype::Bool => Ok(ds.read_dyn::<bool>()?.mapv(|v| if v { 1.0 } else { 0.0 })),
            Dtype::Ascii8 => Err(StackError::Container(format!("/{}/{} holds strings", group, name))),
        }
    }

    pub fn read_bool(&self, group: &str, name: &str) -> StackResult<ArrayD<bool>> {
        match self.dtype(group, name)? {
            Dtype::Bool => Ok(self.dataset(group, name)?.read_dyn::<bool>()?),
            other => Err(StackError::Container(format!("/{}/{} holds {}, not bool", group, name, other))),
        }
    }

    pub fn read_strings(&self, group: &str, name: &str) -> StackResult<ArrayD<String>> {
        match self.dtype(group, name)? {
            Dtype::Ascii8 => Ok(self
                .dataset(group, name)?
                .read_dyn::<FixedAscii<8>>()?
                .map(|s| s.as_str().to_string())),
            other => Err(StackError::Container(format!("/{}/{} holds {}, not text", group, name, other))),
        }
    }

    /// Flush and, for a writable container, move the staging file over the target
    pub fn close(self) -> StackResult<()> {
        let Self { path, file, staging } = self;
        file.flush()?;
        drop(file);
        if let Some(staging) = staging {
            staging.persist(&path).map_err(|e| StackError::Io(e.error))?;
            log::debug!("Committed {}", path.display());
        }
        Ok(())
    }
}

fn staging_file(target: &Path) -> StackResult<NamedTempFile> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let staging = tempfile::Builder::new()
        .prefix(&format!(".{}.", name))
        .suffix(".partial")
        .tempfile_in(&dir)?;
    Ok(staging)
}

fn new_resizable<T: H5Type>(
    group: &Group,
    name: &str,
    extents: SimpleExtents,
    chunk: Vec<usize>,
) -> StackResult<Dataset> {
    Ok(group.new_dataset::<T>().shape(extents).chunk(chunk).create(name)?)
}

fn write_rows<T: H5Type>(dataset: &Dataset, start0: usize, data: ArrayViewD<'_, T>) -> StackResult<()> {
    let end = start0 + data.shape()[0];
    let shape_err = |e: ndarray::ShapeError| StackError::Container(e.to_string());
    match data.ndim() {
        1 => dataset.write_slice(data.into_dimensionality::<Ix1>().map_err(shape_err)?, s![start0..end])?,
        2 => dataset.write_slice(data.into_dimensionality::<Ix2>().map_err(shape_err)?, s![start0..end, ..])?,
        3 => dataset.write_slice(
            data.into_dimensionality::<Ix3>().map_err(shape_err)?,
            s![start0..end, .., ..],
        )?,
        n => return Err(StackError::Container(format!("cannot write rank-{} data", n))),
    }
    Ok(())
}

fn to_ascii8(value: &str) -> StackResult<FixedAscii<8>> {
    FixedAscii::<8>::from_ascii(value.as_bytes())
        .map_err(|e| StackError::Container(format!("'{}' is not an 8-byte ASCII string: {}", value, e)))
}

fn to_var_len_unicode(value: &str) -> StackResult<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| StackError::Container(format!("invalid string value '{}': {}", value, e)))
}

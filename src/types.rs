use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Flat string-keyed attribute set, as carried by every raster sidecar
/// and by the root group of each container.
pub type Attributes = BTreeMap<String, String>;

/// 2D real raster (rows x columns)
pub type Raster = Array2<f32>;

/// Date format used for pair identities and the `date` dataset
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Pixel-space subset rectangle `(x0, y0, x1, y1)`, end-exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBox {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelBox {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> StackResult<Self> {
        if x1 <= x0 || y1 <= y0 {
            return Err(StackError::InvalidBox(format!(
                "({}, {}, {}, {}) has non-positive extent",
                x0, y0, x1, y1
            )));
        }
        Ok(Self { x0, y0, x1, y1 })
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0
    }

    pub fn length(&self) -> usize {
        self.y1 - self.y0
    }

    /// `(length, width)` of the subset region
    pub fn size(&self) -> (usize, usize) {
        (self.length(), self.width())
    }

    /// Check that the box lies inside a raster of the given size
    pub fn check_within(&self, length: usize, width: usize) -> StackResult<()> {
        if self.x1 > width || self.y1 > length {
            return Err(StackError::InvalidBox(format!(
                "({}, {}, {}, {}) exceeds raster of {} lines x {} samples",
                self.x0, self.y0, self.x1, self.y1, length, width
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for PixelBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x0, self.y0, self.x1, self.y1)
    }
}

/// Master/slave acquisition dates of one interferometric pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DatePair {
    pub master: NaiveDate,
    pub slave: NaiveDate,
}

impl DatePair {
    pub fn new(master: NaiveDate, slave: NaiveDate) -> Self {
        Self { master, slave }
    }

    /// Parse a pair from two `YYYYMMDD` strings
    pub fn parse(master: &str, slave: &str) -> StackResult<Self> {
        Ok(Self {
            master: parse_date(master)?,
            slave: parse_date(slave)?,
        })
    }

    /// `[master, slave]` as `YYYYMMDD` strings
    pub fn to_strings(&self) -> [String; 2] {
        [
            self.master.format(DATE_FORMAT).to_string(),
            self.slave.format(DATE_FORMAT).to_string(),
        ]
    }
}

impl std::fmt::Display for DatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [m, s] = self.to_strings();
        write!(f, "{}_{}", m, s)
    }
}

fn parse_date(value: &str) -> StackResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)
        .map_err(|e| StackError::InvalidDate(format!("{}: {}", value, e)))
}

/// Platform/track tag used to partition pairs into independently processed sets
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformTrack {
    pub platform: Option<String>,
    pub track: Option<String>,
}

impl std::fmt::Display for PlatformTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.platform, &self.track) {
            (Some(p), Some(t)) => write!(f, "{}_{}", p, t),
            (Some(p), None) => write!(f, "{}", p),
            (None, Some(t)) => write!(f, "{}", t),
            (None, None) => write!(f, "unknown"),
        }
    }
}

/// Floating point element type of non-boolean container datasets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FloatType {
    #[default]
    Float32,
    Float64,
}

/// How an assembler opens its output container
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    /// Start a fresh container, replacing an existing one at the same path on success
    #[default]
    Create,
    /// Open an existing container (or create it) and update it in place
    Update,
}

/// Read an integer attribute
pub fn attr_usize(attrs: &Attributes, key: &str, path: &Path) -> StackResult<usize> {
    let value = attrs.get(key).ok_or_else(|| StackError::MissingAttribute {
        key: key.to_string(),
        path: path.to_path_buf(),
    })?;
    let invalid = || StackError::InvalidAttribute {
        key: key.to_string(),
        value: value.clone(),
        path: path.to_path_buf(),
    };
    if let Ok(v) = value.trim().parse::<usize>() {
        return Ok(v);
    }
    // some writers store sizes as "1000.0"
    let v = value.trim().parse::<f64>().map_err(|_| invalid())?;
    if !v.is_finite() || v < 0.0 || v.fract() != 0.0 || v >= usize::MAX as f64 {
        return Err(invalid());
    }
    Ok(v as usize)
}

/// Read a floating point attribute
pub fn attr_f64(attrs: &Attributes, key: &str, path: &Path) -> StackResult<f64> {
    let value = attrs.get(key).ok_or_else(|| StackError::MissingAttribute {
        key: key.to_string(),
        path: path.to_path_buf(),
    })?;
    value.trim().parse::<f64>().map_err(|_| StackError::InvalidAttribute {
        key: key.to_string(),
        value: value.clone(),
        path: path.to_path_buf(),
    })
}

/// Error types for stack and geometry assembly
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing attribute {key} in {}", path.display())]
    MissingAttribute { key: String, path: PathBuf },

    #[error("Invalid value '{value}' for attribute {key} in {}", path.display())]
    InvalidAttribute {
        key: String,
        value: String,
        path: PathBuf,
    },

    #[error("Dataset '{family}' not registered for {owner}")]
    DatasetNotFound { family: String, owner: String },

    #[error("Inconsistent raster sizes in {group}: {sizes:?}")]
    InconsistentGeometry {
        group: String,
        sizes: Vec<(usize, usize)>,
    },

    #[error("Dataset '{family}' of {owner} is {found:?}, expected {expected:?}")]
    ShapeMismatch {
        family: String,
        owner: String,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Invalid subset box: {0}")]
    InvalidBox(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Duplicate pair {0} in stack")]
    DuplicatePair(String),

    #[error("No pairs to write into {0}")]
    EmptyStack(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Failed to read '{family}' from {}: {source}", path.display())]
    Read {
        family: String,
        path: PathBuf,
        #[source]
        source: Box<StackError>,
    },

    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("Container error: {0}")]
    Container(String),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for stack operations
pub type StackResult<T> = Result<T, StackError>;

use crate::io::sidecar::read_sidecar;
use crate::types::{attr_usize, Attributes, PixelBox, Raster, StackError, StackResult};
use num_complex::Complex32;
use std::path::Path;

/// Single-file raster reader.
///
/// Every dataset family of a pair or geometry record is read through this
/// trait, so alternative formats plug in without touching the assemblers.
pub trait RasterReader: Send + Sync {
    /// Read one 2D layer of `path`, optionally restricted to `subset`.
    ///
    /// `epoch` selects a named layer in files that multiplex several layers.
    fn read(
        &self,
        path: &Path,
        epoch: Option<&str>,
        subset: Option<&PixelBox>,
    ) -> StackResult<(Raster, Attributes)>;

    /// Read only the attribute set of `path`
    fn read_attribute(&self, path: &Path) -> StackResult<Attributes>;
}

/// Sample encoding of a flat binary raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    UInt8,
    Int16,
    Int32,
    Float32,
    Float64,
    /// Complex interferogram, decoded to its phase angle
    Complex64,
}

impl SampleType {
    pub fn from_attr(value: Option<&String>) -> StackResult<Self> {
        let Some(value) = value else {
            return Ok(SampleType::Float32);
        };
        match value.trim().to_lowercase().as_str() {
            "uint8" | "byte" | "bool" | "int8" => Ok(SampleType::UInt8),
            "int16" | "short" => Ok(SampleType::Int16),
            "int32" | "int" => Ok(SampleType::Int32),
            "float32" | "float" => Ok(SampleType::Float32),
            "float64" | "double" => Ok(SampleType::Float64),
            "complex64" | "cfloat" => Ok(SampleType::Complex64),
            other => Err(StackError::InvalidFormat(format!(
                "unsupported DATA_TYPE '{}'",
                other
            ))),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            SampleType::UInt8 => 1,
            SampleType::Int16 => 2,
            SampleType::Int32 | SampleType::Float32 => 4,
            SampleType::Float64 | SampleType::Complex64 => 8,
        }
    }

    fn decode(&self, bytes: &[u8], big_endian: bool) -> f32 {
        macro_rules! num {
            ($t:ty, $n:expr, $b:expr) => {{
                let mut buf = [0u8; $n];
                buf.copy_from_slice(&$b[..$n]);
                if big_endian {
                    <$t>::from_be_bytes(buf)
                } else {
                    <$t>::from_le_bytes(buf)
                }
            }};
        }
        match self {
            SampleType::UInt8 => bytes[0] as f32,
            SampleType::Int16 => num!(i16, 2, bytes) as f32,
            SampleType::Int32 => num!(i32, 4, bytes) as f32,
            SampleType::Float32 => num!(f32, 4, bytes),
            SampleType::Float64 => num!(f64, 8, bytes) as f32,
            SampleType::Complex64 => {
                let re = num!(f32, 4, bytes[..4]);
                let im = num!(f32, 4, bytes[4..]);
                Complex32::new(re, im).arg()
            }
        }
    }
}

/// Band layout of a multi-band binary raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
    Bil,
    Bip,
    Bsq,
}

impl Interleave {
    fn from_attr(value: Option<&String>) -> StackResult<Self> {
        match value.map(|v| v.trim().to_uppercase()).as_deref() {
            None | Some("BIL") => Ok(Interleave::Bil),
            Some("BIP") => Ok(Interleave::Bip),
            Some("BSQ") => Ok(Interleave::Bsq),
            Some(other) => Err(StackError::InvalidFormat(format!(
                "unsupported INTERLEAVE '{}'",
                other
            ))),
        }
    }

    fn sample_index(&self, row: usize, col: usize, band: usize, bands: usize, length: usize, width: usize) -> usize {
        match self {
            Interleave::Bil => (row * bands + band) * width + col,
            Interleave::Bip => (row * width + col) * bands + band,
            Interleave::Bsq => (band * length + row) * width + col,
        }
    }
}

/// Zero-based band holding the requested layer
fn band_index(path: &Path, epoch: Option<&str>, bands: usize) -> usize {
    if bands <= 1 {
        return 0;
    }
    match epoch {
        Some("incidenceAngle") => return 0,
        Some("azimuthAngle") | Some("headingAngle") => return 1,
        _ => {}
    }
    // amplitude + phase
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    if ext == "unw" && bands == 2 {
        return 1;
    }
    0
}

/// Reader for flat binary rasters described by a ROI_PAC, ISCE or GAMMA sidecar
#[derive(Debug, Clone, Copy, Default)]
pub struct SidecarReader;

impl SidecarReader {
    pub fn new() -> Self {
        Self
    }
}

impl RasterReader for SidecarReader {
    fn read(
        &self,
        path: &Path,
        epoch: Option<&str>,
        subset: Option<&PixelBox>,
    ) -> StackResult<(Raster, Attributes)> {
        let attrs = self.read_attribute(path)?;
        let length = attr_usize(&attrs, "LENGTH", path)?;
        let width = attr_usize(&attrs, "WIDTH", path)?;
        let bands = match attrs.get("BANDS") {
            Some(_) => attr_usize(&attrs, "BANDS", path)?.max(1),
            None => 1,
        };
        let sample = SampleType::from_attr(attrs.get("DATA_TYPE"))?;
        let interleave = Interleave::from_attr(attrs.get("INTERLEAVE"))?;
        let big_endian = attrs
            .get("BYTE_ORDER")
            .map(|v| matches!(v.to_lowercase().as_str(), "big" | "b" | "msb" | "big-endian"))
            .unwrap_or(false);

        let region = match subset {
            Some(b) => {
                b.check_within(length, width)?;
                *b
            }
            None => PixelBox { x0: 0, y0: 0, x1: width, y1: length },
        };
        let band = band_index(path, epoch, bands);

        log::debug!(
            "Reading {} band {} of {} ({:?}, {:?}) box {}",
            path.display(),
            band + 1,
            bands,
            sample,
            interleave,
            region
        );

        let expected = length
            .checked_mul(width)
            .and_then(|n| n.checked_mul(bands))
            .and_then(|n| n.checked_mul(sample.size()))
            .ok_or_else(|| {
                StackError::InvalidFormat(format!(
                    "{} declares an oversized raster of {}x{}x{}",
                    path.display(),
                    length,
                    width,
                    bands
                ))
            })?;
        let bytes = std::fs::read(path)?;
        if bytes.len() < expected {
            return Err(StackError::InvalidFormat(format!(
                "{} holds {} bytes, expected {} for {}x{}x{} {:?}",
                path.display(),
                bytes.len(),
                expected,
                length,
                width,
                bands,
                sample
            )));
        }

        let (out_rows, out_cols) = region.size();
        if out_rows == 0 || out_cols == 0 {
            return Err(StackError::InvalidFormat(format!(
                "{} has an empty raster extent",
                path.display()
            )));
        }
        let mut data = vec![0.0f32; out_rows * out_cols];
        let decode_row = |(i, row_out): (usize, &mut [f32])| {
            let row = region.y0 + i;
            for (j, value) in row_out.iter_mut().enumerate() {
                let col = region.x0 + j;
                let offset = interleave.sample_index(row, col, band, bands, length, width) * sample.size();
                *value = sample.decode(&bytes[offset..offset + sample.size()], big_endian);
            }
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            data.par_chunks_mut(out_cols).enumerate().for_each(decode_row);
        }
        #[cfg(not(feature = "parallel"))]
        {
            data.chunks_mut(out_cols).enumerate().for_each(decode_row);
        }

        let raster = Raster::from_shape_vec((out_rows, out_cols), data)
            .map_err(|e| StackError::InvalidFormat(format!("Failed to reshape raster: {}", e)))?;
        Ok((raster, attrs))
    }

    fn read_attribute(&self, path: &Path) -> StackResult<Attributes> {
        read_sidecar(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::sidecar::format_rsc;
    use tempfile::TempDir;

    fn write_bil(dir: &Path, name: &str, bands: &[Vec<f32>], length: usize, width: usize) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut bytes = Vec::new();
        for row in 0..length {
            for band in bands {
                for col in 0..width {
                    bytes.extend_from_slice(&band[row * width + col].to_le_bytes());
                }
            }
        }
        std::fs::write(&path, bytes).unwrap();
        let mut attrs = Attributes::new();
        attrs.insert("LENGTH".into(), length.to_string());
        attrs.insert("WIDTH".into(), width.to_string());
        attrs.insert("BANDS".into(), bands.len().to_string());
        std::fs::write(format!("{}.rsc", path.display()), format_rsc(&attrs)).unwrap();
        path
    }

    #[test]
    fn test_unw_reads_phase_band() {
        let dir = TempDir::new().unwrap();
        let amp: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let phase: Vec<f32> = (0..12).map(|v| -(v as f32)).collect();
        let path = write_bil(dir.path(), "filt.unw", &[amp, phase], 3, 4);

        let (data, attrs) = SidecarReader.read(&path, None, None).unwrap();
        assert_eq!(data.dim(), (3, 4));
        assert_eq!(data[[2, 3]], -11.0);
        assert_eq!(attrs["BANDS"], "2");
    }

    #[test]
    fn test_epoch_selects_band_with_box() {
        let dir = TempDir::new().unwrap();
        let inc: Vec<f32> = (0..20).map(|v| 30.0 + v as f32).collect();
        let az: Vec<f32> = (0..20).map(|v| 100.0 + v as f32).collect();
        let path = write_bil(dir.path(), "los.rdr", &[inc, az], 4, 5);

        let subset = PixelBox::new(1, 1, 3, 3).unwrap();
        let (data, _) = SidecarReader.read(&path, Some("headingAngle"), Some(&subset)).unwrap();
        assert_eq!(data.dim(), (2, 2));
        assert_eq!(data[[0, 0]], 106.0);
        assert_eq!(data[[1, 1]], 112.0);

        let (data, _) = SidecarReader.read(&path, Some("incidenceAngle"), Some(&subset)).unwrap();
        assert_eq!(data[[0, 0]], 36.0);
    }

    #[test]
    fn test_box_outside_raster_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_bil(dir.path(), "hgt.rdr", &[vec![0.0; 6]], 2, 3);
        let subset = PixelBox::new(0, 0, 4, 2).unwrap();
        assert!(matches!(
            SidecarReader.read(&path, None, Some(&subset)),
            Err(StackError::InvalidBox(_))
        ));
    }

    #[test]
    fn test_truncated_file_fails() {
        let dir = TempDir::new().unwrap();
        let path = write_bil(dir.path(), "cor", &[vec![1.0; 4]], 2, 2);
        std::fs::write(&path, [0u8; 7]).unwrap();
        assert!(matches!(
            SidecarReader.read(&path, None, None),
            Err(StackError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_oversized_extent_fails_without_panic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.unw");
        std::fs::write(&path, [0u8; 16]).unwrap();
        let mut attrs = Attributes::new();
        attrs.insert("LENGTH".into(), (usize::MAX / 2).to_string());
        attrs.insert("WIDTH".into(), "4".into());
        std::fs::write(format!("{}.rsc", path.display()), format_rsc(&attrs)).unwrap();

        assert!(matches!(
            SidecarReader.read(&path, None, None),
            Err(StackError::InvalidFormat(ref msg)) if msg.contains("oversized")
        ));
    }

    #[test]
    fn test_complex_decodes_to_phase() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.0f32.to_le_bytes());
        bytes.extend_from_slice(&1.0f32.to_le_bytes());
        let phase = SampleType::Complex64.decode(&bytes, false);
        approx::assert_abs_diff_eq!(phase, std::f32::consts::FRAC_PI_2, epsilon = 1e-6);
        assert_eq!(SampleType::Int16.decode(&[0x01, 0x00], true), 256.0);
    }
}

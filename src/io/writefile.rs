use crate::io::sidecar::{format_rsc, SidecarKind};
use crate::types::{Attributes, Raster, StackResult};
use std::path::Path;

/// Write a float32 raster as flat little-endian binary with a ROI_PAC `.rsc` sidecar.
///
/// `attrs` is written alongside; LENGTH, WIDTH, DATA_TYPE and BYTE_ORDER
/// always reflect `data`.
pub fn write_raster<P: AsRef<Path>>(path: P, data: &Raster, attrs: &Attributes) -> StackResult<()> {
    let path = path.as_ref();
    let (length, width) = data.dim();
    log::debug!("Writing {}x{} raster to {}", length, width, path.display());

    let mut bytes = Vec::with_capacity(length * width * 4);
    for value in data.iter() {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    std::fs::write(path, bytes)?;

    let mut meta = attrs.clone();
    meta.insert("LENGTH".to_string(), length.to_string());
    meta.insert("WIDTH".to_string(), width.to_string());
    meta.insert("DATA_TYPE".to_string(), "float32".to_string());
    meta.insert("BYTE_ORDER".to_string(), "little".to_string());
    std::fs::write(SidecarKind::Rsc.path_for(path), format_rsc(&meta))?;
    Ok(())
}

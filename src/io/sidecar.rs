use crate::types::{Attributes, StackError, StackResult};
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Sidecar metadata flavours, in the order they are looked up next to a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarKind {
    /// ROI_PAC resource file, `KEY value` per line
    Rsc,
    /// ISCE image XML, `<property name=".."><value>..</value></property>`
    Xml,
    /// GAMMA parameter file, `key: value [unit]` per line
    Par,
}

impl SidecarKind {
    pub const LOOKUP_ORDER: [SidecarKind; 3] = [SidecarKind::Rsc, SidecarKind::Xml, SidecarKind::Par];

    pub fn extension(&self) -> &'static str {
        match self {
            SidecarKind::Rsc => "rsc",
            SidecarKind::Xml => "xml",
            SidecarKind::Par => "par",
        }
    }

    /// Sidecar path for a raster: the extension is appended, not substituted
    pub fn path_for(&self, raster: &Path) -> PathBuf {
        let mut name = raster.as_os_str().to_os_string();
        name.push(".");
        name.push(self.extension());
        PathBuf::from(name)
    }
}

/// Locate and parse the first sidecar found next to `raster`
pub fn read_sidecar(raster: &Path) -> StackResult<Attributes> {
    for kind in SidecarKind::LOOKUP_ORDER {
        let sidecar = kind.path_for(raster);
        if sidecar.is_file() {
            log::debug!("Reading {:?} metadata from {}", kind, sidecar.display());
            let content = std::fs::read_to_string(&sidecar)?;
            return match kind {
                SidecarKind::Rsc => Ok(parse_rsc(&content)),
                SidecarKind::Xml => parse_isce_xml(&content),
                SidecarKind::Par => Ok(parse_gamma_par(&content)),
            };
        }
    }
    Err(StackError::InvalidFormat(format!(
        "no .rsc/.xml/.par metadata found for {}",
        raster.display()
    )))
}

fn rsc_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z_][\w.]*)\s+(.+?)\s*$").expect("valid regex"))
}

fn par_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([A-Za-z_][\w.]*)\s*:\s*(.*?)\s*$").expect("valid regex"))
}

/// Parse a ROI_PAC `.rsc` resource file
pub fn parse_rsc(content: &str) -> Attributes {
    let mut attrs = Attributes::new();
    for line in content.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        if let Some(caps) = rsc_line().captures(line) {
            attrs.insert(caps[1].to_string(), caps[2].to_string());
        }
    }
    if !attrs.contains_key("LENGTH") {
        if let Some(length) = attrs.get("FILE_LENGTH").cloned() {
            attrs.insert("LENGTH".to_string(), length);
        }
    }
    attrs
}

/// Serialize attributes in ROI_PAC `.rsc` layout
pub fn format_rsc(attrs: &Attributes) -> String {
    attrs
        .iter()
        .map(|(key, value)| format!("{:<40}{}\n", key, value))
        .collect()
}

/// Parse a GAMMA `.par` parameter file.
///
/// GAMMA writes big-endian rasters, so `BYTE_ORDER` defaults to `big`.
pub fn parse_gamma_par(content: &str) -> Attributes {
    let mut attrs = Attributes::new();
    for line in content.lines() {
        let Some(caps) = par_line().captures(line) else {
            continue;
        };
        let key = &caps[1];
        let value = caps[2].to_string();
        let first = value.split_whitespace().next().unwrap_or("").to_string();
        match key {
            "range_samples" | "width" => {
                attrs.insert("WIDTH".to_string(), first);
            }
            "azimuth_lines" | "nlines" => {
                attrs.insert("LENGTH".to_string(), first);
            }
            _ => {
                attrs.insert(key.to_uppercase(), value);
            }
        }
    }
    attrs
        .entry("BYTE_ORDER".to_string())
        .or_insert_with(|| "big".to_string());
    attrs
}

#[derive(Debug, Deserialize)]
struct IsceImageFile {
    #[serde(rename = "property", default)]
    properties: Vec<IsceProperty>,
}

#[derive(Debug, Deserialize)]
struct IsceProperty {
    #[serde(rename = "@name")]
    name: String,
    #[serde(default)]
    value: Option<String>,
}

/// Parse an ISCE image `.xml` description
pub fn parse_isce_xml(content: &str) -> StackResult<Attributes> {
    let image = from_str::<IsceImageFile>(content)
        .map_err(|e| StackError::XmlParsing(format!("Failed to parse ISCE image XML: {}", e)))?;

    let mut attrs = Attributes::new();
    for prop in image.properties {
        let Some(value) = prop.value.map(|v| v.trim().to_string()) else {
            continue;
        };
        match prop.name.to_lowercase().as_str() {
            "width" => {
                attrs.insert("WIDTH".to_string(), value);
            }
            "length" => {
                attrs.insert("LENGTH".to_string(), value);
            }
            "number_bands" => {
                attrs.insert("BANDS".to_string(), value);
            }
            "scheme" => {
                attrs.insert("INTERLEAVE".to_string(), value.to_uppercase());
            }
            "data_type" => {
                attrs.insert("DATA_TYPE".to_string(), isce_data_type(&value).to_string());
            }
            "byte_order" => {
                let order = if value.eq_ignore_ascii_case("b") { "big" } else { "little" };
                attrs.insert("BYTE_ORDER".to_string(), order.to_string());
            }
            other => {
                attrs.insert(other.to_uppercase().replace(' ', "_"), value);
            }
        }
    }
    Ok(attrs)
}

fn isce_data_type(value: &str) -> &str {
    match value.to_uppercase().as_str() {
        "BYTE" => "uint8",
        "SHORT" => "int16",
        "INT" => "int32",
        "FLOAT" => "float32",
        "DOUBLE" => "float64",
        "CFLOAT" => "complex64",
        _ => value,
    }
}

use crate::io::sidecar::SidecarKind;
use crate::types::Attributes;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// SAR processing software that produced a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Processor {
    Isce,
    RoiPac,
    Gamma,
    Gmtsar,
}

impl Processor {
    /// Fallback when no probe matches
    pub const DEFAULT: Processor = Processor::Isce;

    /// Label stored in the PROCESSOR attribute
    pub fn label(&self) -> &'static str {
        match self {
            Processor::Isce => "isce",
            Processor::RoiPac => "roipac",
            Processor::Gamma => "gamma",
            Processor::Gmtsar => "gmtsar",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "isce" => Some(Processor::Isce),
            "roipac" | "roi_pac" => Some(Processor::RoiPac),
            "gamma" => Some(Processor::Gamma),
            "gmtsar" => Some(Processor::Gmtsar),
            _ => None,
        }
    }
}

impl std::fmt::Display for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// One step of the processor inference policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorProbe {
    /// A companion metadata file `<path>.<ext>` exists
    Sidecar(SidecarKind, Processor),
    /// The raster file itself carries this extension
    FileExtension(&'static str, Processor),
    /// The raster metadata names its processor
    Attribute,
}

impl ProcessorProbe {
    pub fn evaluate(&self, path: &Path, attrs: &Attributes) -> Option<Processor> {
        match self {
            ProcessorProbe::Sidecar(kind, processor) => kind.path_for(path).exists().then_some(*processor),
            ProcessorProbe::FileExtension(ext, processor) => path
                .extension()
                .and_then(|e| e.to_str())
                .filter(|e| e == ext)
                .map(|_| *processor),
            ProcessorProbe::Attribute => {
                let label = attrs.get("PROCESSOR")?;
                let processor = Processor::from_label(label);
                if processor.is_none() {
                    log::warn!("Ignoring unknown PROCESSOR '{}' in {}", label, path.display());
                }
                processor
            }
        }
    }
}

/// Probe order for interferogram files
pub const PAIR_PROBES: &[ProcessorProbe] = &[
    ProcessorProbe::Sidecar(SidecarKind::Xml, Processor::Isce),
    ProcessorProbe::Sidecar(SidecarKind::Rsc, Processor::RoiPac),
    ProcessorProbe::Sidecar(SidecarKind::Par, Processor::Gamma),
    ProcessorProbe::FileExtension("grd", Processor::Gmtsar),
    ProcessorProbe::Attribute,
];

/// Probe order for geometry files; the file's own PROCESSOR wins
pub const GEOMETRY_PROBES: &[ProcessorProbe] = &[
    ProcessorProbe::Attribute,
    ProcessorProbe::Sidecar(SidecarKind::Xml, Processor::Isce),
    ProcessorProbe::Sidecar(SidecarKind::Rsc, Processor::RoiPac),
    ProcessorProbe::Sidecar(SidecarKind::Par, Processor::Gamma),
    ProcessorProbe::FileExtension("grd", Processor::Gmtsar),
];

/// Evaluate `probes` in order, stopping at the first match
pub fn infer_processor(probes: &[ProcessorProbe], path: &Path, attrs: &Attributes) -> Processor {
    let found = probes.iter().find_map(|probe| {
        let hit = probe.evaluate(path, attrs);
        if let Some(p) = hit {
            log::debug!("Processor of {} is {} ({:?})", path.display(), p, probe);
        }
        hit
    });
    found.unwrap_or_else(|| {
        log::debug!(
            "No processor probe matched {}, using {}",
            path.display(),
            Processor::DEFAULT
        );
        Processor::DEFAULT
    })
}

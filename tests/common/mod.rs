#![allow(dead_code)]

use insarstack::io::write_raster;
use insarstack::{Attributes, DatePair, PairRecord, Raster};
use ndarray::Array2;
use std::path::{Path, PathBuf};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn unwrap_phase(seed: f32, length: usize, width: usize) -> Raster {
    Array2::from_shape_fn((length, width), |(r, c)| seed + (r * width + c) as f32 * 0.25)
}

pub fn connect_component(length: usize, width: usize) -> Raster {
    Array2::from_shape_fn((length, width), |(r, c)| ((r + c) % 2) as f32)
}

pub fn radar_attributes(bperp_top: f64, bperp_bottom: f64) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("P_BASELINE_TOP_HDR".into(), bperp_top.to_string());
    attrs.insert("P_BASELINE_BOTTOM_HDR".into(), bperp_bottom.to_string());
    attrs.insert("STARTING_RANGE".into(), "800000.0".into());
    attrs.insert("RANGE_PIXEL_SIZE".into(), "10.0".into());
    attrs.insert("EARTH_RADIUS".into(), "6371000.0".into());
    attrs.insert("HEIGHT".into(), "700000.0".into());
    attrs.insert("WAVELENGTH".into(), "0.05546576".into());
    attrs
}

/// Write unwrapPhase, coherence and connectComponent rasters of one pair
/// into `<dir>/<master>_<slave>/` and register them in that order.
pub fn write_pair(dir: &Path, master: &str, slave: &str, seed: f32, length: usize, width: usize) -> PairRecord {
    let dates = DatePair::parse(master, slave).unwrap();
    let pair_dir = dir.join(dates.to_string());
    std::fs::create_dir_all(&pair_dir).unwrap();

    let attrs = radar_attributes(seed as f64, seed as f64 + 10.0);
    let unw = pair_dir.join("filt_fine.unw");
    let cor = pair_dir.join("filt_fine.cor");
    let conncomp = pair_dir.join("filt_fine.unw.conncomp");
    write_raster(&unw, &unwrap_phase(seed, length, width), &attrs).unwrap();
    write_raster(&cor, &Array2::from_elem((length, width), 0.5), &attrs).unwrap();
    write_raster(&conncomp, &connect_component(length, width), &attrs).unwrap();

    PairRecord::new(
        dates,
        [
            ("unwrapPhase", unw),
            ("coherence", cor),
            ("connectComponent", conncomp),
        ],
    )
}

pub fn write_layer(dir: &Path, name: &str, data: &Raster, attrs: &Attributes) -> PathBuf {
    let path = dir.join(name);
    write_raster(&path, data, attrs).unwrap();
    path
}

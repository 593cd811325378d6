mod common;

use approx::assert_abs_diff_eq;
use common::{init_logging, radar_attributes, write_layer, write_pair};
use insarstack::io::Dtype;
use insarstack::{
    Attributes, GeometryAssembler, GeometryParams, GeometryRecord, PixelBox, PlatformTrack, Processor, H5Container,
};
use ndarray::{s, Array2, Axis};
use std::path::PathBuf;
use tempfile::TempDir;

fn height(length: usize, width: usize) -> Array2<f32> {
    Array2::from_shape_fn((length, width), |(r, c)| 100.0 + r as f32 * 2.0 + c as f32)
}

fn water_mask(length: usize, width: usize) -> Array2<f32> {
    Array2::from_shape_fn((length, width), |(r, _)| if r < length / 2 { 1.0 } else { 0.0 })
}

#[test]
fn test_empty_record_writes_nothing() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("geometryRadar.h5");
    let mut record = GeometryRecord::new(Vec::<(String, PathBuf)>::new());

    let written = GeometryAssembler::standard().write(&mut record, &output).unwrap();
    assert!(written.is_none());
    assert!(!output.exists());
}

#[test]
fn test_radar_geometry_with_derived_layers() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut pair = write_pair(dir.path(), "20160524", "20160530", 0.0, 6, 8);
    let hgt = write_layer(dir.path(), "hgt.rdr", &height(6, 8), &radar_attributes(0.0, 0.0));
    let mask = write_layer(dir.path(), "waterMask.rdr", &water_mask(6, 8), &Attributes::new());

    let mut record = GeometryRecord::new([("height", hgt), ("waterMask", mask)])
        .with_ifgram_metadata(pair.metadata().unwrap());
    let output = dir.path().join("geometryRadar.h5");
    let written = GeometryAssembler::standard().write(&mut record, &output).unwrap();
    assert_eq!(written, Some(output.clone()));

    let container = H5Container::open_existing(&output).unwrap();
    let mut names = container.datasets("geometry").unwrap();
    names.sort();
    assert_eq!(names, vec!["height", "incidenceAngle", "slantRangeDistance", "waterMask"]);

    assert_eq!(container.dtype("geometry", "height").unwrap(), Dtype::Float32);
    assert_eq!(container.read_f32("geometry", "height").unwrap(), height(6, 8).into_dyn());

    assert_eq!(container.dtype("geometry", "waterMask").unwrap(), Dtype::Bool);
    let mask = container.read_bool("geometry", "waterMask").unwrap();
    assert!(mask[[0, 0]]);
    assert!(!mask[[5, 7]]);

    let srd = container.read_f32("geometry", "slantRangeDistance").unwrap();
    assert_eq!(srd.shape(), &[6, 8]);
    assert_abs_diff_eq!(srd[[0, 0]], 800000.0, epsilon = 0.5);
    assert_abs_diff_eq!(srd[[3, 7]], 800070.0, epsilon = 0.5);

    let inc = container.read_f32("geometry", "incidenceAngle").unwrap();
    assert_eq!(inc.shape(), &[6, 8]);
    assert!(inc.iter().all(|v| *v > 0.0 && *v < 90.0));
    assert_eq!(inc.index_axis(Axis(0), 0), inc.index_axis(Axis(0), 5));

    let attrs = container.attributes("geometry").unwrap();
    assert_eq!(attrs["PROCESSOR"], "roipac");
    assert_eq!(attrs["LENGTH"], "6");
    assert_eq!(attrs["WIDTH"], "8");
    assert_eq!(record.processor(), Some(Processor::RoiPac));
}

#[test]
fn test_geocoded_geometry_skips_derived_layers() {
    let dir = TempDir::new().unwrap();
    let mut attrs = Attributes::new();
    attrs.insert("X_FIRST".into(), "-118.2".into());
    attrs.insert("Y_FIRST".into(), "34.5".into());
    attrs.insert("X_STEP".into(), "0.001".into());
    attrs.insert("Y_STEP".into(), "-0.001".into());
    attrs.insert("LENGTH".into(), "4".into());
    attrs.insert("WIDTH".into(), "5".into());
    let hgt = write_layer(dir.path(), "hgt.geo", &height(4, 5), &attrs);

    let mut record = GeometryRecord::new([("height", hgt)]).with_ifgram_metadata(attrs);
    let output = dir.path().join("geometryGeo.h5");
    GeometryAssembler::standard().write(&mut record, &output).unwrap();

    let container = H5Container::open_existing(&output).unwrap();
    assert_eq!(container.datasets("geometry").unwrap(), vec!["height"]);
    assert_eq!(container.attributes("geometry").unwrap()["X_FIRST"], "-118.2");
}

#[test]
fn test_geometry_box_subset() {
    let dir = TempDir::new().unwrap();
    let mut pair = write_pair(dir.path(), "20160524", "20160530", 0.0, 6, 8);
    let hgt = write_layer(dir.path(), "hgt.rdr", &height(6, 8), &radar_attributes(0.0, 0.0));
    let mut record = GeometryRecord::new([("height", hgt)])
        .with_ifgram_metadata(pair.metadata().unwrap())
        .with_platform_track(PlatformTrack {
            platform: Some("Sen".into()),
            track: Some("T64".into()),
        });

    let subset = PixelBox::new(2, 1, 6, 4).unwrap();
    let output = dir.path().join("geometryRadar.h5");
    GeometryAssembler::new(GeometryParams {
        subset: Some(subset),
        ..Default::default()
    })
    .write(&mut record, &output)
    .unwrap();

    let container = H5Container::open_existing(&output).unwrap();
    let hgt = container.read_f32("geometry", "height").unwrap();
    assert_eq!(hgt, height(6, 8).slice(s![1..4, 2..6]).into_dyn());

    let srd = container.read_f32("geometry", "slantRangeDistance").unwrap();
    assert_eq!(srd.shape(), &[3, 4]);
    assert_abs_diff_eq!(srd[[0, 0]], 800020.0, epsilon = 0.5);

    let attrs = container.attributes("geometry").unwrap();
    assert_eq!(attrs["LENGTH"], "3");
    assert_eq!(attrs["WIDTH"], "4");
    assert_eq!(attrs["SUBSET_YMAX"], "4");
}

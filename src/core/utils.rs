use crate::types::{attr_f64, attr_usize, Attributes, PixelBox, Raster, StackResult};
use ndarray::{s, Array1, Array2};
use std::path::Path;

/// Geocoded products carry a first-coordinate attribute
pub fn is_geocoded(attrs: &Attributes) -> bool {
    attrs.contains_key("Y_FIRST") || attrs.contains_key("X_FIRST")
}

fn metadata_source(attrs: &Attributes) -> &Path {
    Path::new(attrs.get("FILE_PATH").map(String::as_str).unwrap_or("<metadata>"))
}

/// Adjust spatially dependent attributes for a subset region.
///
/// Returns a copy of `attrs` unchanged when `subset` is `None`.
pub fn subset_attributes(attrs: &Attributes, subset: Option<&PixelBox>) -> StackResult<Attributes> {
    let Some(b) = subset else {
        return Ok(attrs.clone());
    };
    let src = metadata_source(attrs);
    let mut out = attrs.clone();
    let (length, width) = b.size();

    out.insert("LENGTH".to_string(), length.to_string());
    out.insert("WIDTH".to_string(), width.to_string());
    out.insert("YMAX".to_string(), (length - 1).to_string());
    out.insert("XMAX".to_string(), (width - 1).to_string());

    // cumulative offsets with respect to the original full-frame raster
    let y_offset = attrs.get("SUBSET_YMIN").map(|_| attr_usize(attrs, "SUBSET_YMIN", src)).transpose()?.unwrap_or(0);
    let x_offset = attrs.get("SUBSET_XMIN").map(|_| attr_usize(attrs, "SUBSET_XMIN", src)).transpose()?.unwrap_or(0);
    out.insert("SUBSET_YMIN".to_string(), (b.y0 + y_offset).to_string());
    out.insert("SUBSET_YMAX".to_string(), (b.y1 + y_offset).to_string());
    out.insert("SUBSET_XMIN".to_string(), (b.x0 + x_offset).to_string());
    out.insert("SUBSET_XMAX".to_string(), (b.x1 + x_offset).to_string());

    if attrs.contains_key("Y_FIRST") {
        let first = attr_f64(attrs, "Y_FIRST", src)?;
        let step = attr_f64(attrs, "Y_STEP", src)?;
        out.insert("Y_FIRST".to_string(), (first + b.y0 as f64 * step).to_string());
    }
    if attrs.contains_key("X_FIRST") {
        let first = attr_f64(attrs, "X_FIRST", src)?;
        let step = attr_f64(attrs, "X_STEP", src)?;
        out.insert("X_FIRST".to_string(), (first + b.x0 as f64 * step).to_string());
    }

    if attrs.contains_key("REF_Y") && attrs.contains_key("REF_X") {
        let ref_y = attr_f64(attrs, "REF_Y", src)? as i64 - b.y0 as i64;
        let ref_x = attr_f64(attrs, "REF_X", src)? as i64 - b.x0 as i64;
        if (0..length as i64).contains(&ref_y) && (0..width as i64).contains(&ref_x) {
            out.insert("REF_Y".to_string(), ref_y.to_string());
            out.insert("REF_X".to_string(), ref_x.to_string());
        } else {
            log::warn!("Reference pixel falls outside subset {}, dropping REF_* attributes", b);
            for key in ["REF_Y", "REF_X", "REF_LAT", "REF_LON"] {
                out.remove(key);
            }
        }
    }

    if !is_geocoded(attrs) && attrs.contains_key("STARTING_RANGE") {
        let start = attr_f64(attrs, "STARTING_RANGE", src)?;
        let spacing = attr_f64(attrs, "RANGE_PIXEL_SIZE", src)?;
        out.insert("STARTING_RANGE".to_string(), (start + b.x0 as f64 * spacing).to_string());
    }
    Ok(out)
}

fn crop(data: Raster, subset: Option<&PixelBox>) -> StackResult<Raster> {
    match subset {
        Some(b) => {
            let (length, width) = data.dim();
            b.check_within(length, width)?;
            Ok(data.slice(s![b.y0..b.y1, b.x0..b.x1]).to_owned())
        }
        None => Ok(data),
    }
}

fn tile_rows(row: &Array1<f64>, length: usize) -> Raster {
    Array2::from_shape_fn((length, row.len()), |(_, c)| row[c] as f32)
}

/// Slant range distance in meters for every pixel of a radar-coordinate raster.
///
/// Returns `None` for geocoded metadata.
pub fn slant_range_distance(attrs: &Attributes, subset: Option<&PixelBox>) -> StackResult<Option<Raster>> {
    if is_geocoded(attrs) {
        return Ok(None);
    }
    let src = metadata_source(attrs);
    let length = attr_usize(attrs, "LENGTH", src)?;
    let width = attr_usize(attrs, "WIDTH", src)?;
    let near = attr_f64(attrs, "STARTING_RANGE", src)?;
    let spacing = attr_f64(attrs, "RANGE_PIXEL_SIZE", src)?;

    let far = near + spacing * (width.saturating_sub(1)) as f64;
    let row = Array1::linspace(near, far, width);
    crop(tile_rows(&row, length), subset).map(Some)
}

/// Incidence angle in degrees for every pixel of a radar-coordinate raster,
/// from the law of cosines on a spherical earth.
///
/// Returns `None` for geocoded metadata.
pub fn incidence_angle(attrs: &Attributes, subset: Option<&PixelBox>) -> StackResult<Option<Raster>> {
    if is_geocoded(attrs) {
        return Ok(None);
    }
    let src = metadata_source(attrs);
    let length = attr_usize(attrs, "LENGTH", src)?;
    let width = attr_usize(attrs, "WIDTH", src)?;
    let near = attr_f64(attrs, "STARTING_RANGE", src)?;
    let spacing = attr_f64(attrs, "RANGE_PIXEL_SIZE", src)?;
    let earth_radius = attr_f64(attrs, "EARTH_RADIUS", src)?;
    let height = attr_f64(attrs, "HEIGHT", src)?;

    let far = near + spacing * (width.saturating_sub(1)) as f64;
    let angle = |range: f64| {
        let r = earth_radius;
        let cos = (r * r + range * range - (r + height) * (r + height)) / (2.0 * r * range);
        (std::f64::consts::PI - cos.clamp(-1.0, 1.0).acos()).to_degrees()
    };
    let row = Array1::linspace(angle(near), angle(far), width);
    crop(tile_rows(&row, length), subset).map(Some)
}

/// Lower median of a list of sizes
pub fn median(values: &[usize]) -> Option<usize> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    Some(sorted[(sorted.len() - 1) / 2])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn radar_attrs() -> Attributes {
        let mut attrs = Attributes::new();
        attrs.insert("LENGTH".into(), "4".into());
        attrs.insert("WIDTH".into(), "5".into());
        attrs.insert("STARTING_RANGE".into(), "800000.0".into());
        attrs.insert("RANGE_PIXEL_SIZE".into(), "10.0".into());
        attrs.insert("EARTH_RADIUS".into(), "6371000.0".into());
        attrs.insert("HEIGHT".into(), "700000.0".into());
        attrs
    }

    #[test]
    fn test_slant_range_distance() {
        let data = slant_range_distance(&radar_attrs(), None).unwrap().unwrap();
        assert_eq!(data.dim(), (4, 5));
        assert_eq!(data[[0, 0]], 800000.0);
        assert_eq!(data[[3, 4]], 800040.0);

        let subset = PixelBox::new(1, 2, 3, 4).unwrap();
        let cropped = slant_range_distance(&radar_attrs(), Some(&subset)).unwrap().unwrap();
        assert_eq!(cropped.dim(), (2, 2));
        assert_eq!(cropped[[0, 0]], 800010.0);
    }

    #[test]
    fn test_incidence_angle_increases_with_range() {
        let data = incidence_angle(&radar_attrs(), None).unwrap().unwrap();
        assert_eq!(data.dim(), (4, 5));
        assert!(data[[0, 4]] > data[[0, 0]]);
        assert!(data[[0, 0]] > 20.0 && data[[0, 0]] < 40.0);
        assert_eq!(data.row(0), data.row(3));
    }

    #[test]
    fn test_geocoded_skips_derivation() {
        let mut attrs = radar_attrs();
        attrs.insert("Y_FIRST".into(), "35.0".into());
        assert!(incidence_angle(&attrs, None).unwrap().is_none());
        assert!(slant_range_distance(&attrs, None).unwrap().is_none());
    }

    #[test]
    fn test_subset_attributes_radar() {
        let mut attrs = radar_attrs();
        attrs.insert("REF_Y".into(), "3".into());
        attrs.insert("REF_X".into(), "1".into());
        attrs.insert("REF_LAT".into(), "35.1".into());
        let subset = PixelBox::new(2, 1, 5, 3).unwrap();
        let out = subset_attributes(&attrs, Some(&subset)).unwrap();
        assert_eq!(out["LENGTH"], "2");
        assert_eq!(out["WIDTH"], "3");
        assert_eq!(out["SUBSET_XMIN"], "2");
        assert_eq!(out["SUBSET_YMAX"], "3");
        assert_abs_diff_eq!(out["STARTING_RANGE"].parse::<f64>().unwrap(), 800020.0);
        assert!(!out.contains_key("REF_Y"));
        assert!(!out.contains_key("REF_LAT"));
        assert_eq!(subset_attributes(&attrs, None).unwrap(), attrs);
    }

    #[test]
    fn test_subset_attributes_geocoded() {
        let mut attrs = Attributes::new();
        attrs.insert("LENGTH".into(), "100".into());
        attrs.insert("WIDTH".into(), "100".into());
        attrs.insert("Y_FIRST".into(), "35.0".into());
        attrs.insert("Y_STEP".into(), "-0.5".into());
        attrs.insert("X_FIRST".into(), "-118.0".into());
        attrs.insert("X_STEP".into(), "0.25".into());
        attrs.insert("SUBSET_XMIN".into(), "10".into());
        attrs.insert("STARTING_RANGE".into(), "800000.0".into());
        let subset = PixelBox::new(4, 2, 8, 6).unwrap();
        let out = subset_attributes(&attrs, Some(&subset)).unwrap();
        assert_abs_diff_eq!(out["Y_FIRST"].parse::<f64>().unwrap(), 34.0);
        assert_abs_diff_eq!(out["X_FIRST"].parse::<f64>().unwrap(), -117.0);
        assert_eq!(out["SUBSET_XMIN"], "14");
        assert_eq!(out["STARTING_RANGE"], "800000.0");
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&[100, 100, 101]), Some(100));
        assert_eq!(median(&[101, 100, 101]), Some(101));
        assert_eq!(median(&[100, 102]), Some(100));
        assert_eq!(median(&[]), None);
    }
}

//! insarstack: organize single-pair InSAR products into stack and geometry containers
//!
//! Unwrapped phase, coherence, connected components and geometry layers from
//! ISCE, ROI_PAC, GAMMA or GMTSAR are gathered per platform/track and written
//! into an interferogram stack container and a geometry container.

pub mod types;
pub mod io;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{
    AccessMode, Attributes, DatePair, FloatType, PixelBox, PlatformTrack, Raster, StackError, StackResult,
};

pub use crate::io::{RasterReader, SidecarReader, H5Container};
pub use crate::core::{
    partition_by_platform_track, GeometryAssembler, GeometryParams, GeometryRecord, MetadataOverrides,
    PairRecord, PlatformTrackGroup, Processor, StackAssembler, StackParams,
};

#[cfg(feature = "python")]
mod python {
    use super::*;
    use numpy::{IntoPyArray, PyArray2};
    use pyo3::exceptions::{PyRuntimeError, PyValueError};
    use pyo3::prelude::*;
    use pyo3::types::PyDict;
    use std::path::PathBuf;

    fn runtime_err(e: StackError) -> PyErr {
        PyErr::new::<PyRuntimeError, _>(format!("{}", e))
    }

    fn access_mode(mode: &str) -> PyResult<AccessMode> {
        match mode {
            "w" => Ok(AccessMode::Create),
            "a" | "r+" => Ok(AccessMode::Update),
            _ => Err(PyErr::new::<PyValueError, _>(format!("Invalid access mode: {}", mode))),
        }
    }

    fn subset_box(subset: Option<(usize, usize, usize, usize)>) -> PyResult<Option<PixelBox>> {
        subset
            .map(|(x0, y0, x1, y1)| PixelBox::new(x0, y0, x1, y1))
            .transpose()
            .map_err(|e| PyErr::new::<PyValueError, _>(format!("{}", e)))
    }

    fn dataset_paths(datasets: &PyDict) -> PyResult<Vec<(String, PathBuf)>> {
        datasets
            .iter()
            .map(|(k, v)| Ok((k.extract::<String>()?, PathBuf::from(v.extract::<String>()?))))
            .collect()
    }

    /// Write an interferogram stack from `[(master, slave, {family: path}), ...]`
    #[pyfunction]
    #[pyo3(signature = (pairs, output, subset=None, mode="w", platform=None, track=None))]
    fn write_ifgram_stack(
        pairs: Vec<(String, String, &PyDict)>,
        output: String,
        subset: Option<(usize, usize, usize, usize)>,
        mode: &str,
        platform: Option<String>,
        track: Option<String>,
    ) -> PyResult<String> {
        let mut records = Vec::with_capacity(pairs.len());
        for (master, slave, datasets) in pairs {
            let dates = DatePair::parse(&master, &slave).map_err(runtime_err)?;
            let record = PairRecord::new(dates, dataset_paths(datasets)?).with_overrides(MetadataOverrides {
                processor: None,
                platform: platform.clone(),
                track: track.clone(),
            });
            records.push(record);
        }

        let assembler = StackAssembler::new(StackParams {
            access_mode: access_mode(mode)?,
            subset: subset_box(subset)?,
            ..Default::default()
        });
        let path = assembler.write(&mut records, &output).map_err(runtime_err)?;
        Ok(path.display().to_string())
    }

    /// Write a geometry container; returns `None` when `datasets` is empty
    #[pyfunction]
    #[pyo3(signature = (datasets, output, ifgram_file=None, processor=None, subset=None, mode="w"))]
    fn write_geometry(
        datasets: &PyDict,
        output: String,
        ifgram_file: Option<String>,
        processor: Option<String>,
        subset: Option<(usize, usize, usize, usize)>,
        mode: &str,
    ) -> PyResult<Option<String>> {
        let mut record = GeometryRecord::new(dataset_paths(datasets)?);
        if let Some(label) = processor {
            let processor = Processor::from_label(&label)
                .ok_or_else(|| PyErr::new::<PyValueError, _>(format!("Invalid processor: {}", label)))?;
            record = record.with_processor(processor);
        }
        if let Some(file) = ifgram_file {
            let metadata = SidecarReader.read_attribute(PathBuf::from(file).as_path()).map_err(runtime_err)?;
            record = record.with_ifgram_metadata(metadata);
        }

        let assembler = GeometryAssembler::new(GeometryParams {
            access_mode: access_mode(mode)?,
            subset: subset_box(subset)?,
            ..Default::default()
        });
        let path = assembler.write(&mut record, &output).map_err(runtime_err)?;
        Ok(path.map(|p| p.display().to_string()))
    }

    /// Read one pair's slice of a stack dataset
    #[pyfunction]
    #[pyo3(signature = (path, family, index, group="ifgramStack"))]
    fn read_stack_slice<'py>(
        py: Python<'py>,
        path: String,
        family: &str,
        index: usize,
        group: &str,
    ) -> PyResult<&'py PyArray2<f32>> {
        let container = H5Container::open_existing(&path).map_err(runtime_err)?;
        let data = container.read_f32(group, family).map_err(runtime_err)?;
        if data.ndim() != 3 || index >= data.shape()[0] {
            return Err(PyErr::new::<PyValueError, _>(format!(
                "No slice {} in /{}/{} of shape {:?}",
                index,
                group,
                family,
                data.shape()
            )));
        }
        let slice = data
            .index_axis(ndarray::Axis(0), index)
            .to_owned()
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| PyErr::new::<PyRuntimeError, _>(format!("{}", e)))?;
        Ok(slice.into_pyarray(py))
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(write_ifgram_stack, m)?)?;
        m.add_function(wrap_pyfunction!(write_geometry, m)?)?;
        m.add_function(wrap_pyfunction!(read_stack_slice, m)?)?;
        Ok(())
    }
}

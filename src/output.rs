use std::fs;
use std::path::Path;

use pyo3::prelude::*;
use pyo3::types::PyBytes;

use crate::error::Result;

pub const DEFAULT_OUTPUT: &str = "posteriors.pkl";

/// Encoding of the results file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Python pickle of `list[list[float]]`.
    #[default]
    Pickle,
    /// JSON array of arrays.
    Json,
}

/// Pickles the posteriors with the embedded interpreter's own `pickle`.
pub fn to_pickle_bytes(posteriors: &[Vec<f64>]) -> Result<Vec<u8>> {
    let bytes = Python::with_gil(|py| -> PyResult<Vec<u8>> {
        let pickle = py.import("pickle")?;
        let dumped = pickle.call_method1("dumps", (posteriors.to_vec(),))?;
        let dumped = dumped.downcast_into::<PyBytes>()?;
        Ok(dumped.as_bytes().to_vec())
    })?;
    Ok(bytes)
}

pub fn write_posteriors(
    path: impl AsRef<Path>,
    format: OutputFormat,
    posteriors: &[Vec<f64>],
) -> Result<()> {
    let bytes = match format {
        OutputFormat::Pickle => to_pickle_bytes(posteriors)?,
        OutputFormat::Json => serde_json::to_vec(posteriors)?,
    };
    fs::write(path.as_ref(), bytes)?;
    tracing::info!(
        "Wrote {} posterior lists to {}",
        posteriors.len(),
        path.as_ref().display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Vec<f64>> {
        vec![vec![0.25, 0.5], vec![1.0], vec![0.125]]
    }

    #[test]
    fn test_pickle_loads_back_in_python() {
        let bytes = to_pickle_bytes(&sample()).unwrap();

        let loaded = Python::with_gil(|py| -> PyResult<Vec<Vec<f64>>> {
            let pickle = py.import("pickle")?;
            pickle
                .call_method1("loads", (PyBytes::new(py, &bytes),))?
                .extract()
        })
        .unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_write_pickle_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_OUTPUT);
        write_posteriors(&path, OutputFormat::Pickle, &sample()).unwrap();

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, to_pickle_bytes(&sample()).unwrap());
        // Every pickle protocol >= 2 opens with PROTO
        assert_eq!(written[0], 0x80);
    }

    #[test]
    fn test_write_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posteriors.json");
        write_posteriors(&path, OutputFormat::Json, &sample()).unwrap();

        let loaded: Vec<Vec<f64>> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        assert!(write_posteriors(&path, OutputFormat::Json, &sample()).is_err());
    }
}

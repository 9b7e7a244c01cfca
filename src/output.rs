//! Prediction Output
//!
//! Writes the best model's high-resolution predictions to an HDF5 container:
//! one chunked float32 dataset under a fixed key, protected by Fletcher32
//! checksums, with the generation time recorded as a root attribute.

use std::path::Path;

use chrono::Local;
use ndarray::Array4;
use tracing::info;

use crate::dataset::SR_PREDICTION_KEY;
use crate::utils::error::{Ai4EoError, Result};

/// Name of the root attribute holding the generation timestamp
pub const TIMESTAMP_ATTR: &str = "timestamp";

/// Write predicted high-resolution images (`[n, 1, H, W]`) to `path`.
///
/// An existing file at `path` is replaced. Failures are fatal to the run; no
/// partial-file recovery is attempted.
pub fn write_predictions(path: &Path, predictions: &Array4<f32>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let (n, c, h, w) = predictions.dim();
    let file = hdf5::File::create(path)?;

    let dataset = file
        .new_dataset::<f32>()
        .shape(predictions.dim())
        .chunk((n.max(1), c, h, w))
        .fletcher32(true)
        .create(SR_PREDICTION_KEY)?;
    dataset.write(predictions)?;

    let timestamp = Local::now().to_rfc3339();
    let value: hdf5::types::VarLenUnicode = timestamp
        .parse()
        .map_err(|e| Ai4EoError::Dataset(format!("timestamp encoding failed: {:?}", e)))?;
    file.new_attr::<hdf5::types::VarLenUnicode>()
        .create(TIMESTAMP_ATTR)?
        .write_scalar(&value)?;

    info!(
        "saved {} predicted images ({}x{}) to {}",
        n,
        h,
        w,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    #[test]
    fn test_written_predictions_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("predictions.h5");

        let predictions = Array4::<f32>::from_shape_fn((2, 1, 4, 4), |(n, _, y, x)| {
            (n * 100 + y * 4 + x) as f32
        });
        write_predictions(&path, &predictions).unwrap();

        let file = hdf5::File::open(&path).unwrap();
        let read: Array4<f32> = file
            .dataset(SR_PREDICTION_KEY)
            .unwrap()
            .read_dyn::<f32>()
            .unwrap()
            .into_dimensionality()
            .unwrap();
        assert_eq!(read, predictions);

        let attr: hdf5::types::VarLenUnicode = file
            .attr(TIMESTAMP_ATTR)
            .unwrap()
            .read_scalar()
            .unwrap();
        assert!(!attr.as_str().is_empty());
    }

    #[test]
    fn test_parent_directories_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/out/predictions.h5");

        let predictions = Array4::<f32>::zeros((1, 1, 2, 2));
        write_predictions(&path, &predictions).unwrap();
        assert!(path.exists());
    }
}

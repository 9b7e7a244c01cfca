//! Super-Resolution Pair Loader
//!
//! Reads paired low/high-resolution images from an HDF5 file. The container
//! holds two datasets under fixed keys: `X` with low-resolution inputs
//! `[n, h, w, c]` and `y` with high-resolution targets `[n, H, W, 1]`, both
//! float32. The scale factor is inferred from the shapes and must divide the
//! high-resolution dimensions exactly.

use std::path::Path;

use ndarray::{Array4, Ix4};
use tracing::info;

use super::{SR_INPUT_KEY, SR_TARGET_KEY};
use crate::utils::error::{Ai4EoError, Result};

/// A single low/high-resolution training pair
#[derive(Debug, Clone)]
pub struct SrPair {
    /// Low-resolution input, flattened CHW `[c * h * w]`
    pub lowres: Vec<f32>,
    /// High-resolution target, flattened `[H * W]`
    pub highres: Vec<f32>,
}

/// Paired low/high-resolution dataset loaded from HDF5
#[derive(Debug)]
pub struct SrPairDataset {
    pairs: Vec<SrPair>,
    /// Low-resolution spatial size `(h, w)`
    pub lowres_size: (usize, usize),
    /// Number of input channels
    pub channels: usize,
    /// Inferred scale factor between input and target resolution
    pub scale: usize,
}

impl SrPairDataset {
    /// Load all pairs from the HDF5 file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Ai4EoError::PathNotFound(path.to_path_buf()));
        }

        let start = std::time::Instant::now();
        let file = hdf5::File::open(path)?;

        let inputs = read_array4(&file, SR_INPUT_KEY)?;
        let targets = read_array4(&file, SR_TARGET_KEY)?;

        let (n, h, w, c) = inputs.dim();
        let (tn, th, tw, tc) = targets.dim();

        if n != tn {
            return Err(Ai4EoError::Dataset(format!(
                "'{}' holds {} samples but '{}' holds {}",
                SR_INPUT_KEY, n, SR_TARGET_KEY, tn
            )));
        }
        if tc != 1 {
            return Err(Ai4EoError::Dataset(format!(
                "'{}' must be single-channel, got {} channels",
                SR_TARGET_KEY, tc
            )));
        }
        if h == 0 || w == 0 || th % h != 0 || tw % w != 0 || th / h != tw / w {
            return Err(Ai4EoError::Dataset(format!(
                "target size {}x{} is not an integer multiple of input size {}x{}",
                th, tw, h, w
            )));
        }
        let scale = th / h;

        let mut pairs = Vec::with_capacity(n);
        for idx in 0..n {
            // HWC on disk -> CHW for the network
            let mut lowres = Vec::with_capacity(c * h * w);
            for ch in 0..c {
                for y in 0..h {
                    for x in 0..w {
                        lowres.push(inputs[[idx, y, x, ch]]);
                    }
                }
            }
            let mut highres = Vec::with_capacity(th * tw);
            for y in 0..th {
                for x in 0..tw {
                    highres.push(targets[[idx, y, x, 0]]);
                }
            }
            pairs.push(SrPair { lowres, highres });
        }

        info!(
            "read {} image pairs from {} in {:.1}s (input {}x{}x{}, scale {})",
            n,
            path.display(),
            start.elapsed().as_secs_f64(),
            h,
            w,
            c,
            scale
        );

        Ok(Self {
            pairs,
            lowres_size: (h, w),
            channels: c,
            scale,
        })
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SrPair> {
        self.pairs.get(index)
    }

    /// High-resolution spatial size `(H, W)`
    pub fn highres_size(&self) -> (usize, usize) {
        let (h, w) = self.lowres_size;
        (h * self.scale, w * self.scale)
    }
}

fn read_array4(file: &hdf5::File, key: &str) -> Result<Array4<f32>> {
    let dataset = file.dataset(key)?;
    let array = dataset.read_dyn::<f32>()?;
    array.into_dimensionality::<Ix4>().map_err(|e| {
        Ai4EoError::Dataset(format!("dataset '{}' is not 4-dimensional: {}", key, e))
    })
}

//! EO Patch Loader
//!
//! Loads pre-processed EO patches from disk. Each patch is a directory of
//! NumPy layers written by the preprocessing pipeline; the loader reads the
//! NDVI input stack, the cultivated-land target mask and the per-pixel
//! weights, and validates that the high-resolution layers line up with the
//! Sentinel-2 resolution at the configured scale factor.

use std::path::{Path, PathBuf};

use ndarray::{Array3, Array4};
use ndarray_npy::read_npy;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{CULTIVATED_LAYER, NDVI_LAYER, WEIGHTS_LAYER};
use crate::utils::error::{Ai4EoError, Result};

/// A single EO patch with all layers loaded into memory
#[derive(Debug, Clone)]
pub struct EoPatch {
    /// Directory name of the patch (e.g. "eopatch_17")
    pub name: String,
    /// NDVI input stack, shape `[time, h, w, 1]`
    pub ndvi: Array4<f32>,
    /// Cultivated-land mask, shape `[h·scale, w·scale, 1]`
    pub cultivated: Array3<f32>,
    /// Per-pixel weights, shape `[h·scale, w·scale, 1]`
    pub weights: Array3<f32>,
}

impl EoPatch {
    /// Load a patch from its directory, validating layer shapes against the
    /// given scale factor.
    pub fn load(dir: &Path, scale: usize) -> Result<Self> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| dir.display().to_string());

        let ndvi: Array4<f32> = read_layer(dir, "data", NDVI_LAYER)?;
        let cultivated: Array3<f32> = read_layer(dir, "mask_timeless", CULTIVATED_LAYER)?;
        let weights: Array3<f32> = read_layer(dir, "data_timeless", WEIGHTS_LAYER)?;

        let (_, h, w, _) = ndvi.dim();
        let (hh, hw, _) = cultivated.dim();
        if hh != h * scale || hw != w * scale {
            return Err(Ai4EoError::Dataset(format!(
                "patch '{}': {} is {}x{} but NDVI is {}x{} at scale {}",
                name, CULTIVATED_LAYER, hh, hw, h, w, scale
            )));
        }
        if weights.dim() != cultivated.dim() {
            return Err(Ai4EoError::Dataset(format!(
                "patch '{}': {} shape {:?} does not match {} shape {:?}",
                name,
                WEIGHTS_LAYER,
                weights.dim(),
                CULTIVATED_LAYER,
                cultivated.dim()
            )));
        }

        debug!(
            "loaded patch '{}': NDVI {:?}, targets {:?}",
            name,
            ndvi.dim(),
            cultivated.dim()
        );

        Ok(Self {
            name,
            ndvi,
            cultivated,
            weights,
        })
    }

    /// Sentinel-2 resolution of the patch, `(height, width)`
    pub fn s2_size(&self) -> (usize, usize) {
        let (_, h, w, _) = self.ndvi.dim();
        (h, w)
    }
}

fn read_layer<T: ndarray_npy::ReadNpyExt>(dir: &Path, group: &str, layer: &str) -> Result<T> {
    let path = dir.join(group).join(format!("{}.npy", layer));
    read_npy(&path).map_err(|e| {
        Ai4EoError::PatchLayer(dir.to_path_buf(), layer.to_string(), e.to_string())
    })
}

/// Summary statistics for a loaded patch collection
#[derive(Debug, Clone)]
pub struct EoPatchStats {
    pub total_patches: usize,
    pub train_patches: usize,
    pub valid_patches: usize,
    pub s2_size: Option<(usize, usize)>,
}

impl EoPatchStats {
    pub fn print(&self) {
        info!(
            "patches: {} total ({} train / {} valid), S2 size: {:?}",
            self.total_patches, self.train_patches, self.valid_patches, self.s2_size
        );
    }
}

/// A collection of EO patches split into training and validation sets
#[derive(Debug)]
pub struct EoPatchDataset {
    /// Root directory of the processed patches
    pub root_dir: PathBuf,
    /// Training patches
    pub train: Vec<EoPatch>,
    /// Validation patches
    pub valid: Vec<EoPatch>,
}

impl EoPatchDataset {
    /// Load all patches under `root_dir`, shuffle deterministically with the
    /// given seed and assign the first `n_valid` patches to validation.
    pub fn load(root_dir: &Path, n_valid: usize, scale: usize, seed: u64) -> Result<Self> {
        if !root_dir.exists() {
            return Err(Ai4EoError::PathNotFound(root_dir.to_path_buf()));
        }

        let mut patch_dirs = Self::discover(root_dir);
        if patch_dirs.is_empty() {
            return Err(Ai4EoError::Dataset(format!(
                "no EO patches found under {}",
                root_dir.display()
            )));
        }
        if n_valid >= patch_dirs.len() {
            return Err(Ai4EoError::Config(format!(
                "n_valid ({}) must be smaller than the number of patches ({})",
                n_valid,
                patch_dirs.len()
            )));
        }

        // Deterministic split: sort, then seeded shuffle
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        patch_dirs.shuffle(&mut rng);

        let start = std::time::Instant::now();
        let mut valid = Vec::with_capacity(n_valid);
        let mut train = Vec::with_capacity(patch_dirs.len() - n_valid);
        for (idx, dir) in patch_dirs.iter().enumerate() {
            let patch = EoPatch::load(dir, scale)?;
            if idx < n_valid {
                valid.push(patch);
            } else {
                train.push(patch);
            }
        }
        info!(
            "loaded {} patches in {:.1}s",
            train.len() + valid.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(Self {
            root_dir: root_dir.to_path_buf(),
            train,
            valid,
        })
    }

    /// Discover patch directories (any immediate subdirectory containing a
    /// `data/NDVI.npy` layer), sorted by name.
    pub fn discover(root_dir: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = WalkDir::new(root_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .filter(|p| p.join("data").join(format!("{}.npy", NDVI_LAYER)).exists())
            .collect();
        dirs.sort();
        dirs
    }

    /// Summary statistics
    pub fn stats(&self) -> EoPatchStats {
        EoPatchStats {
            total_patches: self.train.len() + self.valid.len(),
            train_patches: self.train.len(),
            valid_patches: self.valid.len(),
            s2_size: self
                .train
                .first()
                .or_else(|| self.valid.first())
                .map(|p| p.s2_size()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};
    use ndarray_npy::write_npy;

    fn write_patch(dir: &Path, h: usize, w: usize, scale: usize) {
        std::fs::create_dir_all(dir.join("data")).unwrap();
        std::fs::create_dir_all(dir.join("mask_timeless")).unwrap();
        std::fs::create_dir_all(dir.join("data_timeless")).unwrap();

        let ndvi = Array4::<f32>::zeros((2, h, w, 1));
        let cultivated = Array3::<f32>::zeros((h * scale, w * scale, 1));
        let weights = Array3::<f32>::ones((h * scale, w * scale, 1));

        write_npy(dir.join("data/NDVI.npy"), &ndvi).unwrap();
        write_npy(dir.join("mask_timeless/CULTIVATED.npy"), &cultivated).unwrap();
        write_npy(dir.join("data_timeless/WEIGHTS.npy"), &weights).unwrap();
    }

    #[test]
    fn test_load_patch() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("eopatch_0");
        write_patch(&dir, 8, 8, 4);

        let patch = EoPatch::load(&dir, 4).unwrap();
        assert_eq!(patch.s2_size(), (8, 8));
        assert_eq!(patch.cultivated.dim(), (32, 32, 1));
    }

    #[test]
    fn test_load_patch_wrong_scale_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("eopatch_0");
        write_patch(&dir, 8, 8, 4);

        assert!(EoPatch::load(&dir, 2).is_err());
    }

    #[test]
    fn test_dataset_split_is_deterministic() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write_patch(&tmp.path().join(format!("eopatch_{}", i)), 4, 4, 4);
        }

        let a = EoPatchDataset::load(tmp.path(), 2, 4, 2021).unwrap();
        let b = EoPatchDataset::load(tmp.path(), 2, 4, 2021).unwrap();

        let names = |ps: &[EoPatch]| ps.iter().map(|p| p.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&a.valid), names(&b.valid));
        assert_eq!(names(&a.train), names(&b.train));
        assert_eq!(a.valid.len(), 2);
        assert_eq!(a.train.len(), 3);
    }

    #[test]
    fn test_n_valid_must_leave_training_patches() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..2 {
            write_patch(&tmp.path().join(format!("eopatch_{}", i)), 4, 4, 4);
        }

        assert!(EoPatchDataset::load(tmp.path(), 2, 4, 2021).is_err());
    }
}

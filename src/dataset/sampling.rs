//! Patchlet Sampling
//!
//! Crops fixed-size training samples ("patchlets") out of large EO patches.
//! The NDVI input is cropped at Sentinel-2 resolution and the aligned target
//! and weight crops are taken at `scale` times that resolution from the
//! high-resolution layers. Only the first time frame of the NDVI stack is
//! used.

use ndarray::s;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::eopatch::EoPatch;
use crate::utils::error::{Ai4EoError, Result};

/// How patchlet positions are chosen within a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingMode {
    /// Seeded-random, possibly overlapping positions
    Random,
    /// Non-overlapping grid, row-major order
    Systematic,
}

/// A single training sample cropped from an EO patch
#[derive(Debug, Clone)]
pub struct Patchlet {
    /// NDVI crop, flattened `[size * size]`
    pub input: Vec<f32>,
    /// Cultivated mask crop, flattened `[size·scale * size·scale]`
    pub target: Vec<f32>,
    /// Weight crop, flattened `[size·scale * size·scale]`
    pub weight: Vec<f32>,
    /// Name of the source patch (for logging)
    pub source: String,
    /// Side length of the input crop
    pub size: usize,
    /// Scale factor between input and target resolution
    pub scale: usize,
}

/// Extracts patchlets from EO patches
#[derive(Debug, Clone)]
pub struct PatchletSampler {
    /// Side length of the input crop at Sentinel-2 resolution
    pub size: usize,
    /// Number of patchlets to draw per patch
    pub per_patch: usize,
    /// Position selection mode
    pub mode: SamplingMode,
    /// Scale factor between input and target resolution
    pub scale: usize,
}

impl PatchletSampler {
    pub fn new(size: usize, per_patch: usize, mode: SamplingMode, scale: usize) -> Self {
        Self {
            size,
            per_patch,
            mode,
            scale,
        }
    }

    /// Sample patchlets from a single patch.
    ///
    /// In `Systematic` mode at most `per_patch` grid cells are returned; in
    /// `Random` mode exactly `per_patch` positions are drawn from `rng`.
    pub fn sample<R: Rng>(&self, patch: &EoPatch, rng: &mut R) -> Result<Vec<Patchlet>> {
        let (h, w) = patch.s2_size();
        if self.size > h || self.size > w {
            return Err(Ai4EoError::Config(format!(
                "patchlet size {} exceeds patch size {}x{} ('{}')",
                self.size, h, w, patch.name
            )));
        }

        let positions: Vec<(usize, usize)> = match self.mode {
            SamplingMode::Random => (0..self.per_patch)
                .map(|_| {
                    (
                        rng.gen_range(0..=h - self.size),
                        rng.gen_range(0..=w - self.size),
                    )
                })
                .collect(),
            SamplingMode::Systematic => {
                let mut grid = Vec::new();
                let mut row = 0;
                while row + self.size <= h {
                    let mut col = 0;
                    while col + self.size <= w {
                        grid.push((row, col));
                        col += self.size;
                    }
                    row += self.size;
                }
                grid.truncate(self.per_patch);
                grid
            }
        };

        let mut patchlets = Vec::with_capacity(positions.len());
        for (row, col) in positions {
            patchlets.push(self.crop(patch, row, col));
        }
        Ok(patchlets)
    }

    /// Sample patchlets from every patch in a collection.
    pub fn sample_all<R: Rng>(&self, patches: &[EoPatch], rng: &mut R) -> Result<Vec<Patchlet>> {
        let mut out = Vec::with_capacity(patches.len() * self.per_patch);
        for patch in patches {
            out.extend(self.sample(patch, rng)?);
        }
        Ok(out)
    }

    fn crop(&self, patch: &EoPatch, row: usize, col: usize) -> Patchlet {
        let s = self.size;
        let hs = s * self.scale;
        let (hr, hc) = (row * self.scale, col * self.scale);

        let input = patch
            .ndvi
            .slice(s![0, row..row + s, col..col + s, 0])
            .iter()
            .copied()
            .collect();
        let target = patch
            .cultivated
            .slice(s![hr..hr + hs, hc..hc + hs, 0])
            .iter()
            .copied()
            .collect();
        let weight = patch
            .weights
            .slice(s![hr..hr + hs, hc..hc + hs, 0])
            .iter()
            .copied()
            .collect();

        Patchlet {
            input,
            target,
            weight,
            source: patch.name.clone(),
            size: s,
            scale: self.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn make_patch(h: usize, w: usize, scale: usize) -> EoPatch {
        // NDVI pixel (y, x) holds y*w + x so crops are recognizable
        let mut ndvi = Array4::<f32>::zeros((1, h, w, 1));
        for y in 0..h {
            for x in 0..w {
                ndvi[[0, y, x, 0]] = (y * w + x) as f32;
            }
        }
        EoPatch {
            name: "test_patch".to_string(),
            ndvi,
            cultivated: Array3::<f32>::zeros((h * scale, w * scale, 1)),
            weights: Array3::<f32>::ones((h * scale, w * scale, 1)),
        }
    }

    #[test]
    fn test_systematic_grid_is_non_overlapping() {
        let patch = make_patch(8, 8, 2);
        let sampler = PatchletSampler::new(4, 100, SamplingMode::Systematic, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let patchlets = sampler.sample(&patch, &mut rng).unwrap();
        // 8x8 patch with 4x4 crops -> 2x2 grid
        assert_eq!(patchlets.len(), 4);
        // Top-left crop starts at pixel value 0, next column crop at 4
        assert_eq!(patchlets[0].input[0], 0.0);
        assert_eq!(patchlets[1].input[0], 4.0);
    }

    #[test]
    fn test_random_sampling_is_seeded() {
        let patch = make_patch(16, 16, 2);
        let sampler = PatchletSampler::new(4, 5, SamplingMode::Random, 2);

        let mut rng_a = ChaCha8Rng::seed_from_u64(7);
        let mut rng_b = ChaCha8Rng::seed_from_u64(7);
        let a = sampler.sample(&patch, &mut rng_a).unwrap();
        let b = sampler.sample(&patch, &mut rng_b).unwrap();

        for (pa, pb) in a.iter().zip(b.iter()) {
            assert_eq!(pa.input, pb.input);
        }
    }

    #[test]
    fn test_crop_dimensions() {
        let patch = make_patch(8, 8, 4);
        let sampler = PatchletSampler::new(4, 1, SamplingMode::Systematic, 4);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let patchlets = sampler.sample(&patch, &mut rng).unwrap();
        assert_eq!(patchlets[0].input.len(), 16);
        assert_eq!(patchlets[0].target.len(), 256);
        assert_eq!(patchlets[0].weight.len(), 256);
    }

    #[test]
    fn test_oversized_patchlet_fails() {
        let patch = make_patch(8, 8, 2);
        let sampler = PatchletSampler::new(16, 1, SamplingMode::Random, 2);
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        assert!(sampler.sample(&patch, &mut rng).is_err());
    }
}

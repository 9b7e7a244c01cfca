//! Burn Batcher Implementations
//!
//! Assembles samples into device tensors for training. Patchlet batches carry
//! input, target and weight tensors of matching batch cardinality; SR batches
//! carry paired low/high-resolution image tensors.

use burn::data::dataloader::batcher::Batcher;
use burn::prelude::*;

use super::sampling::Patchlet;
use super::sr_pairs::SrPair;

/// A batch of patchlets for the classification pipeline
#[derive(Clone, Debug)]
pub struct PatchletBatch<B: Backend> {
    /// NDVI inputs, shape `[batch, 1, s, s]`
    pub inputs: Tensor<B, 4>,
    /// Cultivated masks, shape `[batch, 1, s·scale, s·scale]`
    pub targets: Tensor<B, 4>,
    /// Per-pixel weights, shape `[batch, 1, s·scale, s·scale]`
    pub weights: Tensor<B, 4>,
}

/// Batcher for patchlet samples
#[derive(Clone, Debug, Default)]
pub struct PatchletBatcher;

impl PatchletBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, Patchlet, PatchletBatch<B>> for PatchletBatcher {
    fn batch(&self, items: Vec<Patchlet>, device: &B::Device) -> PatchletBatch<B> {
        let batch_size = items.len();
        let size = items.first().map(|p| p.size).unwrap_or(0);
        let scale = items.first().map(|p| p.scale).unwrap_or(1);
        let hi = size * scale;

        debug_assert!(
            items.iter().all(|p| p.size == size && p.scale == scale),
            "all patchlets in a batch must share size and scale"
        );

        let inputs_data: Vec<f32> = items.iter().flat_map(|p| p.input.iter().copied()).collect();
        let targets_data: Vec<f32> = items.iter().flat_map(|p| p.target.iter().copied()).collect();
        let weights_data: Vec<f32> = items.iter().flat_map(|p| p.weight.iter().copied()).collect();

        let inputs = Tensor::<B, 4>::from_floats(
            TensorData::new(inputs_data, [batch_size, 1, size, size]),
            device,
        );
        let targets = Tensor::<B, 4>::from_floats(
            TensorData::new(targets_data, [batch_size, 1, hi, hi]),
            device,
        );
        let weights = Tensor::<B, 4>::from_floats(
            TensorData::new(weights_data, [batch_size, 1, hi, hi]),
            device,
        );

        PatchletBatch {
            inputs,
            targets,
            weights,
        }
    }
}

/// A batch of low/high-resolution image pairs
#[derive(Clone, Debug)]
pub struct SrBatch<B: Backend> {
    /// Low-resolution inputs, shape `[batch, c, h, w]`
    pub lowres: Tensor<B, 4>,
    /// High-resolution targets, shape `[batch, 1, H, W]`
    pub highres: Tensor<B, 4>,
}

/// Batcher for super-resolution pairs
///
/// The image geometry is fixed per dataset, so the batcher carries it rather
/// than re-deriving it from every item.
#[derive(Clone, Debug)]
pub struct SrBatcher {
    pub channels: usize,
    pub lowres_size: (usize, usize),
    pub scale: usize,
}

impl SrBatcher {
    pub fn new(channels: usize, lowres_size: (usize, usize), scale: usize) -> Self {
        Self {
            channels,
            lowres_size,
            scale,
        }
    }
}

impl<B: Backend> Batcher<B, SrPair, SrBatch<B>> for SrBatcher {
    fn batch(&self, items: Vec<SrPair>, device: &B::Device) -> SrBatch<B> {
        let batch_size = items.len();
        let (h, w) = self.lowres_size;
        let (hh, hw) = (h * self.scale, w * self.scale);

        let lowres_data: Vec<f32> = items.iter().flat_map(|p| p.lowres.iter().copied()).collect();
        let highres_data: Vec<f32> = items
            .iter()
            .flat_map(|p| p.highres.iter().copied())
            .collect();

        let lowres = Tensor::<B, 4>::from_floats(
            TensorData::new(lowres_data, [batch_size, self.channels, h, w]),
            device,
        );
        let highres = Tensor::<B, 4>::from_floats(
            TensorData::new(highres_data, [batch_size, 1, hh, hw]),
            device,
        );

        SrBatch { lowres, highres }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    type TestBackend = DefaultBackend;

    #[test]
    fn test_patchlet_batch_shapes() {
        let device = Default::default();
        let batcher = PatchletBatcher::new();

        let items: Vec<Patchlet> = (0..3)
            .map(|i| Patchlet {
                input: vec![i as f32; 16],
                target: vec![0.0; 256],
                weight: vec![1.0; 256],
                source: format!("patch_{}", i),
                size: 4,
                scale: 4,
            })
            .collect();

        let batch: PatchletBatch<TestBackend> = batcher.batch(items, &device);
        assert_eq!(batch.inputs.dims(), [3, 1, 4, 4]);
        assert_eq!(batch.targets.dims(), [3, 1, 16, 16]);
        assert_eq!(batch.weights.dims(), [3, 1, 16, 16]);
    }

    #[test]
    fn test_sr_batch_shapes() {
        let device = Default::default();
        let batcher = SrBatcher::new(3, (8, 8), 2);

        let items: Vec<SrPair> = (0..2)
            .map(|_| SrPair {
                lowres: vec![0.5; 3 * 8 * 8],
                highres: vec![0.5; 16 * 16],
            })
            .collect();

        let batch: SrBatch<TestBackend> = batcher.batch(items, &device);
        assert_eq!(batch.lowres.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.highres.dims(), [2, 1, 16, 16]);
    }
}

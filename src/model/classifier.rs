//! Cultivated-Land Classifier
//!
//! Maps a low-resolution NDVI patchlet to a per-pixel cultivated/
//! non-cultivated probability map at the target-mask resolution. Built from
//! the same block set as the super-resolution network: an entry conv, a short
//! residual trunk with a spanning skip, a sub-pixel upscaling chain to reach
//! the mask resolution, and a single-channel sigmoid head.

use burn::{
    config::Config,
    module::Module,
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

use super::blocks::{Activation, ConvBlock, ResidualBlock, SubPixelBlock};
use super::upscale_steps;

/// Configuration for the cultivated-land classifier
#[derive(Config, Debug)]
pub struct CultivatedClassifierConfig {
    /// Number of input channels (1 for the NDVI layer)
    #[config(default = "1")]
    pub input_channels: usize,

    /// Internal channel width
    #[config(default = "32")]
    pub channels: usize,

    /// Number of residual blocks
    #[config(default = "4")]
    pub n_blocks: usize,

    /// Kernel size throughout the network
    #[config(default = "3")]
    pub kernel_size: usize,

    /// Factor between NDVI resolution and mask resolution, one of {2, 4, 8}
    #[config(default = "4")]
    pub scale: usize,
}

impl CultivatedClassifierConfig {
    /// Build the classifier on the given device.
    ///
    /// Fails immediately for an unsupported scale factor.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> crate::utils::error::Result<CultivatedClassifier<B>> {
        let steps = upscale_steps(self.scale)?;

        let entry = ConvBlock::new(
            self.input_channels,
            self.channels,
            self.kernel_size,
            false,
            Activation::PRelu,
            device,
        );

        let residual_blocks = (0..self.n_blocks)
            .map(|_| ResidualBlock::new(self.channels, self.kernel_size, device))
            .collect();

        let mid = ConvBlock::new(
            self.channels,
            self.channels,
            self.kernel_size,
            true,
            Activation::None,
            device,
        );

        let upscale_blocks = (0..steps)
            .map(|_| SubPixelBlock::new(self.channels, self.kernel_size, device))
            .collect();

        let head = ConvBlock::new(
            self.channels,
            1,
            self.kernel_size,
            false,
            Activation::None,
            device,
        );

        Ok(CultivatedClassifier {
            entry,
            residual_blocks,
            mid,
            upscale_blocks,
            head,
            scale: self.scale,
        })
    }
}

/// The cultivated-land classifier
#[derive(Module, Debug)]
pub struct CultivatedClassifier<B: Backend> {
    entry: ConvBlock<B>,
    residual_blocks: Vec<ResidualBlock<B>>,
    mid: ConvBlock<B>,
    upscale_blocks: Vec<SubPixelBlock<B>>,
    head: ConvBlock<B>,
    scale: usize,
}

impl<B: Backend> CultivatedClassifier<B> {
    /// Forward pass.
    ///
    /// `[batch, 1, s, s]` -> `[batch, 1, s·scale, s·scale]` probabilities.
    pub fn forward(&self, ndvi: Tensor<B, 4>) -> Tensor<B, 4> {
        let entry_out = self.entry.forward(ndvi);

        let mut out = entry_out.clone();
        for block in &self.residual_blocks {
            out = block.forward(out);
        }
        let mut out = self.mid.forward(out) + entry_out;

        for block in &self.upscale_blocks {
            out = block.forward(out);
        }

        sigmoid(self.head.forward(out))
    }

    /// The factor between input and output resolution
    pub fn scale(&self) -> usize {
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;

    type TestBackend = DefaultBackend;

    fn tiny_config(scale: usize) -> CultivatedClassifierConfig {
        CultivatedClassifierConfig::new()
            .with_channels(8)
            .with_n_blocks(1)
            .with_scale(scale)
    }

    #[test]
    fn test_output_dims_match_scale_factor() {
        let device = Default::default();
        for scale in [2, 4, 8] {
            let model = tiny_config(scale).init::<TestBackend>(&device).unwrap();
            let input = Tensor::<TestBackend, 4>::zeros([2, 1, 8, 8], &device);
            let output = model.forward(input);
            assert_eq!(output.dims(), [2, 1, 8 * scale, 8 * scale]);
        }
    }

    #[test]
    fn test_invalid_scale_factor_fails_at_construction() {
        let device = Default::default();
        for scale in [3, 5] {
            assert!(tiny_config(scale).init::<TestBackend>(&device).is_err());
        }
    }

    #[test]
    fn test_output_is_probability_map() {
        let device = Default::default();
        let model = tiny_config(2).init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 4>::random(
            [1, 1, 8, 8],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );

        let values: Vec<f32> = model.forward(input).into_data().to_vec().unwrap();
        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}

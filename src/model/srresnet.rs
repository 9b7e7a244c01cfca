//! Super-Resolution Residual Network
//!
//! Maps a low-resolution image batch to a higher-resolution single-channel
//! batch at a fixed integer upscaling factor. Composition, in order: an entry
//! conv block expanding the input channels to the internal width, a chain of
//! residual blocks, one more conv block, an additive skip spanning
//! entry-to-here, a chain of sub-pixel upscaling blocks (one per doubling),
//! and a final conv block reducing to one channel, bounded to [0, 1] by a
//! sigmoid.

use burn::{
    config::Config,
    module::Module,
    tensor::{activation::sigmoid, backend::Backend, Tensor},
};

use super::blocks::{Activation, ConvBlock, ResidualBlock, SubPixelBlock};
use super::upscale_steps;

/// Configuration for the super-resolution network
#[derive(Config, Debug)]
pub struct SrResNetConfig {
    /// Number of input channels (3 for RGB imagery)
    #[config(default = "3")]
    pub input_channels: usize,

    /// Internal channel width of the residual trunk
    #[config(default = "64")]
    pub channels: usize,

    /// Number of residual blocks
    #[config(default = "16")]
    pub n_blocks: usize,

    /// Kernel size of the entry and exit convolutions
    #[config(default = "9")]
    pub large_kernel: usize,

    /// Kernel size inside residual and upscaling blocks
    #[config(default = "3")]
    pub small_kernel: usize,

    /// Total upscaling factor, one of {2, 4, 8}
    #[config(default = "4")]
    pub scale: usize,
}

impl SrResNetConfig {
    /// Build the network on the given device.
    ///
    /// Fails immediately for an unsupported scale factor; no layer is
    /// constructed in that case.
    pub fn init<B: Backend>(&self, device: &B::Device) -> crate::utils::error::Result<SrResNet<B>> {
        let steps = upscale_steps(self.scale)?;

        let entry = ConvBlock::new(
            self.input_channels,
            self.channels,
            self.large_kernel,
            false,
            Activation::PRelu,
            device,
        );

        let residual_blocks = (0..self.n_blocks)
            .map(|_| ResidualBlock::new(self.channels, self.small_kernel, device))
            .collect();

        let mid = ConvBlock::new(
            self.channels,
            self.channels,
            self.small_kernel,
            true,
            Activation::None,
            device,
        );

        let upscale_blocks = (0..steps)
            .map(|_| SubPixelBlock::new(self.channels, self.small_kernel, device))
            .collect();

        let exit = ConvBlock::new(
            self.channels,
            1,
            self.large_kernel,
            false,
            Activation::Tanh,
            device,
        );

        Ok(SrResNet {
            entry,
            residual_blocks,
            mid,
            upscale_blocks,
            exit,
            scale: self.scale,
        })
    }
}

/// The super-resolution network
#[derive(Module, Debug)]
pub struct SrResNet<B: Backend> {
    entry: ConvBlock<B>,
    residual_blocks: Vec<ResidualBlock<B>>,
    mid: ConvBlock<B>,
    upscale_blocks: Vec<SubPixelBlock<B>>,
    exit: ConvBlock<B>,
    scale: usize,
}

impl<B: Backend> SrResNet<B> {
    /// Forward pass.
    ///
    /// `[batch, input_channels, h, w]` -> `[batch, 1, h·scale, w·scale]`,
    /// values in [0, 1].
    pub fn forward(&self, lowres: Tensor<B, 4>) -> Tensor<B, 4> {
        let entry_out = self.entry.forward(lowres);

        let mut out = entry_out.clone();
        for block in &self.residual_blocks {
            out = block.forward(out);
        }
        let mut out = self.mid.forward(out) + entry_out;

        for block in &self.upscale_blocks {
            out = block.forward(out);
        }

        sigmoid(self.exit.forward(out))
    }

    /// The total upscaling factor this network was built for
    pub fn scale(&self) -> usize {
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use burn::record::CompactRecorder;

    type TestBackend = DefaultBackend;

    fn tiny_config(scale: usize) -> SrResNetConfig {
        SrResNetConfig::new()
            .with_input_channels(3)
            .with_channels(8)
            .with_n_blocks(1)
            .with_large_kernel(3)
            .with_small_kernel(3)
            .with_scale(scale)
    }

    #[test]
    fn test_output_dims_match_scale_factor() {
        let device = Default::default();
        for scale in [2, 4, 8] {
            let model = tiny_config(scale).init::<TestBackend>(&device).unwrap();
            let input = Tensor::<TestBackend, 4>::zeros([1, 3, 6, 6], &device);
            let output = model.forward(input);
            assert_eq!(output.dims(), [1, 1, 6 * scale, 6 * scale]);
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
    fn test_output_is_bounded() {
        let device = Default::default();
        let model = tiny_config(2).init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 4, 4],
            burn::tensor::Distribution::Uniform(-10.0, 10.0),
            &device,
        );

        let values: Vec<f32> = model.forward(input).into_data().to_vec().unwrap();
        assert!(values.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_snapshot_round_trip_reproduces_output() {
        let device = Default::default();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("model");

        let model = tiny_config(2).init::<TestBackend>(&device).unwrap();
        let input = Tensor::<TestBackend, 4>::random(
            [1, 3, 4, 4],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let before: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();

        let recorder = CompactRecorder::new();
        model.clone().save_file(&path, &recorder).unwrap();

        let reloaded = tiny_config(2)
            .init::<TestBackend>(&device)
            .unwrap()
            .load_file(&path, &recorder, &device)
            .unwrap();
        let after: Vec<f32> = reloaded.forward(input).into_data().to_vec().unwrap();

        assert_eq!(before, after);
    }
}

//! Network Building Blocks
//!
//! The closed set of block variants both architectures are composed from:
//!
//! - `ConvBlock`: learned spatial filter, optional batch normalization,
//!   optionally one of three fixed non-linearities
//! - `ResidualBlock`: two conv blocks with an additive skip connection
//! - `SubPixelBlock`: channel expansion followed by channel-to-space
//!   rearrangement, doubling both spatial dimensions
//!
//! The configuration of every block is fixed at construction.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, LeakyRelu, LeakyReluConfig, PRelu, PReluConfig,
        PaddingConfig2d, Tanh,
    },
    tensor::{backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

/// The fixed activation bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// No non-linearity
    None,
    /// Parametric rectified linear unit
    PRelu,
    /// Leaky rectified linear unit with slope 0.2
    LeakyRelu,
    /// Saturating tanh
    Tanh,
}

/// Convolution with `kernel/2` padding, optional batch norm and activation
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    conv: Conv2d<B>,
    norm: Option<BatchNorm<B, 2>>,
    prelu: Option<PRelu<B>>,
    leaky: Option<LeakyRelu>,
    tanh: Option<Tanh>,
}

impl<B: Backend> ConvBlock<B> {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        batch_norm: bool,
        activation: Activation,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Explicit(
                kernel_size / 2,
                kernel_size / 2,
            ))
            .init(device);

        let norm = if batch_norm {
            Some(BatchNormConfig::new(out_channels).init(device))
        } else {
            None
        };

        let (prelu, leaky, tanh) = match activation {
            Activation::None => (None, None, None),
            Activation::PRelu => (Some(PReluConfig::new().init(device)), None, None),
            Activation::LeakyRelu => (
                None,
                Some(LeakyReluConfig::new().with_negative_slope(0.2).init()),
                None,
            ),
            Activation::Tanh => (None, None, Some(Tanh::new())),
        };

        Self {
            conv,
            norm,
            prelu,
            leaky,
            tanh,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };
        let x = match &self.prelu {
            Some(act) => act.forward(x),
            None => x,
        };
        let x = match &self.leaky {
            Some(act) => act.forward(x),
            None => x,
        };
        match &self.tanh {
            Some(act) => act.forward(x),
            None => x,
        }
    }
}

/// Two conv blocks with an additive skip from the block's input to its output
#[derive(Module, Debug)]
pub struct ResidualBlock<B: Backend> {
    conv1: ConvBlock<B>,
    conv2: ConvBlock<B>,
}

impl<B: Backend> ResidualBlock<B> {
    /// Channel count is preserved so the skip addition is well-defined.
    pub fn new(channels: usize, kernel_size: usize, device: &B::Device) -> Self {
        Self {
            conv1: ConvBlock::new(
                channels,
                channels,
                kernel_size,
                true,
                Activation::PRelu,
                device,
            ),
            conv2: ConvBlock::new(
                channels,
                channels,
                kernel_size,
                true,
                Activation::None,
                device,
            ),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let residual = x.clone();
        let out = self.conv1.forward(x);
        let out = self.conv2.forward(out);
        out + residual
    }
}

/// Sub-pixel upscaling: expand channels by 4, rearrange channel capacity into
/// a 2x larger spatial grid, then apply PReLU
#[derive(Module, Debug)]
pub struct SubPixelBlock<B: Backend> {
    conv: Conv2d<B>,
    prelu: PRelu<B>,
    factor: usize,
}

impl<B: Backend> SubPixelBlock<B> {
    pub fn new(channels: usize, kernel_size: usize, device: &B::Device) -> Self {
        let factor = 2;
        let conv = Conv2dConfig::new(
            [channels, channels * factor * factor],
            [kernel_size, kernel_size],
        )
        .with_padding(PaddingConfig2d::Explicit(
            kernel_size / 2,
            kernel_size / 2,
        ))
        .init(device);

        Self {
            conv,
            prelu: PReluConfig::new().init(device),
            factor,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let out = self.conv.forward(x);
        let out = pixel_shuffle(out, self.factor);
        self.prelu.forward(out)
    }
}

/// Channel-to-space rearrangement.
///
/// `[b, c·r², h, w]` becomes `[b, c, h·r, w·r]`, with each group of `r²`
/// channels forming an `r x r` spatial block.
pub fn pixel_shuffle<B: Backend>(x: Tensor<B, 4>, factor: usize) -> Tensor<B, 4> {
    let [b, c, h, w] = x.dims();
    let c_out = c / (factor * factor);
    debug_assert_eq!(
        c_out * factor * factor,
        c,
        "channel count must be divisible by factor^2"
    );

    x.reshape([b, c_out, factor, factor, h, w])
        .permute([0, 1, 4, 2, 5, 3])
        .reshape([b, c_out, h * factor, w * factor])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DefaultBackend;
    use burn::tensor::TensorData;

    type TestBackend = DefaultBackend;

    #[test]
    fn test_conv_block_preserves_spatial_dims() {
        let device = Default::default();
        for kernel in [3, 5, 9] {
            let block =
                ConvBlock::<TestBackend>::new(1, 8, kernel, true, Activation::PRelu, &device);
            let input = Tensor::<TestBackend, 4>::zeros([2, 1, 16, 16], &device);
            assert_eq!(block.forward(input).dims(), [2, 8, 16, 16]);
        }
    }

    #[test]
    fn test_residual_block_preserves_shape() {
        let device = Default::default();
        let block = ResidualBlock::<TestBackend>::new(8, 3, &device);
        let input = Tensor::<TestBackend, 4>::zeros([1, 8, 12, 12], &device);
        assert_eq!(block.forward(input).dims(), [1, 8, 12, 12]);
    }

    #[test]
    fn test_sub_pixel_block_doubles_spatial_dims() {
        let device = Default::default();
        let block = SubPixelBlock::<TestBackend>::new(8, 3, &device);
        let input = Tensor::<TestBackend, 4>::zeros([1, 8, 10, 10], &device);
        assert_eq!(block.forward(input).dims(), [1, 8, 20, 20]);
    }

    #[test]
    fn test_pixel_shuffle_rearrangement() {
        let device = Default::default();
        // Four channels of a single pixel become a 2x2 spatial block
        let input = Tensor::<TestBackend, 4>::from_floats(
            TensorData::new(vec![0.0f32, 1.0, 2.0, 3.0], [1, 4, 1, 1]),
            &device,
        );
        let output = pixel_shuffle(input, 2);
        assert_eq!(output.dims(), [1, 1, 2, 2]);

        let values: Vec<f32> = output.into_data().to_vec().unwrap();
        assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]);
    }
}

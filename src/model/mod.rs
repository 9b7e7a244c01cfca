//! Model architectures built with Burn
//!
//! Both networks are composed from one small, closed set of block variants
//! defined in `blocks`: convolutional filter, batch normalization, a fixed
//! activation bank, additive skip connections, and sub-pixel upscaling.
//!
//! - `srresnet`: the super-resolution residual network
//! - `classifier`: the cultivated-land classifier, which maps low-resolution
//!   NDVI patchlets to higher-resolution probability maps using the same
//!   block vocabulary

pub mod blocks;
pub mod classifier;
pub mod srresnet;

pub use blocks::{Activation, ConvBlock, ResidualBlock, SubPixelBlock};
pub use classifier::{CultivatedClassifier, CultivatedClassifierConfig};
pub use srresnet::{SrResNet, SrResNetConfig};

use crate::utils::error::{Ai4EoError, Result};
use crate::SUPPORTED_SCALE_FACTORS;

/// Number of sub-pixel doubling steps needed for a total scale factor.
///
/// Each upscaling block doubles both spatial dimensions, so the factor must be
/// a power of two from the supported set; anything else is a configuration
/// error raised before any layer is constructed.
pub fn upscale_steps(scale: usize) -> Result<usize> {
    match scale {
        2 => Ok(1),
        4 => Ok(2),
        8 => Ok(3),
        other => Err(Ai4EoError::Config(format!(
            "scale factor must be one of {:?}, got {}",
            SUPPORTED_SCALE_FACTORS, other
        ))),
    }
}

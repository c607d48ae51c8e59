use image::{imageops, imageops::FilterType, DynamicImage, ImageError, ImageReader};
use ndarray::{Array, Ix4};
use serde::Deserialize;
use std::{io, path::Path};
use thiserror::Error;

/// Side length of the square input the classifier was trained on.
pub const INPUT_SIZE: u32 = 224;
pub const CHANNELS: usize = 3;

/// NHWC tensor of shape `(1, INPUT_SIZE, INPUT_SIZE, CHANNELS)`.
pub type PreprocessedTensor = Array<f32, Ix4>;

const CAFFE_MEAN_BGR: [f32; 3] = [103.939, 116.779, 123.68];
const TORCH_MEAN_RGB: [f32; 3] = [0.485, 0.456, 0.406];
const TORCH_STD_RGB: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("failed to read image file: {0}")]
    Read(#[from] io::Error),
    #[error("failed to decode image: {0}")]
    Decode(#[from] ImageError),
}

/// Input normalization applied after pixel values are scaled to `[0, 1]`.
///
/// Each mode mirrors Keras' `preprocess_input` for the matching backbone,
/// applied to the already scaled tensor. The classifier shipped with the
/// service is a VGG19 fine-tune, hence `Caffe` by default.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Normalization {
    /// RGB to BGR, then subtract the ImageNet channel means (0-255 scale).
    #[default]
    Caffe,
    /// `x / 127.5 - 1`.
    Tf,
    /// `x / 255`, then ImageNet mean/std per channel.
    Torch,
    None,
}

impl Normalization {
    /// Maps an RGB channel index to its position in the model input.
    pub fn output_channel(&self, rgb_channel: usize) -> usize {
        match self {
            Normalization::Caffe => CHANNELS - 1 - rgb_channel,
            _ => rgb_channel,
        }
    }

    /// Normalizes a single `[0, 1]` value read from `rgb_channel`.
    pub fn apply(&self, rgb_channel: usize, value: f32) -> f32 {
        match self {
            Normalization::Caffe => value - CAFFE_MEAN_BGR[self.output_channel(rgb_channel)],
            Normalization::Tf => value / 127.5 - 1.0,
            Normalization::Torch => {
                (value / 255.0 - TORCH_MEAN_RGB[rgb_channel]) / TORCH_STD_RGB[rgb_channel]
            }
            Normalization::None => value,
        }
    }

    /// Closed range every normalized value falls in.
    pub fn bounds(&self) -> (f32, f32) {
        // every mode is increasing in `value`, so the extremes sit at 0 and 1
        (0..CHANNELS).fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), c| {
            (lo.min(self.apply(c, 0.0)), hi.max(self.apply(c, 1.0)))
        })
    }
}

pub fn load_image(path: &Path) -> Result<DynamicImage, PreprocessError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image)
}

/// Stretches the image to `INPUT_SIZE` squared and builds the model input.
///
/// The image is flattened to 8-bit RGB before resizing and sampled with
/// nearest-neighbour, the same way the training data loader read files.
pub fn transform_image(image: &DynamicImage, normalization: Normalization) -> PreprocessedTensor {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Nearest);

    let size = INPUT_SIZE as usize;
    let mut input = Array::zeros((1, size, size, CHANNELS));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        for (c, value) in pixel.0.iter().enumerate() {
            let scaled = (*value as f32) / 255.;
            input[[0, y, x, normalization.output_channel(c)]] = normalization.apply(c, scaled);
        }
    }

    input
}

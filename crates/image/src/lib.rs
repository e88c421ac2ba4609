// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

/*!

## Sightline - Frames and Preprocessing

The `sightline_image` crate turns raw visual frames into the fixed-shape
tensor a detection model expects. Frames reach the pipeline through the
[`FrameSource`] trait, which camera, file and stream collaborators implement;
[`TensorImage`] is the in-memory implementation used by tests and by callers
that already hold decoded pixels.

Preprocessing resizes the frame with a bilinear filter, normalises the
channel layout to the one requested by the model, scales every value from
`[0, 255]` to `[0, 1]` and prepends a batch dimension of one.

## Examples

```rust
# use sightline_image::{Preprocessor, TensorImage, RGB};
# use sightline_tensor::TensorTrait as _;
# fn main() -> Result<(), sightline_image::Error> {
let frame = TensorImage::new(1280, 720, RGB)?;
let mut preprocessor = Preprocessor::new();
let input = preprocessor.preprocess(&frame, [640, 640, 3])?;
assert_eq!(input.shape(), &[1, 640, 640, 3]);
# Ok(())
# }
```
*/

use four_char_code::four_char_code;
use sightline_tensor::{Tensor, TensorTrait as _};
use std::fmt::Display;

pub use cpu::{Preprocessor, preprocess};
pub use error::{Error, Result};
pub use four_char_code::FourCharCode;

mod cpu;
mod error;

/// 8 bit RGBA
pub const RGBA: FourCharCode = four_char_code!("RGBA");
/// 8 bit RGB
pub const RGB: FourCharCode = four_char_code!("RGB ");
/// 8 bit grayscale, full range
pub const GREY: FourCharCode = four_char_code!("Y800");

/// A visual frame exposing its pixel dimensions and interleaved pixel data.
pub trait FrameSource {
    fn width(&self) -> usize;

    fn height(&self) -> usize;

    fn fourcc(&self) -> FourCharCode;

    /// Reads the frame as tightly packed rows of interleaved channels.
    fn read_pixels(&self) -> Result<&[u8]>;

    fn channels(&self) -> Result<usize> {
        fourcc_channels(self.fourcc())
    }
}

/// An image represented as a tensor with associated format information.
#[derive(Debug)]
pub struct TensorImage {
    tensor: Tensor<u8>,
    fourcc: FourCharCode,
}

impl TensorImage {
    /// Creates a new zero-filled `TensorImage` with the specified width,
    /// height and format.
    ///
    /// # Examples
    /// ```rust
    /// use sightline_image::{RGB, TensorImage};
    /// # fn main() -> Result<(), sightline_image::Error> {
    /// let img = TensorImage::new(640, 480, RGB)?;
    /// assert_eq!(img.width(), 640);
    /// assert_eq!(img.height(), 480);
    /// assert_eq!(img.fourcc(), RGB);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(width: usize, height: usize, fourcc: FourCharCode) -> Result<Self> {
        let channels = fourcc_channels(fourcc)?;
        let tensor = Tensor::new(&[height, width, channels], Some("frame"))?;
        Ok(Self { tensor, fourcc })
    }

    /// Creates a new `TensorImage` from an existing `[height, width,
    /// channels]` tensor and specified format.
    pub fn from_tensor(tensor: Tensor<u8>, fourcc: FourCharCode) -> Result<Self> {
        let shape = tensor.shape();
        if shape.len() != 3 {
            return Err(Error::InvalidShape(format!(
                "Tensor shape must have 3 dimensions, got {}: {:?}",
                shape.len(),
                shape
            )));
        }

        if fourcc_channels(fourcc)? != shape[2] {
            return Err(Error::InvalidShape(format!(
                "Invalid tensor shape {:?} for format {}",
                shape,
                fourcc.to_string()
            )));
        }

        Ok(Self { tensor, fourcc })
    }

    /// Wraps packed interleaved pixels.
    pub fn from_pixels(
        width: usize,
        height: usize,
        fourcc: FourCharCode,
        pixels: Vec<u8>,
    ) -> Result<Self> {
        let channels = fourcc_channels(fourcc)?;
        let tensor = Tensor::from_vec(pixels, &[height, width, channels], Some("frame"))?;
        Ok(Self { tensor, fourcc })
    }

    pub fn width(&self) -> usize {
        self.tensor.shape()[1]
    }

    pub fn height(&self) -> usize {
        self.tensor.shape()[0]
    }

    pub fn channels(&self) -> usize {
        self.tensor.shape()[2]
    }

    pub fn fourcc(&self) -> FourCharCode {
        self.fourcc
    }

    pub fn row_stride(&self) -> usize {
        self.width() * self.channels()
    }

    pub fn tensor(&self) -> &Tensor<u8> {
        &self.tensor
    }

    pub fn tensor_mut(&mut self) -> &mut Tensor<u8> {
        &mut self.tensor
    }
}

impl FrameSource for TensorImage {
    fn width(&self) -> usize {
        TensorImage::width(self)
    }

    fn height(&self) -> usize {
        TensorImage::height(self)
    }

    fn fourcc(&self) -> FourCharCode {
        self.fourcc
    }

    fn read_pixels(&self) -> Result<&[u8]> {
        Ok(self.tensor.map().into_slice())
    }
}

pub fn fourcc_channels(fourcc: FourCharCode) -> Result<usize> {
    match fourcc {
        RGBA => Ok(4),
        RGB => Ok(3),
        GREY => Ok(1),
        _ => Err(Error::NotSupported(format!(
            "Unsupported fourcc: {}",
            fourcc.to_string()
        ))),
    }
}

pub(crate) struct FunctionTimer<T: Display> {
    name: T,
    start: std::time::Instant,
}

impl<T: Display> FunctionTimer<T> {
    pub fn new(name: T) -> Self {
        Self {
            name,
            start: std::time::Instant::now(),
        }
    }
}

impl<T: Display> Drop for FunctionTimer<T> {
    fn drop(&mut self) {
        log::trace!("{} elapsed: {:?}", self.name, self.start.elapsed())
    }
}

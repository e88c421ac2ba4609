// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{Error, FrameSource, FunctionTimer, Result, fourcc_channels};
use log::trace;
use sightline_tensor::{Tensor, TensorTrait};
use std::borrow::Cow;

/// Preprocessor turns frames into normalised `[1, height, width, channels]`
/// model input tensors using the CPU resizer.
pub struct Preprocessor {
    resizer: fast_image_resize::Resizer,
    options: fast_image_resize::ResizeOptions,
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Preprocessor {
    pub fn new() -> Self {
        let resizer = fast_image_resize::Resizer::new();
        let options = fast_image_resize::ResizeOptions::new()
            .resize_alg(fast_image_resize::ResizeAlg::Convolution(
                fast_image_resize::FilterType::Bilinear,
            ))
            .use_alpha(false);
        Self { resizer, options }
    }

    pub fn new_nearest() -> Self {
        let resizer = fast_image_resize::Resizer::new();
        let options = fast_image_resize::ResizeOptions::new()
            .resize_alg(fast_image_resize::ResizeAlg::Nearest)
            .use_alpha(false);
        Self { resizer, options }
    }

    /// Resizes `frame` to `shape = [height, width, channels]`, converts it
    /// to the requested channel layout and scales every value into `[0, 1]`.
    ///
    /// The returned tensor has shape `[1, height, width, channels]`. Any
    /// intermediate resize buffer is released before returning.
    pub fn preprocess<F>(&mut self, frame: &F, shape: [usize; 3]) -> Result<Tensor<f32>>
    where
        F: FrameSource + ?Sized,
    {
        let _timer = FunctionTimer::new("Preprocessor::preprocess");
        let [height, width, channels] = shape;
        let (src_width, src_height) = (frame.width(), frame.height());

        if src_width == 0 || src_height == 0 {
            return Err(Error::InvalidInput(format!(
                "frame has zero extent {}x{}",
                src_width, src_height
            )));
        }

        if width == 0 || height == 0 {
            return Err(Error::InvalidInput(format!(
                "target shape has zero extent {:?}",
                shape
            )));
        }

        if !matches!(channels, 1 | 3 | 4) {
            return Err(Error::InvalidInput(format!(
                "unsupported target channel count {}",
                channels
            )));
        }

        let src_channels =
            fourcc_channels(frame.fourcc()).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let pixels = frame.read_pixels()?;
        let expected = src_width * src_height * src_channels;
        if pixels.len() != expected {
            return Err(Error::InvalidInput(format!(
                "frame {}x{} {} expects {} bytes but {} were read",
                src_width,
                src_height,
                frame.fourcc().to_string(),
                expected,
                pixels.len()
            )));
        }

        let resized: Cow<'_, [u8]> = if (src_width, src_height) == (width, height) {
            Cow::Borrowed(pixels)
        } else {
            Cow::Owned(self.resize(
                pixels,
                (src_width, src_height),
                (width, height),
                src_channels,
            )?)
        };

        let mut tensor = Tensor::<f32>::new(&[1, height, width, channels], Some("input"))?;
        {
            let mut map = tensor.map_mut();
            normalize(&resized, src_channels, map.as_mut_slice(), channels);
        }

        trace!(
            "preprocessed {}x{}x{} into {:?}",
            src_width,
            src_height,
            src_channels,
            tensor.shape()
        );
        Ok(tensor)
    }

    fn resize(
        &mut self,
        pixels: &[u8],
        (src_width, src_height): (usize, usize),
        (width, height): (usize, usize),
        channels: usize,
    ) -> Result<Vec<u8>> {
        let pixel_type = match channels {
            1 => fast_image_resize::PixelType::U8,
            3 => fast_image_resize::PixelType::U8x3,
            4 => fast_image_resize::PixelType::U8x4,
            _ => {
                return Err(Error::NotSupported(format!(
                    "cannot resize {} channel images",
                    channels
                )));
            }
        };

        let src_view = fast_image_resize::images::ImageRef::new(
            src_width as u32,
            src_height as u32,
            pixels,
            pixel_type,
        )?;
        let mut dst_view =
            fast_image_resize::images::Image::new(width as u32, height as u32, pixel_type);
        self.resizer
            .resize(&src_view, &mut dst_view, &self.options)?;
        Ok(dst_view.into_vec())
    }
}

/// Preprocesses a single frame with a one-shot bilinear [`Preprocessor`].
pub fn preprocess<F>(frame: &F, shape: [usize; 3]) -> Result<Tensor<f32>>
where
    F: FrameSource + ?Sized,
{
    Preprocessor::new().preprocess(frame, shape)
}

const SCALE: f32 = 255.0;

fn luma(rgb: &[u8]) -> f32 {
    (0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32) / SCALE
}

fn normalize(src: &[u8], src_channels: usize, dst: &mut [f32], dst_channels: usize) {
    src.chunks_exact(src_channels)
        .zip(dst.chunks_exact_mut(dst_channels))
        .for_each(|(s, d)| match (src_channels, dst_channels) {
            (a, b) if a == b => d
                .iter_mut()
                .zip(s)
                .for_each(|(d, s)| *d = *s as f32 / SCALE),
            (1, _) => {
                d[..3.min(dst_channels)].fill(s[0] as f32 / SCALE);
                if dst_channels == 4 {
                    d[3] = 1.0;
                }
            }
            (_, 1) => d[0] = luma(s),
            (3, 4) => {
                d[..3]
                    .iter_mut()
                    .zip(s)
                    .for_each(|(d, s)| *d = *s as f32 / SCALE);
                d[3] = 1.0;
            }
            _ => d
                .iter_mut()
                .zip(s)
                .for_each(|(d, s)| *d = *s as f32 / SCALE),
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GREY, RGB, RGBA, TensorImage};
    use four_char_code::FourCharCode;
    use sightline_tensor::TensorMapTrait as _;

    struct RawFrame {
        width: usize,
        height: usize,
        fourcc: FourCharCode,
        pixels: Vec<u8>,
    }

    impl FrameSource for RawFrame {
        fn width(&self) -> usize {
            self.width
        }

        fn height(&self) -> usize {
            self.height
        }

        fn fourcc(&self) -> FourCharCode {
            self.fourcc
        }

        fn read_pixels(&self) -> Result<&[u8]> {
            Ok(&self.pixels)
        }
    }

    fn filled(width: usize, height: usize, fourcc: FourCharCode, pixel: &[u8]) -> TensorImage {
        let pixels = pixel.repeat(width * height);
        TensorImage::from_pixels(width, height, fourcc, pixels).unwrap()
    }

    #[test]
    fn test_preprocess_shape_and_scale() {
        let frame = filled(8, 6, RGB, &[255, 0, 51]);
        let tensor = preprocess(&frame, [6, 8, 3]).unwrap();
        assert_eq!(tensor.shape(), &[1, 6, 8, 3]);

        let map = tensor.map();
        assert_eq!(map.len(), 6 * 8 * 3);
        for px in map.chunks_exact(3) {
            assert_eq!(px[0], 1.0);
            assert_eq!(px[1], 0.0);
            assert!((px[2] - 0.2).abs() < 1e-6);
        }
    }

    #[test]
    fn test_preprocess_resize_uniform() {
        let frame = filled(64, 48, RGB, &[200, 100, 50]);
        let mut preprocessor = Preprocessor::new();
        let tensor = preprocessor.preprocess(&frame, [32, 40, 3]).unwrap();
        assert_eq!(tensor.shape(), &[1, 32, 40, 3]);

        let tolerance = 2.0 / 255.0;
        for px in tensor.map().chunks_exact(3) {
            assert!((px[0] - 200.0 / 255.0).abs() <= tolerance);
            assert!((px[1] - 100.0 / 255.0).abs() <= tolerance);
            assert!((px[2] - 50.0 / 255.0).abs() <= tolerance);
        }
        assert!(tensor.map().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_preprocess_nearest_upscale() {
        let frame = filled(2, 2, GREY, &[128]);
        let mut preprocessor = Preprocessor::new_nearest();
        let tensor = preprocessor.preprocess(&frame, [4, 4, 1]).unwrap();
        assert_eq!(tensor.shape(), &[1, 4, 4, 1]);
        assert!(tensor.map().iter().all(|v| *v == 128.0 / 255.0));
    }

    #[test]
    fn test_preprocess_rgba_to_rgb() {
        let frame = filled(4, 4, RGBA, &[255, 0, 255, 7]);
        let tensor = preprocess(&frame, [4, 4, 3]).unwrap();
        for px in tensor.map().chunks_exact(3) {
            assert_eq!(px, &[1.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn test_preprocess_grey_to_rgb() {
        let frame = filled(4, 4, GREY, &[255]);
        let tensor = preprocess(&frame, [4, 4, 3]).unwrap();
        assert!(tensor.map().iter().all(|v| *v == 1.0));

        let tensor = preprocess(&frame, [4, 4, 4]).unwrap();
        assert!(tensor.map().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_preprocess_rgb_to_grey() {
        let frame = filled(4, 4, RGB, &[255, 255, 255]);
        let tensor = preprocess(&frame, [4, 4, 1]).unwrap();
        assert_eq!(tensor.shape(), &[1, 4, 4, 1]);
        assert!(tensor.map().iter().all(|v| (v - 1.0).abs() < 1e-5));

        let frame = filled(4, 4, RGB, &[0, 255, 0]);
        let tensor = preprocess(&frame, [4, 4, 1]).unwrap();
        assert!(tensor.map().iter().all(|v| (v - 0.587).abs() < 1e-5));
    }

    #[test]
    fn test_preprocess_zero_frame() {
        let frame = RawFrame {
            width: 0,
            height: 480,
            fourcc: RGB,
            pixels: Vec::new(),
        };
        let result = preprocess(&frame, [640, 640, 3]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_preprocess_invalid_target() {
        let frame = filled(4, 4, RGB, &[0, 0, 0]);
        assert!(matches!(
            preprocess(&frame, [0, 4, 3]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            preprocess(&frame, [4, 4, 2]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_preprocess_short_buffer() {
        let frame = RawFrame {
            width: 4,
            height: 4,
            fourcc: RGB,
            pixels: vec![0; 4 * 4 * 3 - 3],
        };
        let result = preprocess(&frame, [4, 4, 3]);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("RGB"), "{}", message);
        assert!(message.contains("expects 48 bytes but 45 were read"), "{}", message);
    }
}

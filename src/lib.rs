// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

/*!
## Sightline

Sightline turns video frames into tracked object detections. Each frame
passes through four stages:

1. the [`Preprocessor`] resizes it to the model input and normalizes the
   pixels to `[0, 1]`,
2. a [`Model`] runs inference,
3. the [`Decoder`] turns the raw output into detections in frame pixel
   space and suppresses duplicates,
4. the [`CentroidTracker`] assigns each detection a persistent identity.

The inference runtime is not part of this crate. Implement [`Model`] for it
and hand it to a [`PipelineBuilder`].

```rust
use sightline::{
    DecoderConfig, Model, OutputFormat, PipelineBuilder, PipelineConfig, Tensor, TensorImage,
    RGB,
};

struct FixedModel;

impl Model for FixedModel {
    fn input_shape(&self) -> &[usize] {
        &[1, 32, 32, 3]
    }

    fn output_shape(&self) -> &[usize] {
        &[1, 1, 6]
    }

    fn execute(&mut self, _: &Tensor<f32>) -> sightline::Result<Tensor<f32>> {
        // one candidate centered at (16, 16), 8x8 in model space
        let row = vec![16.0, 16.0, 8.0, 8.0, 0.1, 0.9];
        Ok(Tensor::from_vec(row, &[1, 1, 6], None)?)
    }
}

# fn main() -> sightline::Result<()> {
let mut config = PipelineConfig::new(DecoderConfig::new(OutputFormat::Anchorless, vec![1, 1, 6]));
config.output.class_names = vec!["person".to_string(), "car".to_string()];
let mut pipeline = PipelineBuilder::new(FixedModel).with_config(config).build()?;

let frame = TensorImage::new(64, 64, RGB)?;
let result = pipeline.process(&frame, 0)?;
assert_eq!(result.detections.len(), 1);
assert_eq!(result.detections[0].class_name, "car");
assert_eq!(result.detections[0].bbox.x, 24.0);
assert_eq!(result.tracks[0].id, 0);
# Ok(())
# }
```
*/

mod config;
mod error;
mod pipeline;
mod stats;

pub use sightline_decoder as decoder;
pub use sightline_image as image;
pub use sightline_tensor as tensor;
pub use sightline_tracker as tracker;

pub use config::{PipelineConfig, ResizeFilter};
pub use error::{Error, Result};
pub use pipeline::{FrameResult, Model, Pipeline, PipelineBuilder, SharedPipeline};
pub use stats::{Statistics, class_counts, top_classes};

pub use sightline_decoder::{
    BoundingBox, Decoder, DecoderBuilder, DecoderConfig, Detection, OutputFormat,
};
pub use sightline_image::{FourCharCode, FrameSource, GREY, Preprocessor, RGB, RGBA, TensorImage};
pub use sightline_tensor::{Tensor, TensorMapTrait, TensorTrait};
pub use sightline_tracker::{
    CentroidTracker, CentroidTrackerBuilder, Track, TrackState, Tracker, TrackerConfig,
};

#[cfg(test)]
mod tests {
    #[ctor::ctor]
    fn init() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }
}

// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

/*!
## Sightline - Decoders

`sightline_decoder` interprets the raw output of an object-detection model
as a list of [`Detection`]s and removes duplicate detections of the same
region with greedy non-maximum suppression.

The raw output is a flat buffer of `N` candidate rows. Each row holds a box
in `(center_x, center_y, width, height)` form followed by the class scores,
optionally preceded by an objectness score. The layout is selected up front
through [`OutputFormat`] rather than guessed from the data.

```rust
# use sightline_decoder::{DecoderBuilder, DecoderConfig, OutputFormat};
# fn main() -> sightline_decoder::Result<()> {
let decoder = DecoderBuilder::new()
    .with_config(DecoderConfig::new(OutputFormat::Anchorless, vec![2, 6]))
    .with_class_names(vec!["person".to_string(), "car".to_string()])
    .with_iou_threshold(0.5)
    .build()?;

let raw = [
    35.0, 35.0, 50.0, 50.0, 0.9, 0.0, //
    37.0, 37.0, 50.0, 50.0, 0.95, 0.0,
];
let detections = decoder.decode(&raw)?;
assert_eq!(detections.len(), 1);
assert_eq!(detections[0].class_name, "person");
assert_eq!(detections[0].confidence, 0.95);
# Ok(())
# }
```
*/

pub mod float;
pub mod nms;

mod decoder;
mod error;

pub use decoder::{Decoder, DecoderBuilder, DecoderConfig, OutputFormat};
pub use error::{Error, Result};
pub use float::decode;
pub use nms::{iou, suppress, suppress_class_aware};

/// Axis-aligned box in pixel space, stored as top-left corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingBox {
    /// left-most coordinate of the box
    pub x: f32,
    /// top-most coordinate of the box
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a box from its center point and extent.
    pub fn from_center(center_x: f32, center_y: f32, width: f32, height: f32) -> Self {
        Self {
            x: center_x - width / 2.0,
            y: center_y - height / 2.0,
            width,
            height,
        }
    }

    pub fn centroid(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Returns the box as `[xmin, ymin, xmax, ymax]`.
    pub fn to_xyxy(&self) -> [f32; 4] {
        [
            self.x,
            self.y,
            self.x + self.width,
            self.y + self.height,
        ]
    }

    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(arr: [f32; 4]) -> Self {
        BoundingBox {
            x: arr[0],
            y: arr[1],
            width: arr[2],
            height: arr[3],
        }
    }
}

/// A single decoded detection. Produced fresh for every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// label index for this detection
    pub class_id: usize,
    pub class_name: String,
    /// model-specific score for this detection, in `[0, 1]`
    pub confidence: f32,
}

impl Detection {
    /// Maps the detection from model-input pixel space into frame space,
    /// clamping the box to `[0, frame_width] x [0, frame_height]`.
    ///
    /// Returns `None` when the clamped box has no area left.
    pub fn rescaled(
        &self,
        x_scale: f32,
        y_scale: f32,
        frame_width: f32,
        frame_height: f32,
    ) -> Option<Detection> {
        let [xmin, ymin, xmax, ymax] = self.bbox.to_xyxy();
        let xmin = (xmin * x_scale).clamp(0.0, frame_width);
        let xmax = (xmax * x_scale).clamp(0.0, frame_width);
        let ymin = (ymin * y_scale).clamp(0.0, frame_height);
        let ymax = (ymax * y_scale).clamp(0.0, frame_height);

        let bbox = BoundingBox::new(xmin, ymin, xmax - xmin, ymax - ymin);
        if bbox.is_degenerate() {
            return None;
        }

        Some(Detection {
            bbox,
            class_id: self.class_id,
            class_name: self.class_name.clone(),
            confidence: self.confidence,
        })
    }

    /// Check if one detection is equal to another detection, within the
    /// given delta
    pub fn equal_within_delta(&self, rhs: &Detection, delta: f32) -> bool {
        let eq_delta = |a: f32, b: f32| (a - b).abs() <= delta;
        self.class_id == rhs.class_id
            && eq_delta(self.confidence, rhs.confidence)
            && eq_delta(self.bbox.x, rhs.bbox.x)
            && eq_delta(self.bbox.y, rhs.bbox.y)
            && eq_delta(self.bbox.width, rhs.bbox.width)
            && eq_delta(self.bbox.height, rhs.bbox.height)
    }
}

/// Looks up the display name of `class_id`, falling back to `unknown_<id>`
/// when the name list is shorter than the class segment.
pub fn class_name(class_names: &[String], class_id: usize) -> String {
    class_names
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("unknown_{}", class_id))
}

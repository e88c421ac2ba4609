// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use sightline_decoder::{Decoder, DecoderBuilder, DecoderConfig};
use sightline_image::Preprocessor;
use sightline_tracker::{CentroidTracker, CentroidTrackerBuilder, TrackerConfig};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    #[default]
    Bilinear,
    Nearest,
}

/// Settings of a complete detection and tracking session.
///
/// ```rust
/// # fn main() -> sightline::Result<()> {
/// let config = sightline::PipelineConfig::from_yaml_str(
///     "
/// output:
///   format: anchorless
///   shape: [1, 84, 8400]
///   channels_first: true
/// score_threshold: 0.4
/// tracker:
///   max_distance: 60.0
/// ",
/// )?;
/// assert_eq!(config.iou_threshold, 0.45);
/// assert_eq!(config.tracker.max_disappeared, 5);
/// let decoder = config.decoder()?;
/// assert_eq!(decoder.num_classes(), 80);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Raw model output layout and class names.
    pub output: DecoderConfig,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,
    #[serde(default)]
    pub class_aware_nms: bool,
    #[serde(default)]
    pub resize: ResizeFilter,
    #[serde(default)]
    pub tracker: TrackerConfig,
}

fn default_score_threshold() -> f32 {
    0.25
}

fn default_iou_threshold() -> f32 {
    0.45
}

impl PipelineConfig {
    pub fn new(output: DecoderConfig) -> Self {
        Self {
            output,
            score_threshold: default_score_threshold(),
            iou_threshold: default_iou_threshold(),
            class_aware_nms: false,
            resize: ResizeFilter::default(),
            tracker: TrackerConfig::default(),
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn decoder(&self) -> Result<Decoder> {
        Ok(DecoderBuilder::new()
            .with_config(self.output.clone())
            .with_score_threshold(self.score_threshold)
            .with_iou_threshold(self.iou_threshold)
            .with_class_aware_nms(self.class_aware_nms)
            .build()?)
    }

    pub fn tracker(&self) -> Result<CentroidTracker> {
        Ok(CentroidTrackerBuilder::new()
            .with_config(self.tracker)
            .build()?)
    }

    pub fn preprocessor(&self) -> Preprocessor {
        match self.resize {
            ResizeFilter::Bilinear => Preprocessor::new(),
            ResizeFilter::Nearest => Preprocessor::new_nearest(),
        }
    }
}

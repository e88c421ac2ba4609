// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

use log::debug;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::{
    Detection, Error, Result,
    float::decode_rows,
    nms::{suppress, suppress_class_aware},
};

/// Layout of a single candidate row in the raw model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `[center_x, center_y, width, height, class_0, ..., class_n]`, the
    /// confidence of a row is its largest class score.
    Anchorless,
    /// `[center_x, center_y, width, height, objectness, class_0, ...,
    /// class_n]`, the confidence of a row is `objectness * max(class)`.
    Objectness,
}

impl OutputFormat {
    /// Index of the first class score within a row.
    pub fn class_offset(&self) -> usize {
        match self {
            OutputFormat::Anchorless => 4,
            OutputFormat::Objectness => 5,
        }
    }
}

/// Describes the raw output tensor of a detection model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub format: OutputFormat,
    /// Full output shape including any leading batch dimensions of 1, for
    /// example `[1, 84, 8400]`.
    pub shape: Vec<usize>,
    /// The output is stored `[stride, N]` instead of `[N, stride]`.
    #[serde(default)]
    pub channels_first: bool,
    #[serde(default)]
    pub max_detections: Option<usize>,
    #[serde(default)]
    pub class_names: Vec<String>,
}

impl DecoderConfig {
    pub fn new(format: OutputFormat, shape: Vec<usize>) -> Self {
        Self {
            format,
            shape,
            channels_first: false,
            max_detections: None,
            class_names: Vec::new(),
        }
    }

    /// The native YOLOv8 layout of `[1, 4 + classes, candidates]`.
    pub fn yolov8(num_classes: usize, candidates: usize) -> Self {
        Self {
            format: OutputFormat::Anchorless,
            shape: vec![1, 4 + num_classes, candidates],
            channels_first: true,
            max_detections: None,
            class_names: Vec::new(),
        }
    }

    pub fn with_channels_first(mut self, channels_first: bool) -> Self {
        self.channels_first = channels_first;
        self
    }

    /// Resolves the `(candidates, stride)` pair described by the shape.
    pub fn layout(&self) -> Result<(usize, usize)> {
        let dims = self.shape.len();
        if dims < 2 {
            return Err(Error::InvalidConfig(format!(
                "output shape {:?} needs at least 2 dimensions",
                self.shape
            )));
        }
        if self.shape[..dims - 2].iter().any(|&d| d != 1) {
            return Err(Error::InvalidConfig(format!(
                "output shape {:?} has a batch dimension other than 1",
                self.shape
            )));
        }

        let (a, b) = (self.shape[dims - 2], self.shape[dims - 1]);
        let (candidates, stride) = if self.channels_first { (b, a) } else { (a, b) };
        if stride <= self.format.class_offset() {
            return Err(Error::InvalidConfig(format!(
                "stride {} of shape {:?} leaves no class scores for {:?} output",
                stride, self.shape, self.format
            )));
        }
        Ok((candidates, stride))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoderBuilder {
    config_src: Option<ConfigSource>,
    class_names: Option<Vec<String>>,
    iou_threshold: f32,
    score_threshold: f32,
    class_aware: bool,
    max_detections: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
enum ConfigSource {
    Yaml(String),
    Json(String),
    Config(DecoderConfig),
}

impl Default for DecoderBuilder {
    /// Creates a default DecoderBuilder with no configuration, a 0.25 score
    /// threshold, a 0.45 IOU threshold, class-agnostic suppression and up to
    /// 300 detections per frame.
    ///
    /// A valid configuration must be provided before building the Decoder.
    ///
    /// # Examples
    /// ```rust
    /// # use sightline_decoder::{DecoderBuilder, DecoderConfig, OutputFormat, Result};
    /// # fn main() -> Result<()> {
    /// let decoder = DecoderBuilder::default()
    ///     .with_config(DecoderConfig::yolov8(80, 8400))
    ///     .build()?;
    /// assert_eq!(decoder.score_threshold, 0.25);
    /// assert_eq!(decoder.iou_threshold, 0.45);
    /// assert_eq!(decoder.max_detections(), 300);
    /// # Ok(())
    /// # }
    /// ```
    fn default() -> Self {
        Self {
            config_src: None,
            class_names: None,
            iou_threshold: 0.45,
            score_threshold: 0.25,
            class_aware: false,
            max_detections: None,
        }
    }
}

impl DecoderBuilder {
    pub const DEFAULT_MAX_DETECTIONS: usize = 300;

    pub fn new() -> Self {
        Self::default()
    }

    /// Loads an output configuration in YAML format. Does not check if the
    /// string is a correct configuration. Use `DecoderBuilder.build()` to
    /// deserialize the YAML and validate it.
    ///
    /// # Examples
    /// ```rust
    /// # use sightline_decoder::{DecoderBuilder, Result};
    /// # fn main() -> Result<()> {
    /// let config_yaml = "
    /// format: objectness
    /// shape: [1, 25200, 85]
    /// ";
    /// let decoder = DecoderBuilder::new()
    ///     .with_config_yaml_str(config_yaml.to_string())
    ///     .build()?;
    /// assert_eq!(decoder.num_candidates(), 25200);
    /// assert_eq!(decoder.num_classes(), 80);
    /// # Ok(())
    /// # }
    /// ```
    pub fn with_config_yaml_str(mut self, yaml_str: String) -> Self {
        self.config_src.replace(ConfigSource::Yaml(yaml_str));
        self
    }

    /// Loads an output configuration in JSON format. Use
    /// `DecoderBuilder.build()` to deserialize the JSON and validate it.
    pub fn with_config_json_str(mut self, json_str: String) -> Self {
        self.config_src.replace(ConfigSource::Json(json_str));
        self
    }

    /// Uses an already deserialized output configuration.
    pub fn with_config(mut self, config: DecoderConfig) -> Self {
        self.config_src.replace(ConfigSource::Config(config));
        self
    }

    /// Sets the class names, indexed by class id. Overrides any class names
    /// found in the configuration.
    pub fn with_class_names(mut self, class_names: Vec<String>) -> Self {
        self.class_names = Some(class_names);
        self
    }

    /// Sets the score threshold of the decoder
    pub fn with_score_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self
    }

    /// Sets the IOU threshold of the decoder
    pub fn with_iou_threshold(mut self, iou_threshold: f32) -> Self {
        self.iou_threshold = iou_threshold;
        self
    }

    /// Only suppress overlapping detections of the same class.
    pub fn with_class_aware_nms(mut self, class_aware: bool) -> Self {
        self.class_aware = class_aware;
        self
    }

    /// Caps the number of detections kept per frame after suppression.
    /// Overrides any limit found in the configuration.
    pub fn with_max_detections(mut self, max_detections: usize) -> Self {
        self.max_detections = Some(max_detections);
        self
    }

    /// Builds the decoder with the given settings. If the config is a JSON or
    /// YAML string, this will deserialize it before validating the layout and
    /// thresholds.
    pub fn build(self) -> Result<Decoder> {
        let mut config: DecoderConfig = match self.config_src {
            Some(ConfigSource::Json(s)) => serde_json::from_str(&s)?,
            Some(ConfigSource::Yaml(s)) => serde_yaml::from_str(&s)?,
            Some(ConfigSource::Config(c)) => c,
            None => return Err(Error::NoConfig),
        };

        let (candidates, stride) = config.layout()?;

        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(Error::InvalidConfig(format!(
                "score threshold {} is outside [0, 1]",
                self.score_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(Error::InvalidConfig(format!(
                "IOU threshold {} is outside [0, 1]",
                self.iou_threshold
            )));
        }

        let max_detections = self
            .max_detections
            .or(config.max_detections)
            .unwrap_or(Self::DEFAULT_MAX_DETECTIONS);
        if max_detections == 0 {
            return Err(Error::InvalidConfig(
                "max detections must be at least 1".to_string(),
            ));
        }

        if let Some(class_names) = self.class_names {
            config.class_names = class_names;
        }
        config.max_detections = Some(max_detections);

        debug!(
            "decoder {:?} with {} candidates of stride {}, score {} iou {} class aware {}",
            config.format,
            candidates,
            stride,
            self.score_threshold,
            self.iou_threshold,
            self.class_aware
        );

        Ok(Decoder {
            config,
            candidates,
            stride,
            max_detections,
            class_aware: self.class_aware,
            iou_threshold: self.iou_threshold,
            score_threshold: self.score_threshold,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoder {
    config: DecoderConfig,
    candidates: usize,
    stride: usize,
    max_detections: usize,
    class_aware: bool,
    pub iou_threshold: f32,
    pub score_threshold: f32,
}

impl Decoder {
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    pub fn format(&self) -> OutputFormat {
        self.config.format
    }

    pub fn output_shape(&self) -> &[usize] {
        &self.config.shape
    }

    pub fn num_candidates(&self) -> usize {
        self.candidates
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn num_classes(&self) -> usize {
        self.stride - self.config.format.class_offset()
    }

    pub fn class_names(&self) -> &[String] {
        &self.config.class_names
    }

    pub fn class_aware(&self) -> bool {
        self.class_aware
    }

    pub fn max_detections(&self) -> usize {
        self.max_detections
    }

    /// Decodes, suppresses and truncates the raw output of one inference.
    ///
    /// The result is sorted by confidence, descending.
    ///
    /// # Examples
    /// ```rust
    /// # use sightline_decoder::{DecoderBuilder, DecoderConfig, OutputFormat, Result};
    /// # fn main() -> Result<()> {
    /// // two candidates stored channels first, one class
    /// let config = DecoderConfig::new(OutputFormat::Anchorless, vec![1, 5, 2])
    ///     .with_channels_first(true);
    /// let decoder = DecoderBuilder::new().with_config(config).build()?;
    /// let raw = [
    ///     35.0, 200.0, // center x
    ///     35.0, 200.0, // center y
    ///     50.0, 20.0, // width
    ///     50.0, 20.0, // height
    ///     0.9, 0.1, // class 0
    /// ];
    /// let detections = decoder.decode(&raw)?;
    /// assert_eq!(detections.len(), 1);
    /// assert_eq!(detections[0].class_name, "unknown_0");
    /// # Ok(())
    /// # }
    /// ```
    pub fn decode(&self, raw: &[f32]) -> Result<Vec<Detection>> {
        let candidates = self.decode_candidates(raw)?;
        Ok(self.suppress(candidates))
    }

    /// Decodes the raw output into candidate detections without suppression.
    pub fn decode_candidates(&self, raw: &[f32]) -> Result<Vec<Detection>> {
        let volume = self.candidates * self.stride;
        if raw.len() != volume {
            return Err(Error::DecodeFormat(format!(
                "expected {} values for output shape {:?} but found {}",
                volume,
                self.config.shape,
                raw.len()
            )));
        }

        let rows = if self.config.channels_first {
            ArrayView2::from_shape((self.stride, self.candidates), raw)
                .map(|view| view.reversed_axes())
        } else {
            ArrayView2::from_shape((self.candidates, self.stride), raw)
        }
        .map_err(|e| Error::DecodeFormat(e.to_string()))?;

        Ok(decode_rows(
            rows,
            self.config.format,
            &self.config.class_names,
            self.score_threshold,
        ))
    }

    /// Suppresses overlapping detections and keeps at most
    /// `max_detections` of them.
    pub fn suppress(&self, detections: Vec<Detection>) -> Vec<Detection> {
        let mut kept = if self.class_aware {
            suppress_class_aware(detections, self.iou_threshold)
        } else {
            suppress(detections, self.iou_threshold)
        };
        kept.truncate(self.max_detections);
        kept
    }
}

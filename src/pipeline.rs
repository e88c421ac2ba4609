// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

use log::{debug, trace, warn};
use sightline_decoder::{Decoder, Detection};
use sightline_image::{FrameSource, Preprocessor};
use sightline_tensor::{Tensor, TensorTrait as _};
use sightline_tracker::{CentroidTracker, Track, Tracker as _};
use std::{
    sync::{Arc, Mutex, MutexGuard, TryLockError},
    time::{Duration, Instant},
};

use crate::{Error, PipelineConfig, Result, Statistics};

/// A loaded detection model. Inference itself is supplied by the model
/// runtime.
pub trait Model {
    /// Expected input shape, `[1, height, width, channels]`.
    fn input_shape(&self) -> &[usize];

    fn output_shape(&self) -> &[usize];

    fn execute(&mut self, input: &Tensor<f32>) -> Result<Tensor<f32>>;
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn input_shape(&self) -> &[usize] {
        (**self).input_shape()
    }

    fn output_shape(&self) -> &[usize] {
        (**self).output_shape()
    }

    fn execute(&mut self, input: &Tensor<f32>) -> Result<Tensor<f32>> {
        (**self).execute(input)
    }
}

/// Output of one pipeline pass.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    /// Suppressed detections in frame pixel space, highest confidence first.
    pub detections: Vec<Detection>,
    /// Every registered track after this frame, ordered by id.
    pub tracks: Vec<Track>,
    pub inference_time: Duration,
}

pub struct PipelineBuilder<M: Model> {
    model: M,
    decoder: Option<Decoder>,
    tracker: Option<CentroidTracker>,
    preprocessor: Option<Preprocessor>,
    config: Option<PipelineConfig>,
}

impl<M: Model> PipelineBuilder<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            decoder: None,
            tracker: None,
            preprocessor: None,
            config: None,
        }
    }

    /// Builds the decoder, tracker and preprocessor from `config`. Components
    /// given explicitly take precedence.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn with_tracker(mut self, tracker: CentroidTracker) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn with_preprocessor(mut self, preprocessor: Preprocessor) -> Self {
        self.preprocessor = Some(preprocessor);
        self
    }

    /// Validates the model metadata against the decoder configuration.
    pub fn build(self) -> Result<Pipeline<M>> {
        let decoder = match (self.decoder, &self.config) {
            (Some(decoder), _) => decoder,
            (None, Some(config)) => config.decoder()?,
            (None, None) => {
                return Err(Error::InvalidConfig(
                    "a decoder or pipeline config is required".to_string(),
                ));
            }
        };
        let tracker = match (self.tracker, &self.config) {
            (Some(tracker), _) => tracker,
            (None, Some(config)) => config.tracker()?,
            (None, None) => CentroidTracker::new(),
        };
        let preprocessor = match (self.preprocessor, &self.config) {
            (Some(preprocessor), _) => preprocessor,
            (None, Some(config)) => config.preprocessor(),
            (None, None) => Preprocessor::new(),
        };

        let input_shape = match *self.model.input_shape() {
            [1, height, width, channels]
                if height > 0 && width > 0 && matches!(channels, 1 | 3 | 4) =>
            {
                [height, width, channels]
            }
            ref shape => {
                return Err(Error::InvalidConfig(format!(
                    "model input shape {:?} is not [1, height, width, 1|3|4]",
                    shape
                )));
            }
        };

        if self.model.output_shape() != decoder.output_shape() {
            return Err(Error::InvalidConfig(format!(
                "model output shape {:?} does not match decoder shape {:?}",
                self.model.output_shape(),
                decoder.output_shape()
            )));
        }

        debug!(
            "pipeline input {:?} output {:?}",
            input_shape,
            decoder.output_shape()
        );

        Ok(Pipeline {
            model: self.model,
            preprocessor,
            decoder,
            tracker,
            statistics: Statistics::new(),
            input_shape,
        })
    }
}

/// Runs preprocess, inference, decode, suppression and tracking for one
/// frame at a time.
///
/// `process` takes `&mut self`, so two passes can never run concurrently on
/// the same tracking state. Use [`SharedPipeline`] to drive a pipeline from a
/// timer.
pub struct Pipeline<M: Model> {
    model: M,
    preprocessor: Preprocessor,
    decoder: Decoder,
    tracker: CentroidTracker,
    statistics: Statistics,
    input_shape: [usize; 3],
}

impl<M: Model> Pipeline<M> {
    /// Processes one frame captured at `timestamp`.
    ///
    /// A malformed frame fails with [`Error::InvalidInput`] before the
    /// tracker is touched. When inference or decoding fails the tracker is
    /// still advanced with an empty detection set, so tracks age exactly as
    /// if nothing had been detected, and the error is returned.
    pub fn process<F>(&mut self, frame: &F, timestamp: u64) -> Result<FrameResult>
    where
        F: FrameSource + ?Sized,
    {
        let input = self.preprocessor.preprocess(frame, self.input_shape)?;
        let frame_size = (frame.width() as f32, frame.height() as f32);

        match self.detect(input, frame_size) {
            Ok((detections, inference_time)) => {
                let tracks = self.tracker.update(detections.as_slice(), timestamp);
                self.statistics.record(&detections, &self.tracker);
                trace!(
                    "frame {} detections {} tracks {} inference {:?}",
                    timestamp,
                    detections.len(),
                    tracks.len(),
                    inference_time
                );
                Ok(FrameResult {
                    detections,
                    tracks,
                    inference_time,
                })
            }
            Err(err) => {
                warn!("frame {} failed, aging tracks: {}", timestamp, err);
                let empty: &[Detection] = &[];
                self.tracker.update(empty, timestamp);
                self.statistics.refresh_tracks(&self.tracker);
                Err(err)
            }
        }
    }

    /// Inference through suppression. Both tensors are dropped before the
    /// detections are returned.
    fn detect(
        &mut self,
        input: Tensor<f32>,
        (frame_width, frame_height): (f32, f32),
    ) -> Result<(Vec<Detection>, Duration)> {
        let start = Instant::now();
        let output = self.model.execute(&input)?;
        let inference_time = start.elapsed();
        drop(input);

        if output.shape() != self.decoder.output_shape() {
            return Err(Error::DecodeFormat(format!(
                "model produced shape {:?}, decoder expects {:?}",
                output.shape(),
                self.decoder.output_shape()
            )));
        }
        let candidates = self.decoder.decode_candidates(&output.map())?;
        drop(output);

        let [height, width, _] = self.input_shape;
        let x_scale = frame_width / width as f32;
        let y_scale = frame_height / height as f32;
        let rescaled = candidates
            .iter()
            .filter_map(|d| d.rescaled(x_scale, y_scale, frame_width, frame_height))
            .collect();

        Ok((self.decoder.suppress(rescaled), inference_time))
    }

    /// Clears all tracks, restarting ids at 0, and the session statistics.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.statistics.reset();
    }

    pub fn input_shape(&self) -> [usize; 3] {
        self.input_shape
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn tracker(&self) -> &CentroidTracker {
        &self.tracker
    }

    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }
}

/// A pipeline shared with a timer-driven loop.
///
/// Each [`tick`](SharedPipeline::tick) runs one pass. A tick that arrives
/// while the previous pass still holds the pipeline is skipped.
pub struct SharedPipeline<M: Model> {
    inner: Arc<Mutex<Pipeline<M>>>,
}

impl<M: Model> Clone for SharedPipeline<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: Model> SharedPipeline<M> {
    pub fn new(pipeline: Pipeline<M>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pipeline)),
        }
    }

    /// Runs one pass, or returns `Ok(None)` without waiting when another
    /// pass is in progress.
    pub fn tick<F>(&self, frame: &F, timestamp: u64) -> Result<Option<FrameResult>>
    where
        F: FrameSource + ?Sized,
    {
        match self.inner.try_lock() {
            Ok(mut pipeline) => pipeline.process(frame, timestamp).map(Some),
            Err(TryLockError::WouldBlock) => {
                debug!("skipping tick {}, previous pass still running", timestamp);
                Ok(None)
            }
            Err(TryLockError::Poisoned(_)) => Err(Error::Poisoned),
        }
    }

    /// Waits for any running pass and borrows the pipeline.
    pub fn lock(&self) -> Result<MutexGuard<'_, Pipeline<M>>> {
        self.inner.lock().map_err(|_| Error::Poisoned)
    }
}

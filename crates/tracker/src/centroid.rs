// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{DetectionBox, Error, Point, Result, Track, TrackState, Tracker};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Consecutive missed updates a track survives before deregistration.
    pub max_disappeared: u32,
    /// Largest adjusted centroid distance accepted as a match, in pixels.
    pub max_distance: f32,
    /// Distance multiplier applied when the detection class differs from the
    /// track class.
    pub class_penalty: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_disappeared: 5,
            max_distance: 80.0,
            class_penalty: 1.5,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_distance.is_finite() && self.max_distance >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max distance {} must be a finite, non-negative number of pixels",
                self.max_distance
            )));
        }
        if !(self.class_penalty.is_finite() && self.class_penalty >= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "class penalty {} must be at least 1",
                self.class_penalty
            )));
        }
        Ok(())
    }
}

/// Cross-frame tracking state of one session.
///
/// Ids are allocated from `next_id` and only ever increase, so iterating
/// `tracks` visits them in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerState {
    pub next_id: u64,
    pub tracks: BTreeMap<u64, Track>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches one frame of detections against the held tracks.
    pub fn update<T: DetectionBox>(
        &mut self,
        config: &TrackerConfig,
        boxes: &[T],
        timestamp: u64,
    ) -> Vec<Track> {
        if boxes.is_empty() {
            for track in self.tracks.values_mut() {
                track.disappeared_count = track.disappeared_count.saturating_add(1);
            }
            self.deregister_expired(config.max_disappeared);
        } else if self.tracks.is_empty() {
            for detection in boxes {
                self.register(detection, timestamp);
            }
        } else {
            let claimed = self.match_tracks(config, boxes, timestamp);
            self.deregister_expired(config.max_disappeared);
            for (detection, _) in boxes.iter().zip(claimed).filter(|(_, claimed)| !claimed) {
                self.register(detection, timestamp);
            }
        }

        self.tracks.values().cloned().collect()
    }

    /// Greedy nearest-centroid matching, one track at a time in id order.
    /// Returns which detections were claimed.
    fn match_tracks<T: DetectionBox>(
        &mut self,
        config: &TrackerConfig,
        boxes: &[T],
        timestamp: u64,
    ) -> Vec<bool> {
        let centroids = boxes
            .iter()
            .map(|b| Point::centroid(&b.bbox()))
            .collect::<Vec<_>>();
        let mut claimed = vec![false; boxes.len()];

        for track in self.tracks.values_mut() {
            let mut best: Option<(usize, f32)> = None;
            for (j, centroid) in centroids.iter().enumerate() {
                if claimed[j] {
                    continue;
                }
                let mut distance = track.centroid.distance(centroid);
                if boxes[j].label() != track.class_id {
                    distance *= config.class_penalty;
                }
                // strict comparison keeps the earliest detection on ties
                if distance <= config.max_distance && best.is_none_or(|(_, d)| distance < d) {
                    best = Some((j, distance));
                }
            }

            match best {
                Some((j, distance)) => {
                    trace!(
                        "Track {} matched detection {} at distance {}",
                        track.id, j, distance
                    );
                    claimed[j] = true;
                    observe(track, &boxes[j], centroids[j], timestamp);
                }
                None => {
                    track.disappeared_count = track.disappeared_count.saturating_add(1);
                }
            }
        }

        claimed
    }

    fn register<T: DetectionBox>(&mut self, detection: &T, timestamp: u64) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let bbox = detection.bbox();
        let track = Track {
            id,
            centroid: Point::centroid(&bbox),
            bbox: bbox.into(),
            class_id: detection.label(),
            class_name: detection.label_name(),
            created: timestamp,
            last_seen: timestamp,
            disappeared_count: 0,
        };
        debug!("Track registered: {} {}", id, track.class_name);
        self.tracks.insert(id, track);
        id
    }

    fn deregister_expired(&mut self, max_disappeared: u32) {
        self.tracks.retain(|id, track| {
            let keep = track.disappeared_count <= max_disappeared;
            if !keep {
                debug!("Track removed: {} {}", id, track.class_name);
            }
            keep
        });
    }

    /// Clears every track and restarts id allocation at 0.
    pub fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 0;
    }

    /// Checks that every track is keyed by its own id and that `next_id` is
    /// above all of them.
    pub fn validate(&self) -> Result<()> {
        if let Some((key, track)) = self.tracks.iter().find(|(key, track)| **key != track.id) {
            return Err(Error::InvalidConfig(format!(
                "track {} is stored under id {}",
                track.id, key
            )));
        }
        if let Some(last) = self.tracks.keys().next_back()
            && self.next_id <= *last
        {
            return Err(Error::InvalidConfig(format!(
                "next id {} would reuse registered track {}",
                self.next_id, last
            )));
        }
        Ok(())
    }

    /// Number of registered tracks per class name.
    pub fn unique_class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for track in self.tracks.values() {
            *counts.entry(track.class_name.clone()).or_insert(0) += 1;
        }
        counts
    }
}

fn observe<T: DetectionBox>(track: &mut Track, detection: &T, centroid: Point, timestamp: u64) {
    track.centroid = centroid;
    track.bbox = detection.bbox().into();
    track.class_id = detection.label();
    track.class_name = detection.label_name();
    track.last_seen = timestamp;
    track.disappeared_count = 0;
}

/// Centroid tracker owning the configuration and state of one session.
#[derive(Debug, Clone, Default)]
pub struct CentroidTracker {
    config: TrackerConfig,
    state: TrackerState,
}

impl CentroidTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resumes a session from previously held state.
    pub fn with_state(config: TrackerConfig, state: TrackerState) -> Result<Self> {
        config.validate()?;
        state.validate()?;
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn into_state(self) -> TrackerState {
        self.state
    }

    pub fn reset(&mut self) {
        debug!("Tracker reset with {} tracks", self.state.tracks.len());
        self.state.reset();
    }

    pub fn get_tracks(&self) -> Vec<Track> {
        self.state.tracks.values().cloned().collect()
    }

    /// Count of registered tracks per class name, including tracks that
    /// missed recent updates.
    pub fn get_unique_class_counts(&self) -> BTreeMap<String, usize> {
        self.state.unique_class_counts()
    }

    /// Number of identities ever created in this session.
    pub fn get_total_unique_count(&self) -> u64 {
        self.state.next_id
    }
}

impl<T> Tracker<T> for CentroidTracker
where
    T: DetectionBox,
{
    fn update(&mut self, boxes: &[T], timestamp: u64) -> Vec<Track> {
        self.state.update(&self.config, boxes, timestamp)
    }

    fn get_active_tracks(&self) -> Vec<Track> {
        self.state
            .tracks
            .values()
            .filter(|t| t.state() == TrackState::Active)
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct CentroidTrackerBuilder {
    config: TrackerConfig,
}

impl CentroidTrackerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_max_disappeared(mut self, max_disappeared: u32) -> Self {
        self.config.max_disappeared = max_disappeared;
        self
    }

    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.config.max_distance = max_distance;
        self
    }

    pub fn with_class_penalty(mut self, class_penalty: f32) -> Self {
        self.config.class_penalty = class_penalty;
        self
    }

    pub fn build(self) -> Result<CentroidTracker> {
        CentroidTracker::with_state(self.config, TrackerState::new())
    }
}

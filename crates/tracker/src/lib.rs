// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

//! Sightline - Identity tracking
//!
//! Assigns persistent integer identities to per-frame detections by greedy
//! nearest-centroid matching. Identities are allocated monotonically and are
//! never reused within a [`TrackerState`], even after their track has been
//! deregistered.
//!
//! The matching is greedy per track, in registration order, rather than a
//! globally optimal assignment. Dense scenes with crossing objects can swap
//! identities where a min-cost assignment would not.

use std::fmt::Debug;

pub mod centroid;
mod error;

pub use centroid::{CentroidTracker, CentroidTrackerBuilder, TrackerConfig, TrackerState};
pub use error::{Error, Result};

pub trait DetectionBox: Debug {
    /// Box as `[x, y, width, height]` with `(x, y)` the top-left corner.
    fn bbox(&self) -> [f32; 4];
    fn score(&self) -> f32;
    fn label(&self) -> usize;

    fn label_name(&self) -> String {
        format!("unknown_{}", self.label())
    }
}

impl DetectionBox for sightline_decoder::Detection {
    fn bbox(&self) -> [f32; 4] {
        self.bbox.into()
    }

    fn score(&self) -> f32 {
        self.confidence
    }

    fn label(&self) -> usize {
        self.class_id
    }

    fn label_name(&self) -> String {
        self.class_name.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Center of an `[x, y, width, height]` box.
    pub fn centroid(bbox: &[f32; 4]) -> Self {
        Self {
            x: bbox[0] + bbox[2] / 2.0,
            y: bbox[1] + bbox[3] / 2.0,
        }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Match status of a registered track.
///
/// `Active` is narrower than "still registered": a track that missed the
/// latest update is `Stale` even while it is within `max_disappeared` and
/// still returned by [`Tracker::update`]. Deregistered tracks have no state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Matched to a detection in the latest update (`disappeared_count == 0`).
    Active,
    /// Missed one or more consecutive updates but not yet deregistered.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: u64,
    pub centroid: Point,
    pub bbox: sightline_decoder::BoundingBox,
    pub class_id: usize,
    pub class_name: String,
    pub created: u64,
    pub last_seen: u64,
    /// Consecutive updates without a match. Resets to 0 on a match.
    pub disappeared_count: u32,
}

impl Track {
    pub fn state(&self) -> TrackState {
        if self.disappeared_count == 0 {
            TrackState::Active
        } else {
            TrackState::Stale
        }
    }
}

pub trait Tracker<T: DetectionBox> {
    /// Matches `boxes` against the current tracks and returns every track
    /// still registered afterwards, ordered by id.
    fn update(&mut self, boxes: &[T], timestamp: u64) -> Vec<Track>;

    /// Tracks matched in the latest update.
    fn get_active_tracks(&self) -> Vec<Track>;
}

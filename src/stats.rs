// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

use sightline_decoder::Detection;
use sightline_tracker::CentroidTracker;
use std::collections::BTreeMap;

/// Number of detections per class name.
pub fn class_counts(detections: &[Detection]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for detection in detections {
        *counts.entry(detection.class_name.clone()).or_insert(0) += 1;
    }
    counts
}

/// The `n` largest counts, highest first. Equal counts are ordered by name.
pub fn top_classes(counts: &BTreeMap<String, usize>, n: usize) -> Vec<(String, usize)> {
    let mut sorted = counts
        .iter()
        .map(|(name, count)| (name.clone(), *count))
        .collect::<Vec<_>>();
    // the map iterates by name and the sort is stable
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted.truncate(n);
    sorted
}

/// Aggregate counters over a video session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    frames: u64,
    cumulative: BTreeMap<String, usize>,
    last_frame: BTreeMap<String, usize>,
    unique: BTreeMap<String, usize>,
    total_unique: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one processed frame and refreshes the unique-track counters
    /// from `tracker`.
    pub fn record(&mut self, detections: &[Detection], tracker: &CentroidTracker) {
        self.frames += 1;
        self.last_frame = class_counts(detections);
        for (name, count) in &self.last_frame {
            *self.cumulative.entry(name.clone()).or_insert(0) += count;
        }
        self.refresh_tracks(tracker);
    }

    /// Refreshes the unique-track counters without counting a frame.
    pub fn refresh_tracks(&mut self, tracker: &CentroidTracker) {
        self.unique = tracker.get_unique_class_counts();
        self.total_unique = tracker.get_total_unique_count();
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }

    pub fn last_frame_counts(&self) -> &BTreeMap<String, usize> {
        &self.last_frame
    }

    pub fn cumulative_counts(&self) -> &BTreeMap<String, usize> {
        &self.cumulative
    }

    pub fn unique_class_counts(&self) -> &BTreeMap<String, usize> {
        &self.unique
    }

    pub fn total_unique_count(&self) -> u64 {
        self.total_unique
    }

    /// The `n` most frequent classes of the latest frame.
    pub fn top_classes(&self, n: usize) -> Vec<(String, usize)> {
        top_classes(&self.last_frame, n)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

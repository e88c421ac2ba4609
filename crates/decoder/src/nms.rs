// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{BoundingBox, Detection};
use log::trace;

/// Candidate sets up to this size are first checked for any overlapping pair
/// and returned as-is when none is found.
pub const FAST_PATH_LIMIT: usize = 10;

/// Intersection over union of two boxes, always within `[0, 1]`.
pub fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let [a_xmin, a_ymin, a_xmax, a_ymax] = a.to_xyxy();
    let [b_xmin, b_ymin, b_xmax, b_ymax] = b.to_xyxy();

    let left = a_xmin.max(b_xmin);
    let top = a_ymin.max(b_ymin);
    let right = a_xmax.min(b_xmax);
    let bottom = a_ymax.min(b_ymax);

    let intersection = (right - left).max(0.0) * (bottom - top).max(0.0);
    let area_a = (a_xmax - a_xmin) * (a_ymax - a_ymin);
    let area_b = (b_xmax - b_xmin) * (b_ymax - b_ymin);
    let union = area_a + area_b - intersection;

    if !(union > 0.0) {
        return 0.0;
    }
    (intersection / union).clamp(0.0, 1.0)
}

/// Greedy class-agnostic non-maximum suppression. The result is sorted by
/// confidence, descending, with ties kept in input order.
pub fn suppress(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    suppress_by(detections, iou_threshold, |_, _| true)
}

/// Greedy non-maximum suppression that only suppresses detections sharing
/// the class of the kept detection.
pub fn suppress_class_aware(detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    suppress_by(detections, iou_threshold, |a, b| a.class_id == b.class_id)
}

fn suppress_by<F>(mut boxes: Vec<Detection>, iou_threshold: f32, competes: F) -> Vec<Detection>
where
    F: Fn(&Detection, &Detection) -> bool,
{
    // sort_by is stable so equal confidences keep scan order
    boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    if boxes.len() <= FAST_PATH_LIMIT && !any_overlap(&boxes, iou_threshold, &competes) {
        return boxes;
    }

    let candidates = boxes.len();
    let kept = greedy(boxes, iou_threshold, &competes);
    trace!("suppressed {} of {} detections", candidates - kept.len(), candidates);
    kept
}

fn any_overlap<F>(boxes: &[Detection], iou_threshold: f32, competes: &F) -> bool
where
    F: Fn(&Detection, &Detection) -> bool,
{
    boxes.iter().enumerate().any(|(i, a)| {
        boxes[i + 1..]
            .iter()
            .any(|b| competes(a, b) && iou(&a.bbox, &b.bbox) > iou_threshold)
    })
}

/// Runs the suppression loop over boxes already sorted by confidence.
fn greedy<F>(boxes: Vec<Detection>, iou_threshold: f32, competes: &F) -> Vec<Detection>
where
    F: Fn(&Detection, &Detection) -> bool,
{
    let mut suppressed = vec![false; boxes.len()];
    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..boxes.len() {
            if suppressed[j] {
                continue;
            }
            if competes(&boxes[i], &boxes[j]) && iou(&boxes[i].bbox, &boxes[j].bbox) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }

    boxes
        .into_iter()
        .zip(suppressed)
        .filter_map(|(b, suppressed)| (!suppressed).then_some(b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(bbox: [f32; 4], class_id: usize, confidence: f32) -> Detection {
        Detection {
            bbox: bbox.into(),
            class_id,
            class_name: format!("class_{}", class_id),
            confidence,
        }
    }

    /// Sorts then always runs the suppression loop.
    fn full_path(mut boxes: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
        boxes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        greedy(boxes, iou_threshold, &|_: &Detection, _: &Detection| true)
    }

    /// Deterministic pseudo-random boxes on a 200x200 canvas.
    fn scattered(count: usize, seed: u32) -> Vec<Detection> {
        let mut state = seed;
        let mut next = move || {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            (state >> 8) as f32 / (1 << 24) as f32
        };
        (0..count)
            .map(|_| {
                det(
                    [next() * 180.0, next() * 180.0, 5.0 + next() * 40.0, 5.0 + next() * 40.0],
                    (next() * 3.0) as usize,
                    next(),
                )
            })
            .collect()
    }

    #[test]
    fn test_iou_identity_and_disjoint() {
        let a = BoundingBox::new(0.1, 0.7, 0.2, 0.3);
        assert_eq!(iou(&a, &a), 1.0);

        let b = BoundingBox::new(10.0, 10.0, 5.0, 5.0);
        assert_eq!(iou(&a, &b), 0.0);

        let left = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        let touching = BoundingBox::new(2.0, 0.0, 2.0, 2.0);
        assert_eq!(iou(&left, &touching), 0.0);
    }

    #[test]
    fn test_iou_partial() {
        let a = BoundingBox::new(10.0, 10.0, 50.0, 50.0);
        let b = BoundingBox::new(12.0, 12.0, 50.0, 50.0);
        let expected = 48.0 * 48.0 / (2.0 * 2500.0 - 48.0 * 48.0);
        assert!((iou(&a, &b) - expected).abs() < 1e-6);
        assert_eq!(iou(&a, &b), iou(&b, &a));
    }

    #[test]
    fn test_iou_bounds() {
        let boxes = scattered(64, 7);
        for a in &boxes {
            for b in &boxes {
                let v = iou(&a.bbox, &b.bbox);
                assert!((0.0..=1.0).contains(&v), "iou {} out of range", v);
            }
            assert_eq!(iou(&a.bbox, &a.bbox), 1.0);
        }

        let empty = BoundingBox::new(5.0, 5.0, 0.0, 0.0);
        assert_eq!(iou(&empty, &empty), 0.0);
    }

    #[test]
    fn test_suppress_keeps_highest() {
        let detections = vec![
            det([10.0, 10.0, 50.0, 50.0], 0, 0.9),
            det([12.0, 12.0, 50.0, 50.0], 0, 0.95),
        ];
        let kept = suppress(detections, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.95);
        assert_eq!(kept[0].bbox, BoundingBox::new(12.0, 12.0, 50.0, 50.0));
    }

    #[test]
    fn test_suppress_ignores_class() {
        let detections = vec![
            det([10.0, 10.0, 50.0, 50.0], 0, 0.9),
            det([12.0, 12.0, 50.0, 50.0], 1, 0.95),
        ];
        assert_eq!(suppress(detections.clone(), 0.5).len(), 1);

        let kept = suppress_class_aware(detections, 0.5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].class_id, 1);
        assert_eq!(kept[1].class_id, 0);
    }

    #[test]
    fn test_suppress_stable_ties() {
        let detections = vec![
            det([0.0, 0.0, 10.0, 10.0], 0, 0.5),
            det([100.0, 0.0, 10.0, 10.0], 1, 0.5),
            det([1.0, 1.0, 10.0, 10.0], 2, 0.5),
        ];
        let kept = suppress(detections, 0.3);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].class_id, 0);
        assert_eq!(kept[1].class_id, 1);
    }

    #[test]
    fn test_suppress_idempotent() {
        for seed in 0..8 {
            let once = suppress(scattered(120, seed), 0.45);
            let twice = suppress(once.clone(), 0.45);
            assert_eq!(once, twice);

            let once = suppress_class_aware(scattered(120, seed), 0.45);
            let twice = suppress_class_aware(once.clone(), 0.45);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_fast_path_matches_full_path() {
        for seed in 0..64 {
            for count in [0, 1, 2, 5, FAST_PATH_LIMIT] {
                let boxes = scattered(count, seed);
                for threshold in [0.0, 0.3, 0.5, 0.9] {
                    assert_eq!(
                        suppress(boxes.clone(), threshold),
                        full_path(boxes.clone(), threshold)
                    );
                }
            }
        }
    }

    #[test]
    fn test_suppress_empty() {
        assert!(suppress(Vec::new(), 0.5).is_empty());
    }
}

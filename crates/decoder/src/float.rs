// SPDX-FileCopyrightText: Copyright 2025 Sightline Contributors
// SPDX-License-Identifier: Apache-2.0

use crate::{BoundingBox, Detection, Error, OutputFormat, Result, class_name};
use log::trace;
use ndarray::{
    ArrayView1, ArrayView2, Axis,
    parallel::prelude::{IntoParallelIterator, ParallelIterator as _},
    s,
};

/// Candidate sets at least this large are decoded on the rayon pool.
pub const PARALLEL_ROWS: usize = 1024;

/// Decodes a row-major `[N, stride]` buffer of candidate rows.
///
/// Rows whose confidence falls below `score_threshold`, degenerate boxes and
/// rows holding non-finite values are dropped.
pub fn decode(
    raw: &[f32],
    format: OutputFormat,
    stride: usize,
    class_names: &[String],
    score_threshold: f32,
) -> Result<Vec<Detection>> {
    if stride <= format.class_offset() {
        return Err(Error::DecodeFormat(format!(
            "stride {} leaves no class scores for {:?} output",
            stride, format
        )));
    }
    if raw.len() % stride != 0 {
        return Err(Error::DecodeFormat(format!(
            "buffer of {} values is not a whole number of {} value rows",
            raw.len(),
            stride
        )));
    }

    let rows = ArrayView2::from_shape((raw.len() / stride, stride), raw)
        .map_err(|e| Error::DecodeFormat(e.to_string()))?;
    Ok(decode_rows(rows, format, class_names, score_threshold))
}

/// Decodes a `[N, stride]` view of candidate rows. Row order is preserved in
/// the output whether or not the parallel path is taken.
pub fn decode_rows(
    rows: ArrayView2<f32>,
    format: OutputFormat,
    class_names: &[String],
    score_threshold: f32,
) -> Vec<Detection> {
    let candidates = rows.nrows();
    let decoded: Vec<(BoundingBox, usize, f32)> = if candidates >= PARALLEL_ROWS {
        rows.axis_iter(Axis(0))
            .into_par_iter()
            .filter_map(|row| decode_row(row, format, score_threshold))
            .collect()
    } else {
        rows.axis_iter(Axis(0))
            .filter_map(|row| decode_row(row, format, score_threshold))
            .collect()
    };

    trace!(
        "decoded {} of {} candidate rows above {}",
        decoded.len(),
        candidates,
        score_threshold
    );

    decoded
        .into_iter()
        .map(|(bbox, class_id, confidence)| Detection {
            bbox,
            class_id,
            class_name: class_name(class_names, class_id),
            confidence,
        })
        .collect()
}

#[inline]
fn decode_row(
    row: ArrayView1<f32>,
    format: OutputFormat,
    threshold: f32,
) -> Option<(BoundingBox, usize, f32)> {
    let (class_id, confidence) = match format {
        OutputFormat::Anchorless => {
            let (class_id, max_score) = arg_max(row.slice(s![4..]))?;
            if !(max_score >= threshold) {
                return None;
            }
            (class_id, max_score)
        }
        OutputFormat::Objectness => {
            let objectness = row[4];
            if !(objectness >= threshold) {
                return None;
            }
            let (class_id, max_score) = arg_max(row.slice(s![5..]))?;
            let confidence = objectness * max_score;
            if !(confidence >= threshold) {
                return None;
            }
            (class_id, confidence)
        }
    };

    if !confidence.is_finite() {
        return None;
    }

    let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
    if !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite()) {
        return None;
    }

    let bbox = BoundingBox::from_center(cx, cy, w, h);
    if bbox.is_degenerate() {
        return None;
    }

    Some((bbox, class_id, confidence))
}

/// Index and value of the largest score. Ties go to the lowest index.
#[inline]
fn arg_max(scores: ArrayView1<f32>) -> Option<(usize, f32)> {
    let first = *scores.first()?;
    Some(
        scores
            .iter()
            .enumerate()
            .skip(1)
            .fold((0, first), |(arg_max, max), (ind, s)| {
                if *s > max { (ind, *s) } else { (arg_max, max) }
            }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<String> {
        vec!["person".to_string(), "bicycle".to_string(), "car".to_string()]
    }

    #[test]
    fn test_decode_anchorless() {
        let raw = [
            35.0, 35.0, 50.0, 50.0, 0.1, 0.9, 0.3, //
            100.0, 100.0, 10.0, 20.0, 0.05, 0.1, 0.2,
        ];
        let detections = decode(&raw, OutputFormat::Anchorless, 7, &names(), 0.25).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 1);
        assert_eq!(detections[0].class_name, "bicycle");
        assert_eq!(detections[0].confidence, 0.9);
        assert_eq!(detections[0].bbox, BoundingBox::new(10.0, 10.0, 50.0, 50.0));
    }

    #[test]
    fn test_decode_objectness() {
        let raw = [
            // objectness passes, combined score 0.8 * 0.5 = 0.4 passes
            50.0, 50.0, 20.0, 20.0, 0.8, 0.1, 0.5, 0.2, //
            // objectness passes, combined score 0.5 * 0.4 = 0.2 fails
            60.0, 60.0, 20.0, 20.0, 0.5, 0.4, 0.1, 0.0, //
            // objectness fails before the class scan
            70.0, 70.0, 20.0, 20.0, 0.2, 1.0, 1.0, 1.0,
        ];
        let detections = decode(&raw, OutputFormat::Objectness, 8, &names(), 0.25).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 1);
        assert!((detections[0].confidence - 0.4).abs() < 1e-6);
        assert_eq!(detections[0].bbox, BoundingBox::new(40.0, 40.0, 20.0, 20.0));
    }

    #[test]
    fn test_decode_unknown_class_name() {
        let raw = [10.0, 10.0, 4.0, 4.0, 0.0, 0.0, 0.0, 0.0, 0.7];
        let detections = decode(&raw, OutputFormat::Anchorless, 9, &names(), 0.25).unwrap();
        assert_eq!(detections[0].class_id, 4);
        assert_eq!(detections[0].class_name, "unknown_4");
    }

    #[test]
    fn test_decode_drops_degenerate_and_non_finite() {
        let raw = [
            10.0, 10.0, 0.0, 5.0, 0.9, //
            10.0, 10.0, 5.0, -1.0, 0.9, //
            f32::NAN, 10.0, 5.0, 5.0, 0.9, //
            10.0, 10.0, f32::INFINITY, 5.0, 0.9, //
            10.0, 10.0, 5.0, 5.0, f32::NAN, //
            10.0, 10.0, 5.0, 5.0, 0.9,
        ];
        let detections = decode(&raw, OutputFormat::Anchorless, 5, &names(), 0.25).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, BoundingBox::new(7.5, 7.5, 5.0, 5.0));
    }

    #[test]
    fn test_decode_format_errors() {
        let raw = [0.0; 12];
        assert!(matches!(
            decode(&raw, OutputFormat::Anchorless, 5, &names(), 0.25),
            Err(Error::DecodeFormat(_))
        ));
        assert!(matches!(
            decode(&raw, OutputFormat::Anchorless, 4, &names(), 0.25),
            Err(Error::DecodeFormat(_))
        ));
        assert!(matches!(
            decode(&raw, OutputFormat::Objectness, 6, &names(), 0.25),
            Ok(_)
        ));
        assert!(matches!(
            decode(&raw[..10], OutputFormat::Objectness, 5, &names(), 0.25),
            Err(Error::DecodeFormat(_))
        ));
    }

    #[test]
    fn test_decode_empty_buffer() {
        let detections = decode(&[], OutputFormat::Anchorless, 6, &names(), 0.25).unwrap();
        assert!(detections.is_empty());
    }

    #[test]
    fn test_threshold_monotonic() {
        let anchorless = (0..200)
            .flat_map(|i| {
                let score = (i as f32 * 0.37).fract();
                [
                    i as f32,
                    i as f32,
                    8.0,
                    8.0,
                    score,
                    (score * 0.5).fract(),
                    1.0 - score,
                ]
            })
            .collect::<Vec<_>>();
        let objectness = (0..200)
            .flat_map(|i| {
                let score = (i as f32 * 0.37).fract();
                [
                    i as f32,
                    i as f32,
                    8.0,
                    8.0,
                    (i as f32 * 0.61).fract(),
                    score,
                    (score * 0.5).fract(),
                    1.0 - score,
                ]
            })
            .collect::<Vec<_>>();

        for (raw, format, stride) in [
            (&anchorless, OutputFormat::Anchorless, 7),
            (&objectness, OutputFormat::Objectness, 8),
        ] {
            let mut previous = usize::MAX;
            for step in 0..=20 {
                let threshold = step as f32 * 0.05;
                let count = decode(raw, format, stride, &names(), threshold)
                    .unwrap()
                    .len();
                assert!(
                    count <= previous,
                    "{:?}: {} > {} at {}",
                    format,
                    count,
                    previous,
                    threshold
                );
                if step == 0 {
                    assert!(count > 0, "{:?} decoded nothing", format);
                }
                previous = count;
            }
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let stride = 6;
        let rows = PARALLEL_ROWS + 17;
        let raw = (0..rows)
            .flat_map(|i| {
                let score = ((i * 7919) % 101) as f32 / 100.0;
                [i as f32, 2.0 * i as f32, 16.0, 12.0, score, 1.0 - score]
            })
            .collect::<Vec<_>>();

        let parallel = decode(&raw, OutputFormat::Anchorless, stride, &names(), 0.3).unwrap();

        let sequential = raw
            .chunks_exact(stride)
            .flat_map(|row| decode(row, OutputFormat::Anchorless, stride, &names(), 0.3).unwrap())
            .collect::<Vec<_>>();

        assert_eq!(parallel, sequential);
    }
}

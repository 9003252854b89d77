// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciles external region hints with classified boundaries.
//!
//! Each hint region is mapped into page units and scored against every
//! boundary as `area(boundary bbox ∩ region) / area(region)`. The best
//! eligible boundary takes the hint's label when its score clears
//! `min_hint_overlap`; otherwise the geometric label stands. Boundaries are
//! only ever relabeled, never removed.
//!
//! Exterior-outer and exterior-inner are exclusive. A boundary holding one
//! of them only answers to a hint with that same label, since its bounding
//! box encloses most other hint regions. Assigning an exclusive label
//! demotes the previous holder to interior. Hints are applied in descending
//! source confidence and a boundary claimed by one hint is skipped by the
//! rest.
//!
//! Every boundary whose box encloses the region scores 1.0, so ties go to
//! the tightest fit: the smallest bounding box, then the finer trace.

use crate::config::TraceConfig;
use crate::types::{BoundingBox, ClassifiedBoundary, HintInput, LabelSource, WallLabel};

/// Score given to a boundary that lost an exclusive label to a hint
const DEMOTED_SCORE: f64 = 0.5;

/// How many hints were applied and how many fell through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HintOutcome {
    pub applied: usize,
    pub ignored: usize,
}

/// Share of `region` covered by `bounds`.
pub fn overlap_score(bounds: &BoundingBox, region: &BoundingBox) -> f64 {
    let area = region.area();
    if area <= 0.0 {
        return 0.0;
    }
    (bounds.intersection_area(region) / area).clamp(0.0, 1.0)
}

/// Applies every hint in `input` to `boundaries`.
pub fn apply_hints(
    boundaries: &mut [ClassifiedBoundary],
    input: &HintInput,
    config: &TraceConfig,
) -> HintOutcome {
    let mut outcome = HintOutcome::default();
    let mut claimed = vec![false; boundaries.len()];

    let mut order: Vec<usize> = (0..input.hints.len()).collect();
    order.sort_by(|&a, &b| {
        input.hints[b]
            .source_confidence
            .total_cmp(&input.hints[a].source_confidence)
    });

    for hint in order.into_iter().map(|i| &input.hints[i]) {
        let label: WallLabel = match hint.label.parse() {
            Ok(label) => label,
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring hint");
                outcome.ignored += 1;
                continue;
            }
        };

        let region = input.transform.apply_box(&hint.region);
        if !region.is_finite() || region.area() <= 0.0 {
            tracing::debug!(label = %label, "Ignoring hint with empty region");
            outcome.ignored += 1;
            continue;
        }

        let best = boundaries
            .iter()
            .enumerate()
            .filter(|&(i, b)| !claimed[i] && (!b.label.is_exclusive() || b.label == label))
            .map(|(i, b)| (i, overlap_score(&b.bounds, &region)))
            .max_by(|&(x, x_score), &(y, y_score)| {
                let (bx, by) = (&boundaries[x], &boundaries[y]);
                x_score
                    .total_cmp(&y_score)
                    .then(by.bounds.area().total_cmp(&bx.bounds.area()))
                    .then(bx.point_count.cmp(&by.point_count))
                    .then(y.cmp(&x))
            });

        match best {
            Some((index, score)) if score > config.min_hint_overlap => {
                if label.is_exclusive() {
                    for (i, other) in boundaries.iter_mut().enumerate() {
                        if i != index && other.label == label {
                            other.label = WallLabel::Interior;
                            other.score = DEMOTED_SCORE;
                            other.source = LabelSource::Hint;
                        }
                    }
                }

                let boundary = &mut boundaries[index];
                tracing::debug!(
                    label = %label,
                    previous = %boundary.label,
                    score,
                    "Hint matched boundary"
                );
                boundary.label = label;
                boundary.score = score;
                boundary.source = LabelSource::Hint;
                claimed[index] = true;
                outcome.applied += 1;
            }
            _ => {
                tracing::debug!(
                    label = %label,
                    best = best.map(|b| b.1).unwrap_or(0.0),
                    "No boundary clears the hint overlap threshold"
                );
                outcome.ignored += 1;
            }
        }
    }

    outcome
}

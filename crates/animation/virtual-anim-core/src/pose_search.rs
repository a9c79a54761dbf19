//! Distance-curve pose matching.
//!
//! Clips can carry a distance curve (for example distance-to-stop-point per
//! time). Matching the outgoing clip's current distance against the incoming
//! clip's curve yields the time at which the incoming clip should start so the
//! two poses line up. Keys with a value of exactly zero mark "no data" and are
//! skipped.

use crate::curve::{Curve, CurveKey};

/// Matches closer than this are accepted immediately.
const EARLY_ACCEPT: f32 = 0.1;
/// Tolerance for comparing a weight curve against its match value.
const WEIGHT_TOLERANCE: f32 = 1.0e-4;

#[inline]
fn within(value: f32, min: f32, max: f32) -> bool {
    value >= min && value <= max
}

/// Linearly solve for the time at which the segment `[a, b]` reaches `distance`.
#[inline]
fn solve_segment(distance: f32, a: CurveKey, b: CurveKey) -> f32 {
    let range = b.value - a.value;
    let weight = if range == 0.0 {
        0.0
    } else {
        (distance - a.value) / range
    };
    a.time + (b.time - a.time) * weight
}

/// Find the time in `curve` whose value best matches `distance`.
///
/// Returns the interpolated time of the first segment bracketing `distance`, or the
/// key time with the smallest absolute difference seen before that. `None` when the
/// curve has no usable segment.
pub fn match_distance(distance: f32, curve: &Curve) -> Option<f32> {
    let mut best_delta = f32::MAX;
    let mut best_time = None;

    for pair in curve.keys().windows(2) {
        let (last, key) = (pair[0], pair[1]);
        if key.value == 0.0 || last.value == 0.0 {
            continue;
        }

        let delta = distance - key.value;
        if best_delta.abs() > delta.abs() {
            best_delta = delta;
            best_time = Some(key.time);
            if best_delta.abs() <= EARLY_ACCEPT {
                return best_time;
            }
        }

        let (low, high) = if key.value >= last.value {
            (last.value, key.value)
        } else {
            (key.value, last.value)
        };
        if within(distance, low, high) {
            return Some(solve_segment(distance, last, key));
        }
    }

    best_time
}

/// Sample the outgoing distance at `eval_pos` on `previous`, then match it against `future`.
///
/// `None` when the outgoing distance is unavailable (zero) or nothing matches.
pub fn compare_poses(eval_pos: f32, previous: &Curve, future: &Curve) -> Option<f32> {
    let mut previous_distance = 0.0;
    for pair in previous.keys().windows(2) {
        let (last, key) = (pair[0], pair[1]);
        if key.value == 0.0 || last.value == 0.0 {
            continue;
        }
        if within(eval_pos, last.time, key.time) {
            let span = key.time - last.time;
            let weight = if span == 0.0 {
                0.0
            } else {
                (eval_pos - last.time) / span
            };
            previous_distance = last.value + (key.value - last.value) * weight;
            break;
        } else if eval_pos <= key.time {
            previous_distance = key.value;
            break;
        }
    }

    if previous_distance == 0.0 {
        return None;
    }
    match_distance(previous_distance, future)
}

/// Check whether `weight_curve` equals `match_value` at `eval_pos`.
///
/// On a match, returns the time elapsed since the start of the plateau: when the
/// three keys around the bracketing segment share one value, the delta is measured
/// from the middle key.
pub fn weight_range_delta(eval_pos: f32, weight_curve: &Curve, match_value: f32) -> Option<f32> {
    let keys = weight_curve.keys();
    for index in 1..keys.len() {
        let (last, key) = (keys[index - 1], keys[index]);
        if within(eval_pos, last.time, key.time) {
            let mut delta = eval_pos - last.time;
            if index >= 2 {
                let (a, b, c) = (keys[index - 2], keys[index - 1], keys[index]);
                if a.value == b.value && b.value == c.value {
                    delta = eval_pos - b.time;
                }
            } else if let Some(next) = keys.get(index + 1) {
                if last.value == key.value && key.value == next.value {
                    delta = eval_pos - key.time;
                }
            }

            let span = key.time - last.time;
            let weight = if span == 0.0 {
                0.0
            } else {
                (eval_pos - last.time) / span
            };
            let value = last.value + (key.value - last.value) * weight;
            return ((value - match_value).abs() <= WEIGHT_TOLERANCE).then_some(delta);
        } else if eval_pos <= key.time {
            return None;
        }
    }
    None
}

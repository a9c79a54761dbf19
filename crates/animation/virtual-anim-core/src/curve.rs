//! Scalar float curves attached to clips (distance, weight, custom channels).

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
}

/// Piecewise-linear curve. Keys are kept sorted by time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<CurveKey>", into = "Vec<CurveKey>")]
pub struct Curve {
    keys: Vec<CurveKey>,
}

impl From<Vec<CurveKey>> for Curve {
    fn from(keys: Vec<CurveKey>) -> Self {
        Self::new(keys)
    }
}

impl From<Curve> for Vec<CurveKey> {
    fn from(curve: Curve) -> Self {
        curve.keys
    }
}

impl Curve {
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.retain(|k| k.time.is_finite() && k.value.is_finite());
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    pub fn from_pairs(pairs: &[(f32, f32)]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|&(time, value)| CurveKey { time, value })
                .collect(),
        )
    }

    #[inline]
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Linear evaluation; holds the end values outside the key range, 0 when empty.
    pub fn evaluate(&self, time: f32) -> f32 {
        let keys = &self.keys;
        match keys.len() {
            0 => 0.0,
            1 => keys[0].value,
            n => {
                if time <= keys[0].time {
                    return keys[0].value;
                }
                if time >= keys[n - 1].time {
                    return keys[n - 1].value;
                }
                let upper = keys.partition_point(|k| k.time <= time);
                let (a, b) = (keys[upper - 1], keys[upper]);
                let span = b.time - a.time;
                if span <= f32::EPSILON {
                    return b.value;
                }
                a.value + (b.value - a.value) * ((time - a.time) / span)
            }
        }
    }
}

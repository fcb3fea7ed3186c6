//! Distance metrics for similarity joins.
//!
//! Numeric metrics operate on `f64` feature vectors gathered from the join
//! columns (integers are widened). Jaccard operates on the set of feature
//! values of a row, regardless of the column each value came from.

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Mean Earth radius used by [`haversine`], in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance metric for similarity joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimMetric {
    /// Sum of absolute differences.
    L1,
    /// Euclidean norm of the difference.
    L2,
    /// `1 - |A ∩ B| / |A ∪ B|` over the rows' feature value sets.
    Jaccard,
    /// Great-circle distance in km between `(lat, lon)` pairs given in degrees.
    Haversine,
}

impl SimMetric {
    /// Returns true if the metric needs numeric feature columns.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Jaccard)
    }

    /// Number of feature columns the metric requires, if fixed.
    #[must_use]
    pub const fn required_columns(self) -> Option<usize> {
        match self {
            Self::Haversine => Some(2),
            _ => None,
        }
    }

    /// Distance between two numeric feature vectors.
    ///
    /// `Jaccard` treats each vector as a set of bit patterns.
    #[must_use]
    pub fn vector_distance(self, a: &[f64], b: &[f64]) -> f64 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            Self::L1 => l1_distance(a, b),
            Self::L2 => l2_distance(a, b),
            Self::Haversine => haversine(a[0], a[1], b[0], b[1]),
            Self::Jaccard => {
                let sa: FxHashSet<u64> = a.iter().map(|v| v.to_bits()).collect();
                let sb: FxHashSet<u64> = b.iter().map(|v| v.to_bits()).collect();
                jaccard_distance(&sa, &sb)
            }
        }
    }
}

/// Sum of absolute differences.
#[must_use]
#[inline]
pub fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

/// Euclidean distance.
#[must_use]
#[inline]
pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Jaccard distance between two sets. Two empty sets are at distance 0.
#[must_use]
pub fn jaccard_distance<T: Eq + Hash>(a: &FxHashSet<T>, b: &FxHashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    #[allow(clippy::cast_precision_loss)]
    let similarity = inter as f64 / union as f64;
    1.0 - similarity
}

/// Great-circle distance in km between two points given in degrees.
#[must_use]
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

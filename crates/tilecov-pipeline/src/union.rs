//! Cascaded polygon union.
//!
//! Folding many polygons into one accumulator re-processes the growing
//! result on every step. Splitting the input in halves and merging the
//! partial unions keeps every boolean operation small, and the two halves
//! are independent so they run as a fork/join pair on the rayon pool.

use geo::{BooleanOps, MultiPolygon};

/// Inputs at or below this count are unioned directly instead of split.
pub const DIRECT_UNION_THRESHOLD: usize = 4;

/// Union all `parts` into a single geometry.
///
/// Lists larger than [`DIRECT_UNION_THRESHOLD`] are split at the midpoint;
/// both halves are reduced in parallel with [`rayon::join`] and the two
/// results are unioned. Runs on whichever rayon pool is current, so
/// callers bound parallelism with `ThreadPool::install`.
///
/// An empty input yields an empty geometry. A panic inside either half
/// propagates to the caller once both halves have finished.
#[must_use = "returns the unioned geometry"]
pub fn cascaded_union(parts: &[MultiPolygon<f64>]) -> MultiPolygon<f64> {
    if parts.len() <= DIRECT_UNION_THRESHOLD {
        return union_direct(parts);
    }

    let (left, right) = parts.split_at(parts.len() / 2);
    let (left, right) = rayon::join(|| cascaded_union(left), || cascaded_union(right));
    left.union(&right)
}

fn union_direct(parts: &[MultiPolygon<f64>]) -> MultiPolygon<f64> {
    match parts {
        [] => MultiPolygon::new(Vec::new()),
        [single] => single.clone(),
        [first, rest @ ..] => rest.iter().fold(first.clone(), |acc, part| acc.union(part)),
    }
}

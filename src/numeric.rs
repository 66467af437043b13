//! Parallel vector reductions over abundance vectors.
//!
//! Partial sums are computed over fixed size chunks and combined in chunk
//! order, the result doesn't depend on the number of threads.

/* crate use */
use rayon::prelude::*;

/// Number of values reduced by one task
pub const CHUNK_SIZE: usize = 4096;

/// Sum of all values
pub fn sum(values: &[f64]) -> f64 {
    values
        .par_chunks(CHUNK_SIZE)
        .map(|chunk| chunk.iter().sum::<f64>())
        .collect::<Vec<f64>>()
        .iter()
        .sum()
}

/// Dot product of `u` and `v`
pub fn dot(u: &[f64], v: &[f64]) -> f64 {
    debug_assert_eq!(u.len(), v.len());

    u.par_chunks(CHUNK_SIZE)
        .zip(v.par_chunks(CHUNK_SIZE))
        .map(|(a, b)| a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>())
        .collect::<Vec<f64>>()
        .iter()
        .sum()
}

/// Euclidean norm
pub fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// L1 distance between `u` and `v`
pub fn abs_diff(u: &[f64], v: &[f64]) -> f64 {
    debug_assert_eq!(u.len(), v.len());

    u.par_chunks(CHUNK_SIZE)
        .zip(v.par_chunks(CHUNK_SIZE))
        .map(|(a, b)| a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum::<f64>())
        .collect::<Vec<f64>>()
        .iter()
        .sum()
}

/// Scale `values` so they sum to one, values are untouched if their sum is zero.
///
/// Return the sum before normalization.
pub fn normalize(values: &mut [f64]) -> f64 {
    let total = sum(values);

    if total > 0.0 {
        let inv_total = 1.0 / total;
        values.par_iter_mut().for_each(|x| *x *= inv_total);
    } else {
        log::warn!("can't normalize a vector with sum {}", total);
    }

    total
}

//! Pure numeric helpers shared by clustering and ranking.
//!
//! Vectors are stored as `f32`; accumulation happens in `f64`.

use crate::error::{Result, SimWordsError};

/// Sum of squared coordinate differences.
///
/// Returns `DimensionMismatch` when the inputs differ in length.
pub fn squared_distance(a: &[f32], b: &[f32]) -> Result<f64> {
    check_dimensions(a.len(), b.len())?;
    Ok(squared_distance_unchecked(a, b))
}

/// Squared distance for inputs whose dimensions were validated up front.
#[inline]
pub fn squared_distance_unchecked(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = (*x as f64) - (*y as f64);
            d * d
        })
        .sum()
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum()
}

#[inline]
pub fn norm(v: &[f32]) -> f64 {
    dot(v, v).sqrt()
}

/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0.0 if either vector has zero magnitude. Inputs of different
/// length are compared over their common prefix; callers that need a hard
/// check validate dimensions before scoring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mag_a = norm(a);
    let mag_b = norm(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot(a, b) / (mag_a * mag_b)
}

/// Divide every coordinate by the L2 norm.
///
/// A zero vector is returned unchanged.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| ((*x as f64) / n) as f32).collect()
}

/// True when every coordinate is zero (or the vector is empty).
pub fn is_zero(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

pub fn check_dimensions(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(SimWordsError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    #[test]
    fn test_squared_distance() {
        let d = squared_distance(&[0.0, 0.0], &[3.0, 4.0]).unwrap();
        assert!((d - 25.0).abs() < EPS);
    }

    #[test]
    fn test_squared_distance_dimension_mismatch() {
        let err = squared_distance(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(
            err,
            SimWordsError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_cosine_self_similarity_is_one() {
        let v = [0.3f32, -1.2, 4.5, 0.01];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_reference_values() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < EPS);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < EPS);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < EPS);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_normalize_has_unit_norm() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 1e-6);
        assert!((n[1] - 0.8).abs() < 1e-6);
        assert!((norm(&n) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = l2_normalize(&[1.5, -2.0, 0.25]);
        let twice = l2_normalize(&once);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_normalize_zero_vector_is_noop() {
        let z = l2_normalize(&[0.0, 0.0, 0.0]);
        assert_eq!(z, vec![0.0, 0.0, 0.0]);
        assert!(z.iter().all(|x| !x.is_nan()));
        assert!(is_zero(&z));
    }
}

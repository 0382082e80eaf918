//! Dense vector helpers shared by the projection, reduction, edge and merge
//! stages. Mixed-length inputs are a contract error, never silently padded.

use rand::Rng;

use crate::constants::EPSILON;
use crate::error::{CoreError, Result};

fn check_dims(a: &[f64], b: &[f64]) -> Result<()> {
    if a.len() != b.len() {
        return Err(CoreError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

pub fn dot(a: &[f64], b: &[f64]) -> Result<f64> {
    check_dims(a, b)?;
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}

pub fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Cosine similarity in [-1, 1]. Zero vectors have similarity 0.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64> {
    let d = dot(a, b)?;
    let denom = norm(a) * norm(b);
    if denom < EPSILON {
        return Ok(0.0);
    }
    Ok((d / denom).clamp(-1.0, 1.0))
}

pub fn euclidean_distance(a: &[f64], b: &[f64]) -> Result<f64> {
    check_dims(a, b)?;
    Ok(a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt())
}

/// Scale to unit length in place. Near-zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f64]) {
    let n = norm(v);
    if n < EPSILON {
        return;
    }
    for x in v.iter_mut() {
        *x /= n;
    }
}

pub fn mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Population variance.
pub fn variance(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let m = mean(v);
    v.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / v.len() as f64
}

/// Standard normal sample via the Box-Muller transform.
pub fn gauss_random(rng: &mut impl Rng) -> f64 {
    // Shift into (0, 1] so ln never sees zero
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_cosine_parallel_and_orthogonal() {
        assert_relative_eq!(
            cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]).unwrap(),
            1.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).unwrap(),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let err = cosine_similarity(&[1.0, 2.0, 3.0], &[1.0]).unwrap_err();
        assert_eq!(
            err,
            CoreError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        );
        assert!(euclidean_distance(&[1.0], &[]).is_err());
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_relative_eq!(norm(&v), 1.0, epsilon = 1e-12);
        assert_relative_eq!(v[0], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn test_mean_and_variance() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(mean(&v), 2.5);
        assert_relative_eq!(variance(&v), 1.25);
        assert_eq!(variance(&[]), 0.0);
    }

    #[test]
    fn test_gauss_random_moments() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<f64> = (0..20_000).map(|_| gauss_random(&mut rng)).collect();
        assert!(mean(&samples).abs() < 0.05);
        assert!((variance(&samples) - 1.0).abs() < 0.05);
        assert!(samples.iter().all(|x| x.is_finite()));
    }
}

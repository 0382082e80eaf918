//! High-dimensional → low-dimensional reduction.
//!
//! A trained reducer holds a mean vector and an orthonormal basis found by
//! power iteration with Gram-Schmidt deflation. An untrained reducer
//! averages contiguous coordinate groups instead.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::point::ProjectedPoint;
use crate::vector::{dot, l2_normalize, norm};

const POWER_ITERATIONS: usize = 50;
const CONFIDENCE_DECAY: f64 = 0.95;
/// Below this norm a component is considered collapsed.
const COLLAPSE_NORM: f64 = 1e-12;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionOptions {
    pub target_dim: usize,
}

impl Default for ReductionOptions {
    fn default() -> Self {
        Self { target_dim: 8 }
    }
}

#[derive(Clone, Debug)]
struct Basis {
    mean: Vec<f64>,
    /// Orthonormal principal directions; may hold fewer than `target_dim`.
    components: Vec<Vec<f64>>,
}

#[derive(Clone, Debug)]
pub struct Reducer {
    target_dim: usize,
    basis: Option<Basis>,
}

impl Default for Reducer {
    fn default() -> Self {
        Self::new(ReductionOptions::default())
    }
}

impl Reducer {
    pub fn new(options: ReductionOptions) -> Self {
        Self {
            target_dim: options.target_dim,
            basis: None,
        }
    }

    pub fn target_dim(&self) -> usize {
        self.target_dim
    }

    pub fn is_trained(&self) -> bool {
        self.basis.is_some()
    }

    /// Number of non-degenerate components found during training.
    pub fn component_count(&self) -> usize {
        self.basis.as_ref().map_or(0, |b| b.components.len())
    }

    /// Fit mean and principal directions to `samples`.
    pub fn train(&mut self, samples: &[Vec<f64>]) -> Result<()> {
        let first = samples
            .first()
            .ok_or_else(|| CoreError::EmptyInput("no training samples".into()))?;
        let dim = first.len();
        if dim == 0 {
            return Err(CoreError::EmptyInput("zero-length training samples".into()));
        }
        for s in samples {
            if s.len() != dim {
                return Err(CoreError::DimensionMismatch {
                    expected: dim,
                    actual: s.len(),
                });
            }
        }

        let n = samples.len() as f64;
        let mut mean = vec![0.0; dim];
        for s in samples {
            for (m, x) in mean.iter_mut().zip(s) {
                *m += x / n;
            }
        }
        let centered: Vec<Vec<f64>> = samples
            .iter()
            .map(|s| s.iter().zip(&mean).map(|(x, m)| x - m).collect())
            .collect();

        let wanted = self.target_dim.min(dim);
        let mut components: Vec<Vec<f64>> = Vec::with_capacity(wanted);
        for c in 0..wanted {
            // Deterministic start vector: unit axis c with a small ramp so it
            // is never exactly orthogonal to the leading direction.
            let mut v: Vec<f64> = (0..dim)
                .map(|i| if i == c { 1.0 } else { 1.0 / (dim as f64 + i as f64) })
                .collect();
            orthogonalize(&mut v, &components)?;
            if norm(&v) < COLLAPSE_NORM {
                break;
            }
            l2_normalize(&mut v);

            for _ in 0..POWER_ITERATIONS {
                let mut next = covariance_apply(&centered, &v)?;
                orthogonalize(&mut next, &components)?;
                if norm(&next) < COLLAPSE_NORM {
                    v = next;
                    break;
                }
                l2_normalize(&mut next);
                v = next;
            }
            if norm(&v) < COLLAPSE_NORM {
                break;
            }
            components.push(v);
        }

        self.basis = Some(Basis { mean, components });
        Ok(())
    }

    /// Reduce one point. Confidence is multiplied by 0.95; the trace and
    /// semantic tag carry over and the output gets a fresh id.
    pub fn reduce(&self, point: &ProjectedPoint) -> Result<ProjectedPoint> {
        if self.target_dim == 0 {
            return Err(CoreError::InvalidOption("target_dim must be > 0".into()));
        }
        let vector = match &self.basis {
            Some(basis) => {
                if point.vector.len() != basis.mean.len() {
                    return Err(CoreError::DimensionMismatch {
                        expected: basis.mean.len(),
                        actual: point.vector.len(),
                    });
                }
                let centered: Vec<f64> = point
                    .vector
                    .iter()
                    .zip(&basis.mean)
                    .map(|(x, m)| x - m)
                    .collect();
                let mut out = vec![0.0; self.target_dim];
                for (slot, component) in out.iter_mut().zip(&basis.components) {
                    *slot = dot(&centered, component)?;
                }
                out
            }
            None => group_average(&point.vector, self.target_dim),
        };

        Ok(ProjectedPoint::new(
            point.cluster_id,
            vector,
            point.confidence * CONFIDENCE_DECAY,
            point.semantic_tag.clone(),
            point.trace.clone(),
        ))
    }

    pub fn reduce_all(&self, points: &[ProjectedPoint]) -> Result<Vec<ProjectedPoint>> {
        points.iter().map(|p| self.reduce(p)).collect()
    }
}

/// `C·v` with `C = (1/n) Σ x xᵀ` over centered samples, without forming C.
fn covariance_apply(centered: &[Vec<f64>], v: &[f64]) -> Result<Vec<f64>> {
    let n = centered.len() as f64;
    let mut out = vec![0.0; v.len()];
    for x in centered {
        let proj = dot(x, v)?;
        for (o, xi) in out.iter_mut().zip(x) {
            *o += proj * xi / n;
        }
    }
    Ok(out)
}

/// Remove the projection of `v` onto every earlier component.
fn orthogonalize(v: &mut [f64], components: &[Vec<f64>]) -> Result<()> {
    for c in components {
        let proj = dot(v, c)?;
        for (vi, ci) in v.iter_mut().zip(c) {
            *vi -= proj * ci;
        }
    }
    Ok(())
}

/// Average of contiguous index ranges. Each output slot i covers
/// `[i·d/t, max(start+1, (i+1)·d/t))`; slots past the input are 0.
fn group_average(input: &[f64], target: usize) -> Vec<f64> {
    let d = input.len();
    (0..target)
        .map(|i| {
            let start = i * d / target;
            let end = ((i + 1) * d / target).max(start + 1).min(d);
            if start >= end {
                return 0.0;
            }
            input[start..end].iter().sum::<f64>() / (end - start) as f64
        })
        .collect()
}

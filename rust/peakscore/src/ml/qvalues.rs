use serde::{
    Deserialize,
    Serialize,
};
use statrs::distribution::{
    ContinuousCDF,
    Normal,
};

use super::{
    LabelledScore,
    TargetDecoy,
};
use crate::errors::DataProcessingError;

/// Assign q_values in place by target-decoy competition.
///
/// # Invariants
/// * `scores` must be sorted in descending order (e.g. best peak is first)
///
/// Implementation derived from the Sage implementation of qval github.com/lazear/sage
pub(crate) fn assign_qval<T: LabelledScore>(scores: &mut [T]) {
    let (Some(first_score), Some(last_score)) = (scores.first(), scores.last()) else {
        return;
    };
    debug_assert!(first_score.get_score() >= last_score.get_score());

    let mut decoy = 1;
    let mut target = 0;

    for score in scores.iter_mut() {
        match score.get_label() {
            TargetDecoy::Decoy => decoy += 1,
            TargetDecoy::Target => target += 1,
        }
        score.assign_qval(decoy as f32 / target as f32);
    }

    // Reverse slice, and calculate the cumulative minimum
    let mut q_min = 1.0f32;
    for score in scores.iter_mut().rev() {
        q_min = q_min.min(score.get_qval());
        score.assign_qval(q_min);
    }
}

/// Converts composite scores into p-values using the decoy score
/// distribution, assumed normal.
#[derive(Debug, Clone)]
pub struct QValueEstimator {
    mean: f64,
    stdev: f64,
    normal: Normal,
}

impl QValueEstimator {
    pub fn new(mean: f64, stdev: f64) -> Result<Self, DataProcessingError> {
        if !mean.is_finite() || !stdev.is_finite() || stdev <= 0.0 {
            return Err(DataProcessingError::ExpectedFiniteNonNanData {
                context: format!(
                    "decoy distribution for q-values (mean={}, stdev={})",
                    mean, stdev
                ),
            });
        }
        let normal = Normal::new(mean, stdev).map_err(|e| {
            DataProcessingError::ExpectedFiniteNonNanData {
                context: format!("decoy distribution for q-values: {}", e),
            }
        })?;
        Ok(Self {
            mean,
            stdev,
            normal,
        })
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn stdev(&self) -> f64 {
        self.stdev
    }

    /// Probability that a decoy scores at least `score`.
    pub fn p_value(&self, score: f64) -> f64 {
        if score.is_nan() {
            return f64::NAN;
        }
        self.normal.sf(score)
    }

    pub fn q_values(&self, scores: &[f64], mode: &QValueMode) -> Vec<f64> {
        let p_values: Vec<f64> = scores.iter().map(|s| self.p_value(*s)).collect();
        match mode {
            QValueMode::DecoyTail => p_values,
            QValueMode::Storey { lambda } => storey_q_values(&p_values, *lambda),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QValueMode {
    /// The p-value from the decoy distribution is reported as is.
    DecoyTail,
    /// Storey-Tibshirani correction over all tested peaks.
    Storey { lambda: f64 },
}

impl Default for QValueMode {
    fn default() -> Self {
        Self::DecoyTail
    }
}

impl QValueMode {
    pub fn storey() -> Self {
        Self::Storey { lambda: 0.4 }
    }
}

/// Storey q-values.
///
/// `pi0` is estimated from the fraction of p-values above `lambda`. NaN
/// p-values are not counted and come back as NaN.
pub fn storey_q_values(p_values: &[f64], lambda: f64) -> Vec<f64> {
    let mut order: Vec<usize> = (0..p_values.len())
        .filter(|&i| !p_values[i].is_nan())
        .collect();
    let n = order.len();
    let mut out = vec![f64::NAN; p_values.len()];
    if n == 0 {
        return out;
    }

    let above = order.iter().filter(|&&i| p_values[i] > lambda).count();
    let pi0 = if lambda < 1.0 {
        (above as f64 / ((1.0 - lambda) * n as f64)).min(1.0)
    } else {
        1.0
    };

    order.sort_by(|&a, &b| p_values[a].total_cmp(&p_values[b]));
    let mut q_min = 1.0f64;
    for (rank0, &i) in order.iter().enumerate().rev() {
        let q = pi0 * p_values[i] * n as f64 / (rank0 + 1) as f64;
        q_min = q_min.min(q);
        out[i] = q_min;
    }
    out
}

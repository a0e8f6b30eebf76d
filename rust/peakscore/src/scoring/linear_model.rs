use crate::errors::{
    DataProcessingError,
    TrainingError,
};

/// Weights (one per calculator slot, NaN = disabled) and a bias.
#[derive(Debug, Clone)]
pub struct LinearModelParams {
    weights: Vec<f64>,
    bias: f64,
}

impl LinearModelParams {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        self.weights.get(index).is_some_and(|w| !w.is_nan())
    }

    pub fn enabled_mask(&self) -> Vec<bool> {
        self.weights.iter().map(|w| !w.is_nan()).collect()
    }

    /// `bias + sum(w * f)` over enabled weights. A NaN feature behind an
    /// enabled weight makes the whole score NaN.
    pub fn score(&self, features: &[f64]) -> Result<f64, DataProcessingError> {
        if features.len() != self.weights.len() {
            return Err(DataProcessingError::ExpectedSlicesSameLength {
                expected: self.weights.len(),
                other: features.len(),
                context: "LinearModelParams::score".to_string(),
            });
        }
        let mut score = self.bias;
        for (w, f) in self.weights.iter().zip(features.iter()) {
            if w.is_nan() {
                continue;
            }
            score += w * f;
        }
        Ok(score)
    }

    /// Same weights with everything outside `enabled` set to NaN.
    pub fn masked(&self, enabled: &[bool]) -> Self {
        let weights = self
            .weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                if enabled.get(i).copied().unwrap_or(false) {
                    *w
                } else {
                    f64::NAN
                }
            })
            .collect();
        Self::new(weights, self.bias)
    }

    /// Shift and scale so that a score distributed with `mean`/`stdev`
    /// becomes a standard normal one.
    pub fn rescale(&self, mean: f64, stdev: f64) -> Result<Self, TrainingError> {
        if mean.is_nan() || stdev.is_nan() || stdev == 0.0 {
            return Err(TrainingError::DegenerateDecoyDistribution {
                mean,
                stdev,
                num_negatives: 0,
            });
        }
        let weights = self.weights.iter().map(|w| w / stdev).collect();
        Ok(Self::new(weights, (self.bias - mean) / stdev))
    }

    /// Share of the mean target score carried by each calculator,
    /// `w_i * m_i / sum_j(w_j * m_j)`.
    ///
    /// Disabled calculators get NaN. When the denominator is not usable
    /// (zero, or NaN because some enabled mean is NaN) every entry is NaN,
    /// which is how an incompatible model shows up.
    pub fn percent_contributions(&self, mean_features: &[f64]) -> Vec<f64> {
        let products: Vec<f64> = self
            .weights
            .iter()
            .enumerate()
            .map(|(i, w)| {
                if w.is_nan() {
                    f64::NAN
                } else {
                    w * mean_features.get(i).copied().unwrap_or(f64::NAN)
                }
            })
            .collect();
        let total: f64 = products
            .iter()
            .zip(self.weights.iter())
            .filter(|(_, w)| !w.is_nan())
            .map(|(p, _)| *p)
            .sum();
        if !total.is_finite() || total == 0.0 {
            return vec![f64::NAN; self.weights.len()];
        }
        products.into_iter().map(|p| p / total).collect()
    }
}

fn same_value(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}

impl PartialEq for LinearModelParams {
    fn eq(&self, other: &Self) -> bool {
        same_value(self.bias, other.bias)
            && self.weights.len() == other.weights.len()
            && self
                .weights
                .iter()
                .zip(other.weights.iter())
                .all(|(a, b)| same_value(*a, *b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_skips_disabled() {
        let params = LinearModelParams::new(vec![2.0, f64::NAN, -1.0], 0.5);
        assert_eq!(params.score(&[1.0, 100.0, 3.0]).unwrap(), -0.5);
        assert_eq!(params.score(&[1.0, f64::NAN, 3.0]).unwrap(), -0.5);
        assert!(params.score(&[f64::NAN, 0.0, 3.0]).unwrap().is_nan());
        assert!(params.score(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_rescale() {
        let params = LinearModelParams::new(vec![2.0, f64::NAN], 1.0);
        let scaled = params.rescale(3.0, 2.0).unwrap();
        assert_eq!(scaled.weights()[0], 1.0);
        assert!(scaled.weights()[1].is_nan());
        assert_eq!(scaled.bias(), -1.0);

        assert!(params.rescale(f64::NAN, 1.0).is_err());
        assert!(params.rescale(0.0, 0.0).is_err());
    }

    #[test]
    fn test_percent_contributions_sum_to_one() {
        let params = LinearModelParams::new(vec![1.0, f64::NAN, -0.5, 2.0], -3.0);
        let contributions = params.percent_contributions(&[4.0, 7.0, -2.0, 0.5]);
        assert!(contributions[1].is_nan());
        let total: f64 = contributions.iter().filter(|x| !x.is_nan()).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((contributions[0] - 4.0 / 6.0).abs() < 1e-12);

        let incompatible = params.percent_contributions(&[f64::NAN, 1.0, 1.0, 1.0]);
        assert!(incompatible.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_eq_with_nan() {
        let a = LinearModelParams::new(vec![1.0, f64::NAN], 0.0);
        let b = LinearModelParams::new(vec![1.0, f64::NAN], 0.0);
        let c = LinearModelParams::new(vec![1.0, 0.0], 0.0);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

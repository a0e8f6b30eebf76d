use crate::errors::DataProcessingError;

/// Calculates the cosine similarity between two vectors of the same size.
///
/// # Example
///
/// ```
/// use peakscore::utils::correlation::cosine_similarity;
///
/// let a = vec![1.0, 2.0, 3.0];
/// let b = vec![4.0, 5.0, 6.0];
/// let result = cosine_similarity(&a, &b).unwrap();
/// assert!((result - 0.9746318).abs() < 1e-6);
/// ```
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, DataProcessingError> {
    if a.len() != b.len() || a.is_empty() {
        return Err(DataProcessingError::ExpectedSlicesSameLength {
            expected: a.len(),
            other: b.len(),
            context: "cosine_similarity".to_string(),
        });
    }

    let dot_product: f64 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let magnitude_a: f64 = a.iter().map(|&x| x * x).sum::<f64>().sqrt();
    let magnitude_b: f64 = b.iter().map(|&x| x * x).sum::<f64>().sqrt();

    // Avoid division by zero
    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(f64::NAN);
    }

    Ok(dot_product / (magnitude_a * magnitude_b))
}

/// Normalized spectral contrast angle, `1 - 2 * acos(cos) / pi`.
///
/// Both inputs are square-root transformed first, which is how library
/// and isotope dot-products are reported. 1.0 is a perfect match, 0.0 is
/// orthogonal. Returns NaN when the inputs are degenerate.
pub fn normalized_contrast_angle_sqrt(a: &[f64], b: &[f64]) -> f64 {
    let a: Vec<f64> = a.iter().map(|x| x.max(0.0).sqrt()).collect();
    let b: Vec<f64> = b.iter().map(|x| x.max(0.0).sqrt()).collect();
    match cosine_similarity(&a, &b) {
        Ok(cos) if cos.is_finite() => {
            let angle = cos.clamp(-1.0, 1.0).acos();
            1.0 - 2.0 * angle / std::f64::consts::PI
        }
        _ => f64::NAN,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossCorrelation {
    pub max_correlation: f64,
    pub lag: i64,
}

const MIN_OVERLAP: usize = 3;

/// Pearson correlation of `b` shifted by every lag in `[-max_lag, max_lag]`
/// against `a`, keeping the best one.
///
/// Lags are visited from the center outwards, so on ties the smallest
/// absolute shift wins. Returns `None` when no lag has at least three
/// overlapping points with non-zero variance on both sides.
pub fn cross_correlation(a: &[f32], b: &[f32], max_lag: usize) -> Option<CrossCorrelation> {
    let len = a.len().min(b.len());
    let mut best: Option<CrossCorrelation> = None;
    for step in 0..=(2 * max_lag) {
        let lag: i64 = if step % 2 == 0 {
            -((step / 2) as i64)
        } else {
            step.div_ceil(2) as i64
        };
        let Some(corr) = lagged_pearson(&a[..len], &b[..len], lag) else {
            continue;
        };
        match best {
            Some(x) if x.max_correlation >= corr => {}
            _ => {
                best = Some(CrossCorrelation {
                    max_correlation: corr,
                    lag,
                })
            }
        }
    }
    best
}

fn lagged_pearson(a: &[f32], b: &[f32], lag: i64) -> Option<f64> {
    let len = a.len() as i64;
    let start = 0.max(-lag);
    let end = len.min(len - lag);
    if end - start < MIN_OVERLAP as i64 {
        return None;
    }

    let n = (end - start) as f64;
    let pairs = (start..end).map(|i| (a[i as usize] as f64, b[(i + lag) as usize] as f64));
    let (sum_a, sum_b) = pairs.clone().fold((0.0, 0.0), |acc, (x, y)| (acc.0 + x, acc.1 + y));
    let mean_a = sum_a / n;
    let mean_b = sum_b / n;
    let (cov, var_a, var_b) = pairs.fold((0.0, 0.0, 0.0), |acc, (x, y)| {
        let dx = x - mean_a;
        let dy = y - mean_b;
        (acc.0 + dx * dy, acc.1 + dx * dx, acc.2 + dy * dy)
    });
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 2.0, 3.0];
        let b = vec![4.0, 5.0, 6.0];
        let result = cosine_similarity(&a, &b).unwrap();
        assert!((result - 0.974_631_85).abs() < 1e-6);
    }

    #[test]
    fn test_empty_vectors() {
        let a: Vec<f64> = vec![];
        let b: Vec<f64> = vec![];
        assert!(cosine_similarity(&a, &b).is_err());
    }

    #[test]
    fn test_different_lengths() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!(cosine_similarity(&a, &b).is_err());
    }

    #[test]
    fn test_zero_vector() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert!(cosine_similarity(&a, &b).unwrap().is_nan());
    }

    #[test]
    fn test_contrast_angle() {
        let a = vec![4.0, 9.0, 16.0];
        assert!((normalized_contrast_angle_sqrt(&a, &a) - 1.0).abs() < 1e-6);

        let orthogonal = normalized_contrast_angle_sqrt(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(orthogonal.abs() < 1e-9);

        assert!(normalized_contrast_angle_sqrt(&[0.0, 0.0], &[1.0, 1.0]).is_nan());
    }

    #[test]
    fn test_cross_correlation_finds_shift() {
        let a: Vec<f32> = vec![0.0, 0.0, 1.0, 4.0, 9.0, 4.0, 1.0, 0.0, 0.0, 0.0];
        let b: Vec<f32> = vec![0.0, 0.0, 0.0, 1.0, 4.0, 9.0, 4.0, 1.0, 0.0, 0.0];
        let res = cross_correlation(&a, &b, 2).unwrap();
        assert_eq!(res.lag, 1);
        assert!((res.max_correlation - 1.0).abs() < 1e-6);

        let same = cross_correlation(&a, &a, 2).unwrap();
        assert_eq!(same.lag, 0);
    }

    #[test]
    fn test_cross_correlation_flat() {
        let a: Vec<f32> = vec![1.0; 8];
        let b: Vec<f32> = vec![0.0, 1.0, 2.0, 3.0, 2.0, 1.0, 0.0, 0.0];
        assert!(cross_correlation(&a, &b, 2).is_none());
    }
}

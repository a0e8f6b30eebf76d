/// Arithmetic mean, NaN for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator), NaN for fewer than two values.
pub fn sample_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let mean = mean(values);
    let ss: f64 = values.iter().map(|x| (x - mean) * (x - mean)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Weighted mean of `(value, weight)` pairs, NaN when the total weight is zero.
pub fn weighted_mean(pairs: impl IntoIterator<Item = (f64, f64)>) -> f64 {
    let (num, den) = pairs
        .into_iter()
        .fold((0.0, 0.0), |acc, (v, w)| (acc.0 + v * w, acc.1 + w));
    if den <= 0.0 {
        return f64::NAN;
    }
    num / den
}

/// Round `n / 2` to the nearest integer, ties to even.
pub fn half_rounded_to_even(n: usize) -> usize {
    let half = n / 2;
    if n % 2 == 1 && half % 2 == 1 {
        half + 1
    } else {
        half
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_stdev() {
        let vals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&vals), 5.0);
        assert!((sample_stdev(&vals) - 2.138_089_935).abs() < 1e-8);
        assert!(sample_stdev(&[1.0]).is_nan());
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }

    #[test]
    fn test_half_rounded_to_even() {
        // 2.5 -> 2, 3.5 -> 4, 0.5 -> 0
        assert_eq!(half_rounded_to_even(5), 2);
        assert_eq!(half_rounded_to_even(7), 4);
        assert_eq!(half_rounded_to_even(1), 0);
        assert_eq!(half_rounded_to_even(10), 5);
    }
}

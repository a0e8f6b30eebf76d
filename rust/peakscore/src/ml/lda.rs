//! Two-class Fisher linear discriminant.
//!
//! `w = Sw^-1 (mu_pos - mu_neg)` where `Sw` is the pooled within-class
//! scatter. Only the columns listed by the caller take part in the fit.

use nalgebra::{
    DMatrix,
    DVector,
};
use tracing::debug;

const RIDGE_FACTOR: f64 = 1e-6;
const SINGULAR_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct LdaFit {
    /// One weight per requested column, unit length, oriented so that the
    /// positive class scores higher on average.
    pub weights: Vec<f64>,
    /// Set when the scatter matrix was singular and had to be regularized.
    pub regularized: bool,
}

fn class_mean(rows: &[&[f64]], columns: &[usize]) -> DVector<f64> {
    let mut mean = DVector::<f64>::zeros(columns.len());
    for row in rows {
        for (j, &c) in columns.iter().enumerate() {
            mean[j] += row[c];
        }
    }
    mean / rows.len() as f64
}

fn add_scatter(scatter: &mut DMatrix<f64>, rows: &[&[f64]], columns: &[usize], mean: &DVector<f64>) {
    let p = columns.len();
    let mut centered = DVector::<f64>::zeros(p);
    for row in rows {
        for (j, &c) in columns.iter().enumerate() {
            centered[j] = row[c] - mean[j];
        }
        scatter.ger(1.0, &centered, &centered, 1.0);
    }
}

/// Fit the discriminant direction. Returns `None` when the two classes
/// cannot be told apart (identical means) or a class is empty.
pub fn fisher_discriminant(
    positives: &[&[f64]],
    negatives: &[&[f64]],
    columns: &[usize],
) -> Option<LdaFit> {
    if positives.is_empty() || negatives.is_empty() || columns.is_empty() {
        return None;
    }
    let p = columns.len();
    let mu_pos = class_mean(positives, columns);
    let mu_neg = class_mean(negatives, columns);
    let diff = &mu_pos - &mu_neg;

    let mut scatter = DMatrix::<f64>::zeros(p, p);
    add_scatter(&mut scatter, positives, columns, &mu_pos);
    add_scatter(&mut scatter, negatives, columns, &mu_neg);

    let eigenvalues = scatter.clone().symmetric_eigenvalues();
    let singular = !(eigenvalues.min() > eigenvalues.max() * SINGULAR_TOLERANCE);
    let system = if singular {
        debug!("Within-class scatter is singular, adding a ridge");
        let ridge = RIDGE_FACTOR * (scatter.trace() / p as f64).max(1.0);
        let mut reg = scatter;
        for i in 0..p {
            reg[(i, i)] += ridge;
        }
        reg
    } else {
        scatter
    };

    let direction = match system.clone().cholesky() {
        Some(chol) => chol.solve(&diff),
        None => system.lu().solve(&diff)?,
    };

    let norm = direction.norm();
    if !norm.is_finite() || norm == 0.0 {
        return None;
    }
    let mut weights: Vec<f64> = direction.iter().map(|x| x / norm).collect();

    let projected_diff: f64 = weights.iter().zip(diff.iter()).map(|(w, d)| w * d).sum();
    if projected_diff < 0.0 {
        weights.iter_mut().for_each(|w| *w = -*w);
    }

    Some(LdaFit {
        weights,
        regularized: singular,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separates_on_informative_column() {
        // Column 0 separates the classes, column 1 is noise shared by both.
        let pos: Vec<Vec<f64>> = (0..15)
            .map(|i| vec![5.0 + (i % 3) as f64 * 0.1, (i / 3) as f64])
            .collect();
        let neg: Vec<Vec<f64>> = (0..15)
            .map(|i| vec![1.0 + (i % 3) as f64 * 0.1, (i / 3) as f64])
            .collect();
        let pos: Vec<&[f64]> = pos.iter().map(|x| x.as_slice()).collect();
        let neg: Vec<&[f64]> = neg.iter().map(|x| x.as_slice()).collect();

        let fit = fisher_discriminant(&pos, &neg, &[0, 1]).unwrap();
        assert!(!fit.regularized);
        assert!(fit.weights[0] > 0.99, "weights: {:?}", fit.weights);
        assert!(fit.weights[1].abs() < 1e-6);
        let norm: f64 = fit.weights.iter().map(|x| x * x).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_orientation_for_reversed_feature() {
        let pos: Vec<Vec<f64>> = (0..10).map(|i| vec![1.0 + (i % 2) as f64]).collect();
        let neg: Vec<Vec<f64>> = (0..10).map(|i| vec![8.0 + (i % 2) as f64]).collect();
        let pos: Vec<&[f64]> = pos.iter().map(|x| x.as_slice()).collect();
        let neg: Vec<&[f64]> = neg.iter().map(|x| x.as_slice()).collect();
        let fit = fisher_discriminant(&pos, &neg, &[0]).unwrap();
        assert_eq!(fit.weights, vec![-1.0]);
    }

    #[test]
    fn test_colinear_columns_regularize() {
        let pos: Vec<Vec<f64>> = (0..10).map(|i| vec![3.0 + i as f64, 3.0 + i as f64]).collect();
        let neg: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, i as f64]).collect();
        let pos: Vec<&[f64]> = pos.iter().map(|x| x.as_slice()).collect();
        let neg: Vec<&[f64]> = neg.iter().map(|x| x.as_slice()).collect();
        let fit = fisher_discriminant(&pos, &neg, &[0, 1]).unwrap();
        assert!(fit.regularized);
        assert!(fit.weights.iter().all(|w| *w > 0.0));
    }

    #[test]
    fn test_identical_classes() {
        let rows: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64]).collect();
        let rows: Vec<&[f64]> = rows.iter().map(|x| x.as_slice()).collect();
        assert!(fisher_discriminant(&rows, &rows, &[0]).is_none());
    }
}

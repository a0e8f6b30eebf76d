use super::mquest::max_lag_for;
use super::peak_data::{
    GroupPeakData,
    PeptidePeakData,
    TransitionPeakData,
};
use crate::utils::correlation::{
    cross_correlation,
    normalized_contrast_angle_sqrt,
};
use crate::utils::stats::{
    median,
    weighted_mean,
};

/// Points on each side of the peak used to estimate the noise floor.
const NOISE_HALF_RANGE: usize = 500;

/// `log10(height / median noise)` on the tallest transition with a trace.
pub(super) fn signal_noise<'a>(groups: impl Iterator<Item = &'a GroupPeakData>) -> f64 {
    let tallest = groups
        .flat_map(|g| g.transitions.iter().map(move |t| (g, t)))
        .filter(|(_, t)| t.intensities.is_some())
        .max_by(|a, b| a.1.peak.height.total_cmp(&b.1.peak.height));
    let Some((group, trans)) = tallest else {
        return f64::NAN;
    };
    let Some(intensities) = trans.intensities.as_deref() else {
        return f64::NAN;
    };
    let Some(range) = trans.peak.index_range(&group.times) else {
        return f64::NAN;
    };

    // The trace may be shorter than the time axis.
    let len = intensities.len();
    let start = *range.start();
    if start >= len {
        return f64::NAN;
    }
    let end = (*range.end() + 1).min(len);
    let mut noise: Vec<f32> = intensities[start.saturating_sub(NOISE_HALF_RANGE)..start]
        .iter()
        .chain(intensities[end..(end + NOISE_HALF_RANGE).min(len)].iter())
        .copied()
        .collect();
    let noise_level = median(&mut noise).unwrap_or(1.0).max(1.0) as f64;
    let height = (trans.peak.height as f64).max(1.0);
    (height / noise_level).log10()
}

/// Area weighted mean of absolute mass errors. Falls back to an unweighted
/// mean when none of the transitions has area.
pub(super) fn mass_error<'a>(
    groups: impl Iterator<Item = &'a GroupPeakData>,
    precursor: bool,
) -> f64 {
    let errors: Vec<(f64, f64)> = groups
        .flat_map(|g| g.transitions.iter())
        .filter(|t| t.is_ms1 == precursor)
        .filter_map(|t| {
            t.peak
                .mass_error_ppm
                .map(|e| ((e as f64).abs(), t.area().max(0.0)))
        })
        .collect();
    if errors.is_empty() {
        return f64::NAN;
    }
    let weighted = weighted_mean(errors.iter().copied());
    if weighted.is_nan() {
        return weighted_mean(errors.iter().map(|(e, _)| (*e, 1.0)));
    }
    weighted
}

fn summed_trace<'a>(
    group: &GroupPeakData,
    transitions: impl Iterator<Item = &'a TransitionPeakData>,
    window: &std::ops::RangeInclusive<usize>,
) -> Option<Vec<f32>> {
    let mut out: Option<Vec<f32>> = None;
    for trans in transitions {
        let Some(trace) = group.trace(trans, window) else {
            continue;
        };
        match out.as_mut() {
            None => out = Some(trace.to_vec()),
            Some(acc) => {
                for (a, b) in acc.iter_mut().zip(trace.iter()) {
                    *a += b;
                }
            }
        }
    }
    out
}

/// Best cross-correlation between the summed precursor trace and the summed
/// fragment trace.
pub(super) fn precursor_product_shape(peak: &PeptidePeakData) -> f64 {
    for group in peak.analyte_groups() {
        let Some(window) = group.window() else {
            continue;
        };
        let ms1 = summed_trace(group, group.ms1(), &window);
        let ms2 = summed_trace(group, group.ms2(), &window);
        if let (Some(ms1), Some(ms2)) = (ms1, ms2) {
            return cross_correlation(&ms1, &ms2, max_lag_for(&window))
                .map(|x| x.max_correlation)
                .unwrap_or(f64::NAN);
        }
    }
    f64::NAN
}

/// Dot-product of precursor isotope areas against the expected isotope
/// distribution.
pub(super) fn isotope_dot_product(peak: &PeptidePeakData) -> f64 {
    let (areas, expected): (Vec<f64>, Vec<f64>) = peak
        .analyte_groups()
        .flat_map(|g| g.ms1())
        .filter_map(|t| t.isotope_proportion.map(|p| (t.area(), p as f64)))
        .unzip();
    if areas.len() < 2 {
        return f64::NAN;
    }
    normalized_contrast_angle_sqrt(&areas, &expected)
}

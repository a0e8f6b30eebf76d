use super::peak_data::{
    GroupPeakData,
    PeakScoringContext,
    PeptidePeakData,
    TransitionPeakData,
};
use crate::utils::correlation::{
    CrossCorrelation,
    cross_correlation,
    normalized_contrast_angle_sqrt,
};
use crate::utils::stats::weighted_mean;

pub(super) fn intensity<'a>(groups: impl Iterator<Item = &'a GroupPeakData>) -> f64 {
    let mut any = false;
    let total: f64 = groups
        .flat_map(|g| g.ms2())
        .inspect(|_| any = true)
        .map(|t| t.area().max(0.0))
        .sum();
    if !any {
        return f64::NAN;
    }
    if total <= 1.0 { 0.0 } else { total.log10() }
}

/// Absolute distance between the apex (tallest analyte transition) and the
/// predicted retention time.
pub(super) fn retention_time_difference(
    context: &PeakScoringContext,
    peak: &PeptidePeakData,
) -> f64 {
    let Some(predicted) = context.predicted_retention_time else {
        return f64::NAN;
    };
    let apex = peak
        .analyte_groups()
        .flat_map(|g| g.transitions.iter())
        .max_by(|a, b| a.peak.height.total_cmp(&b.peak.height));
    match apex {
        Some(t) => (t.peak.retention_time as f64 - predicted).abs(),
        None => f64::NAN,
    }
}

/// Dot-product of the observed areas against the library intensities.
pub(super) fn library_correlation<'a>(groups: impl Iterator<Item = &'a GroupPeakData>) -> f64 {
    let (areas, library): (Vec<f64>, Vec<f64>) = groups
        .flat_map(|g| g.ms2())
        .filter_map(|t| t.library_intensity.map(|lib| (t.area(), lib as f64)))
        .unzip();
    if areas.len() < 2 {
        return f64::NAN;
    }
    normalized_contrast_angle_sqrt(&areas, &library)
}

/// Dot-product of the analyte areas against the matching standard areas.
pub(super) fn reference_correlation(peak: &PeptidePeakData) -> f64 {
    let Some((analyte, standard)) = reference_pair(peak) else {
        return f64::NAN;
    };
    let (a, s): (Vec<f64>, Vec<f64>) = analyte
        .ms2()
        .zip(standard.ms2())
        .map(|(a, s)| (a.area(), s.area()))
        .unzip();
    if a.len() < 2 {
        return f64::NAN;
    }
    normalized_contrast_angle_sqrt(&a, &s)
}

fn reference_pair(peak: &PeptidePeakData) -> Option<(&GroupPeakData, &GroupPeakData)> {
    let analyte = peak.analyte_groups().next()?;
    let standard = peak.standard_groups().next()?;
    Some((analyte, standard))
}

/// Cross-correlation of every MS2 transition pair within one group, paired
/// with the combined area of the pair.
fn pairwise_correlations(group: &GroupPeakData) -> Vec<(CrossCorrelation, f64)> {
    let Some(window) = group.window() else {
        return Vec::new();
    };
    let max_lag = max_lag_for(&window);
    let traces: Vec<(&TransitionPeakData, &[f32])> = group
        .ms2()
        .filter_map(|t| group.trace(t, &window).map(|tr| (t, tr)))
        .collect();

    let mut out = Vec::new();
    for i in 0..traces.len() {
        for j in (i + 1)..traces.len() {
            if let Some(xc) = cross_correlation(traces[i].1, traces[j].1, max_lag) {
                out.push((xc, traces[i].0.area() + traces[j].0.area()));
            }
        }
    }
    out
}

/// Cross-correlation of each analyte transition against the standard
/// transition in the same position.
fn reference_correlations(peak: &PeptidePeakData) -> Vec<(CrossCorrelation, f64)> {
    let Some((analyte, standard)) = reference_pair(peak) else {
        return Vec::new();
    };
    let (Some(aw), Some(sw)) = (analyte.window(), standard.window()) else {
        return Vec::new();
    };
    let max_lag = max_lag_for(&aw);
    analyte
        .ms2()
        .zip(standard.ms2())
        .filter_map(|(a, s)| {
            let at = analyte.trace(a, &aw)?;
            let st = standard.trace(s, &sw)?;
            cross_correlation(at, st, max_lag).map(|xc| (xc, a.area() + s.area()))
        })
        .collect()
}

pub(super) fn max_lag_for(window: &std::ops::RangeInclusive<usize>) -> usize {
    let width = window.end() - window.start() + 1;
    (width / 4).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum PairSource {
    Analyte,
    Standard,
    Reference,
}

fn correlations_for(peak: &PeptidePeakData, source: PairSource) -> Option<Vec<(CrossCorrelation, f64)>> {
    let pairs: Vec<(CrossCorrelation, f64)> = match source {
        PairSource::Analyte => peak.analyte_groups().flat_map(pairwise_correlations).collect(),
        PairSource::Standard => {
            if !peak.has_standard() {
                return None;
            }
            peak.standard_groups().flat_map(pairwise_correlations).collect()
        }
        PairSource::Reference => reference_correlations(peak),
    };
    if pairs.is_empty() { None } else { Some(pairs) }
}

/// Mean best cross-correlation over transition pairs.
pub(super) fn shape(peak: &PeptidePeakData, source: PairSource, weighted: bool) -> f64 {
    let Some(pairs) = correlations_for(peak, source) else {
        return f64::NAN;
    };
    weighted_mean(
        pairs
            .iter()
            .map(|(xc, w)| (xc.max_correlation, if weighted { *w } else { 1.0 })),
    )
}

/// Mean absolute shift (in points) at which transition pairs correlate best.
pub(super) fn coelution(peak: &PeptidePeakData, source: PairSource, weighted: bool) -> f64 {
    let Some(pairs) = correlations_for(peak, source) else {
        return f64::NAN;
    };
    weighted_mean(
        pairs
            .iter()
            .map(|(xc, w)| (xc.lag.unsigned_abs() as f64, if weighted { *w } else { 1.0 })),
    )
}

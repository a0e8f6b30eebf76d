use std::sync::Arc;

use crate::models::SummaryPeakData;

/// Peptide level information that does not change between candidates.
#[derive(Debug, Clone, Default)]
pub struct PeakScoringContext {
    pub predicted_retention_time: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TransitionPeakData {
    pub is_ms1: bool,
    pub library_intensity: Option<f32>,
    pub isotope_proportion: Option<f32>,
    pub peak: SummaryPeakData,
    pub intensities: Option<Arc<[f32]>>,
}

impl TransitionPeakData {
    pub fn area(&self) -> f64 {
        self.peak.area as f64
    }
}

/// One transition group's view of a candidate peak.
#[derive(Debug, Clone)]
pub struct GroupPeakData {
    pub is_standard: bool,
    pub times: Arc<[f32]>,
    pub transitions: Vec<TransitionPeakData>,
}

impl GroupPeakData {
    pub fn ms1(&self) -> impl Iterator<Item = &TransitionPeakData> {
        self.transitions.iter().filter(|t| t.is_ms1)
    }

    pub fn ms2(&self) -> impl Iterator<Item = &TransitionPeakData> {
        self.transitions.iter().filter(|t| !t.is_ms1)
    }

    /// Union of the transition index ranges of this candidate.
    pub fn window(&self) -> Option<std::ops::RangeInclusive<usize>> {
        self.transitions
            .iter()
            .filter_map(|t| t.peak.index_range(&self.times))
            .reduce(|a, b| (*a.start()).min(*b.start())..=(*a.end()).max(*b.end()))
    }

    /// Intensities of `trans` restricted to `window`.
    pub fn trace<'a>(
        &self,
        trans: &'a TransitionPeakData,
        window: &std::ops::RangeInclusive<usize>,
    ) -> Option<&'a [f32]> {
        let intensities = trans.intensities.as_deref()?;
        let end = (*window.end()).min(intensities.len().checked_sub(1)?);
        if *window.start() > end {
            return None;
        }
        Some(&intensities[*window.start()..=end])
    }
}

/// Every transition group of one scoring unit at one candidate peak.
#[derive(Debug, Clone, Default)]
pub struct PeptidePeakData {
    pub groups: Vec<GroupPeakData>,
}

impl PeptidePeakData {
    pub fn has_standard(&self) -> bool {
        self.groups.iter().any(|g| g.is_standard)
    }

    /// Groups measuring the analyte. Without an internal standard every
    /// group is an analyte.
    pub fn analyte_groups(&self) -> impl Iterator<Item = &GroupPeakData> {
        let has_standard = self.has_standard();
        self.groups
            .iter()
            .filter(move |g| !has_standard || !g.is_standard)
    }

    pub fn standard_groups(&self) -> impl Iterator<Item = &GroupPeakData> {
        self.groups.iter().filter(|g| g.is_standard)
    }
}

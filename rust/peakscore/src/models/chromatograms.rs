use serde::{
    Deserialize,
    Serialize,
};
use std::collections::HashMap;
use std::sync::Arc;

use super::document::{
    TransitionGroupId,
    TransitionId,
};
use crate::errors::DataProcessingError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakIdentification {
    #[default]
    False,
    True,
    Aligned,
}

impl PeakIdentification {
    pub fn is_identified(&self) -> bool {
        !matches!(self, PeakIdentification::False)
    }
}

/// One transition's integration of one candidate peak.
///
/// Times are in minutes, the indices point into the time axis of the
/// owning [GroupChromatograms].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryPeakData {
    pub retention_time: f32,
    pub start_time: f32,
    pub end_time: f32,
    pub area: f32,
    #[serde(default)]
    pub background_area: f32,
    pub height: f32,
    #[serde(default)]
    pub fwhm: f32,
    #[serde(default)]
    pub mass_error_ppm: Option<f32>,
    #[serde(default)]
    pub is_forced_integration: bool,
    #[serde(default)]
    pub identified: PeakIdentification,
    #[serde(default)]
    pub start_index: Option<usize>,
    #[serde(default)]
    pub end_index: Option<usize>,
    #[serde(default)]
    pub time_index: Option<usize>,
}

impl SummaryPeakData {
    /// Index range of the peak on `times`, inclusive of both ends.
    ///
    /// Falls back to searching the boundaries when the indices were not
    /// recorded.
    pub fn index_range(&self, times: &[f32]) -> Option<std::ops::RangeInclusive<usize>> {
        if times.is_empty() {
            return None;
        }
        let last = times.len() - 1;
        let start = self
            .start_index
            .unwrap_or_else(|| times.partition_point(|&t| t < self.start_time))
            .min(last);
        let end = self
            .end_index
            .unwrap_or_else(|| times.partition_point(|&t| t <= self.end_time).saturating_sub(1))
            .min(last);
        if end < start {
            return None;
        }
        Some(start..=end)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionChromatogram {
    pub transition_id: TransitionId,
    #[serde(default)]
    pub intensities: Option<Arc<[f32]>>,
    /// One entry per candidate peak, in candidate order.
    pub peaks: Vec<SummaryPeakData>,
}

/// Extracted chromatograms and candidate peaks for one transition group in
/// one replicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupChromatograms {
    pub group_id: TransitionGroupId,
    pub replicate: usize,
    pub times: Arc<[f32]>,
    pub transitions: Vec<TransitionChromatogram>,
}

impl GroupChromatograms {
    pub fn num_candidates(&self) -> Result<usize, DataProcessingError> {
        let Some(first) = self.transitions.first() else {
            return Ok(0);
        };
        let expected = first.peaks.len();
        for trans in self.transitions.iter() {
            if trans.peaks.len() != expected {
                return Err(DataProcessingError::InconsistentCandidateCount {
                    expected,
                    other: trans.peaks.len(),
                    context: format!(
                        "transition {} of group {} in replicate {}",
                        trans.transition_id, self.group_id, self.replicate
                    ),
                });
            }
        }
        Ok(expected)
    }

    pub fn transition(&self, id: TransitionId) -> Option<&TransitionChromatogram> {
        self.transitions.iter().find(|x| x.transition_id == id)
    }
}

/// Source of extracted chromatographic data.
///
/// Implementations must be safe to read from many threads at once; the
/// scoring passes never write through it.
pub trait ChromatogramProvider: Sync {
    fn group_chromatograms(
        &self,
        group: TransitionGroupId,
        replicate: usize,
    ) -> Option<Arc<GroupChromatograms>>;
}

/// In-memory, immutable chromatogram store keyed by (group, replicate).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<GroupChromatograms>", into = "Vec<GroupChromatograms>")]
pub struct ChromatogramSnapshot {
    groups: HashMap<(TransitionGroupId, usize), Arc<GroupChromatograms>>,
}

impl ChromatogramSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chromatograms: GroupChromatograms) {
        self.groups.insert(
            (chromatograms.group_id, chromatograms.replicate),
            Arc::new(chromatograms),
        );
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl ChromatogramProvider for ChromatogramSnapshot {
    fn group_chromatograms(
        &self,
        group: TransitionGroupId,
        replicate: usize,
    ) -> Option<Arc<GroupChromatograms>> {
        self.groups.get(&(group, replicate)).cloned()
    }
}

impl From<Vec<GroupChromatograms>> for ChromatogramSnapshot {
    fn from(value: Vec<GroupChromatograms>) -> Self {
        let mut out = Self::new();
        for x in value {
            out.insert(x);
        }
        out
    }
}

impl From<ChromatogramSnapshot> for Vec<GroupChromatograms> {
    fn from(value: ChromatogramSnapshot) -> Self {
        let mut out: Vec<GroupChromatograms> =
            value.groups.into_values().map(|x| (*x).clone()).collect();
        out.sort_by_key(|x| (x.group_id, x.replicate));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(start: f32, end: f32) -> SummaryPeakData {
        SummaryPeakData {
            retention_time: (start + end) / 2.0,
            start_time: start,
            end_time: end,
            area: 100.0,
            background_area: 0.0,
            height: 10.0,
            fwhm: 0.1,
            mass_error_ppm: None,
            is_forced_integration: false,
            identified: PeakIdentification::False,
            start_index: None,
            end_index: None,
            time_index: None,
        }
    }

    #[test]
    fn test_index_range_from_times() {
        let times: Vec<f32> = (0..10).map(|x| x as f32).collect();
        let range = peak(2.5, 6.0).index_range(&times).unwrap();
        assert_eq!(range, 3..=6);
    }

    #[test]
    fn test_inconsistent_candidates() {
        let chroms = GroupChromatograms {
            group_id: TransitionGroupId(1),
            replicate: 0,
            times: Arc::from(vec![0.0f32, 1.0]),
            transitions: vec![
                TransitionChromatogram {
                    transition_id: TransitionId(1),
                    intensities: None,
                    peaks: vec![peak(0.0, 1.0)],
                },
                TransitionChromatogram {
                    transition_id: TransitionId(2),
                    intensities: None,
                    peaks: vec![],
                },
            ],
        };
        assert!(matches!(
            chroms.num_candidates(),
            Err(DataProcessingError::InconsistentCandidateCount { .. })
        ));
    }
}

//! Collection of per-unit extraction results from parallel iterators.
//!
//! Uses the fold-reduce pattern: every thread folds results into a local
//! accumulator, then the locals are merged pairwise. Results carry their
//! unit position so the final order never depends on scheduling.

use rayon::iter::{
    FromParallelIterator,
    IntoParallelIterator,
    ParallelIterator,
};

use crate::errors::DataProcessingError;
use crate::models::ScoredGroupPeaks;

type ExtractionItem = (usize, Result<ScoredGroupPeaks, DataProcessingError>);

#[derive(Debug, Default)]
pub(super) struct ExtractionAccumulator {
    pub(super) units: Vec<(usize, ScoredGroupPeaks)>,
    pub(super) errors: Vec<(usize, DataProcessingError)>,
    pub(super) empty_units: usize,
}

impl ExtractionAccumulator {
    pub(super) fn reduce(mut self, other: Self) -> Self {
        self.units.extend(other.units);
        self.errors.extend(other.errors);
        self.empty_units += other.empty_units;
        self
    }

    pub(super) fn fold(mut self, item: ExtractionItem) -> Self {
        match item.1 {
            Ok(unit) => {
                if unit.peaks.is_empty() {
                    self.empty_units += 1;
                }
                self.units.push((item.0, unit));
            }
            Err(e) => self.errors.push((item.0, e)),
        }
        self
    }

    /// Units in input order, or the error of the earliest failing unit.
    pub(super) fn into_ordered(mut self) -> Result<Vec<ScoredGroupPeaks>, DataProcessingError> {
        if let Some((_, err)) = self
            .errors
            .into_iter()
            .min_by_key(|(i, _)| *i)
        {
            return Err(err);
        }
        self.units.sort_unstable_by_key(|(i, _)| *i);
        Ok(self.units.into_iter().map(|(_, x)| x).collect())
    }
}

impl FromIterator<ExtractionItem> for ExtractionAccumulator {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = ExtractionItem>,
    {
        iter.into_iter()
            .fold(ExtractionAccumulator::default(), ExtractionAccumulator::fold)
    }
}

impl FromParallelIterator<ExtractionItem> for ExtractionAccumulator {
    fn from_par_iter<I>(par_iter: I) -> Self
    where
        I: IntoParallelIterator<Item = ExtractionItem>,
    {
        par_iter
            .into_par_iter()
            .fold(ExtractionAccumulator::default, ExtractionAccumulator::fold)
            .reduce(ExtractionAccumulator::default, ExtractionAccumulator::reduce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        GroupPeaksKey,
        TransitionGroupId,
    };
    use rayon::prelude::*;

    fn unit(i: usize, num_peaks: usize) -> ScoredGroupPeaks {
        let key = GroupPeaksKey {
            peptide_index: i,
            group_id: TransitionGroupId(i as u32),
            replicate: 0,
            is_decoy: false,
        };
        let peaks = (0..num_peaks)
            .map(|c| crate::models::ScoredPeak::new(c, vec![0.0]))
            .collect();
        ScoredGroupPeaks::new(key, peaks)
    }

    #[test]
    fn test_parallel_collect_keeps_order() {
        let acc: ExtractionAccumulator = (0..500usize)
            .into_par_iter()
            .map(|i| (i, Ok(unit(i, i % 3))))
            .collect();
        assert_eq!(acc.empty_units, 167);
        let units = acc.into_ordered().unwrap();
        let order: Vec<usize> = units.iter().map(|u| u.key.peptide_index).collect();
        assert_eq!(order, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_first_error_wins() {
        let acc: ExtractionAccumulator = (0..10usize)
            .map(|i| {
                if i == 4 || i == 7 {
                    let err = DataProcessingError::ExpectedNonEmptyData {
                        context: Some(format!("unit {}", i)),
                    };
                    (i, Err(err))
                } else {
                    (i, Ok(unit(i, 1)))
                }
            })
            .collect();
        assert_eq!(
            acc.into_ordered(),
            Err(DataProcessingError::ExpectedNonEmptyData {
                context: Some("unit 4".to_string()),
            })
        );
    }
}

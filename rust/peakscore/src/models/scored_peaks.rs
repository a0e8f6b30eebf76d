use rand::Rng;
use rayon::prelude::*;

use super::document::{
    PeakBounds,
    TransitionGroupId,
};
use crate::errors::DataProcessingError;
use crate::scoring::LinearModelParams;
use crate::utils::stats::half_rounded_to_even;

/// Identity of one scoring unit: a set of matched label-type groups of
/// one peptide in one replicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupPeaksKey {
    pub peptide_index: usize,
    pub group_id: TransitionGroupId,
    pub replicate: usize,
    pub is_decoy: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPeak {
    pub candidate_index: usize,
    pub bounds: Option<PeakBounds>,
    /// One value per calculator the features were extracted with.
    pub features: Vec<f64>,
    pub score: f64,
}

impl ScoredPeak {
    pub fn new(candidate_index: usize, features: Vec<f64>) -> Self {
        Self {
            candidate_index,
            bounds: None,
            features,
            score: f64::NAN,
        }
    }

    pub fn with_bounds(mut self, bounds: PeakBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// All candidate peaks competing for one scoring unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredGroupPeaks {
    pub key: GroupPeaksKey,
    pub peaks: Vec<ScoredPeak>,
}

impl ScoredGroupPeaks {
    pub fn new(key: GroupPeaksKey, peaks: Vec<ScoredPeak>) -> Self {
        Self { key, peaks }
    }

    pub fn score_peaks(&mut self, params: &LinearModelParams) -> Result<(), DataProcessingError> {
        for peak in self.peaks.iter_mut() {
            peak.score = params.score(&peak.features)?;
        }
        Ok(())
    }

    /// Position of the best scoring peak. NaN scores never win, ties go to
    /// the earliest candidate.
    pub fn max_index(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, peak) in self.peaks.iter().enumerate() {
            if peak.score.is_nan() {
                continue;
            }
            match best {
                Some(b) if self.peaks[b].score >= peak.score => {}
                _ => best = Some(i),
            }
        }
        best
    }

    pub fn max_peak(&self) -> Option<&ScoredPeak> {
        self.max_index().map(|i| &self.peaks[i])
    }

    pub fn second_max_peak(&self) -> Option<&ScoredPeak> {
        let best = self.max_index()?;
        let mut second: Option<usize> = None;
        for (i, peak) in self.peaks.iter().enumerate() {
            if i == best || peak.score.is_nan() {
                continue;
            }
            match second {
                Some(s) if self.peaks[s].score >= peak.score => {}
                _ => second = Some(i),
            }
        }
        second.map(|i| &self.peaks[i])
    }

    /// True for a unit with candidates that all scored NaN.
    pub fn all_scores_nan(&self) -> bool {
        !self.peaks.is_empty() && self.peaks.iter().all(|x| x.score.is_nan())
    }
}

/// Either the target or the decoy population of scoring units.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoredGroupPeaksSet {
    groups: Vec<ScoredGroupPeaks>,
}

impl ScoredGroupPeaksSet {
    pub fn new(groups: Vec<ScoredGroupPeaks>) -> Self {
        Self { groups }
    }

    pub fn push(&mut self, group: ScoredGroupPeaks) {
        self.groups.push(group);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[ScoredGroupPeaks] {
        &self.groups
    }

    pub fn into_groups(self) -> Vec<ScoredGroupPeaks> {
        self.groups
    }

    /// Number of features per peak, taken from the first peak found.
    pub fn num_features(&self) -> Option<usize> {
        self.groups
            .iter()
            .flat_map(|g| g.peaks.first())
            .map(|p| p.features.len())
            .next()
    }

    pub fn iter_peaks(&self) -> impl Iterator<Item = &ScoredPeak> {
        self.groups.iter().flat_map(|g| g.peaks.iter())
    }

    /// Re-score every peak of every unit.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip_all, level = "trace")
    )]
    pub fn score_peaks(&mut self, params: &LinearModelParams) -> Result<(), DataProcessingError> {
        #[cfg(not(feature = "serial_scoring"))]
        let res = self
            .groups
            .par_iter_mut()
            .with_min_len(64)
            .try_for_each(|g| g.score_peaks(params));

        #[cfg(feature = "serial_scoring")]
        let res = self.groups.iter_mut().try_for_each(|g| g.score_peaks(params));

        res
    }

    /// Best peak of every unit that has one, in unit order.
    pub fn best_peaks(&self) -> Vec<&ScoredPeak> {
        self.groups.iter().filter_map(|g| g.max_peak()).collect()
    }

    pub fn second_best_peaks(&self) -> Vec<&ScoredPeak> {
        self.groups
            .iter()
            .filter_map(|g| g.second_max_peak())
            .collect()
    }

    pub fn best_scores(&self) -> Vec<f64> {
        self.best_peaks().iter().map(|p| p.score).collect()
    }

    /// Keep every other unit, starting with the first, so that
    /// `round(n / 2)` units remain (ties rounded to even).
    pub fn discard_half(&mut self) {
        let keep = half_rounded_to_even(self.groups.len());
        let groups = std::mem::take(&mut self.groups);
        self.groups = groups.into_iter().step_by(2).take(keep).collect();
    }

    /// Same count as [Self::discard_half], but the survivors are drawn from
    /// `rng`. Survivors keep their relative order.
    pub fn discard_half_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let n = self.groups.len();
        let keep = half_rounded_to_even(n);
        let mut chosen = rand::seq::index::sample(rng, n, keep).into_vec();
        chosen.sort_unstable();

        let mut keep_mask = vec![false; n];
        for i in chosen {
            keep_mask[i] = true;
        }
        let groups = std::mem::take(&mut self.groups);
        self.groups = groups
            .into_iter()
            .zip(keep_mask)
            .filter_map(|(g, keep)| keep.then_some(g))
            .collect();
    }
}

/// Units whose current best peak has no value for `calculator_index`.
///
/// Used to explain why a calculator could not be enabled for training.
pub fn find_missing_scores(set: &ScoredGroupPeaksSet, calculator_index: usize) -> Vec<GroupPeaksKey> {
    set.groups()
        .iter()
        .filter(|g| {
            let peak = g.max_peak().or_else(|| g.peaks.first());
            peak.is_some_and(|p| {
                p.features
                    .get(calculator_index)
                    .is_none_or(|v| !v.is_finite())
            })
        })
        .map(|g| g.key)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn key(i: usize) -> GroupPeaksKey {
        GroupPeaksKey {
            peptide_index: i,
            group_id: TransitionGroupId(i as u32),
            replicate: 0,
            is_decoy: false,
        }
    }

    fn group_with_scores(i: usize, scores: &[f64]) -> ScoredGroupPeaks {
        let peaks = scores
            .iter()
            .enumerate()
            .map(|(j, &s)| ScoredPeak {
                candidate_index: j,
                bounds: None,
                features: vec![s],
                score: s,
            })
            .collect();
        ScoredGroupPeaks::new(key(i), peaks)
    }

    #[test]
    fn test_best_and_second_best() {
        let g = group_with_scores(0, &[1.0, f64::NAN, 3.0, 2.0, 3.0]);
        assert_eq!(g.max_index(), Some(2));
        assert_eq!(g.second_max_peak().unwrap().candidate_index, 4);

        let nan = group_with_scores(1, &[f64::NAN, f64::NAN]);
        assert!(nan.max_peak().is_none());
        assert!(nan.all_scores_nan());

        let empty = group_with_scores(2, &[]);
        assert!(!empty.all_scores_nan());
    }

    #[test]
    fn test_score_peaks_with_params() {
        let mut set = ScoredGroupPeaksSet::new(vec![
            group_with_scores(0, &[1.0, 2.0]),
            group_with_scores(1, &[5.0, 0.5]),
        ]);
        let params = LinearModelParams::new(vec![-1.0], 10.0);
        set.score_peaks(&params).unwrap();
        assert_eq!(set.best_scores(), vec![9.0, 9.5]);
        assert_eq!(set.best_peaks()[1].candidate_index, 1);
    }

    #[test]
    fn test_discard_half_deterministic() {
        let mut set = ScoredGroupPeaksSet::new((0..5).map(|i| group_with_scores(i, &[1.0])).collect());
        set.discard_half();
        let kept: Vec<usize> = set.groups().iter().map(|g| g.key.peptide_index).collect();
        assert_eq!(kept, vec![0, 2]);
    }

    #[test]
    fn test_discard_half_random() {
        for n in [0usize, 1, 5, 7, 10, 11] {
            let build = || ScoredGroupPeaksSet::new((0..n).map(|i| group_with_scores(i, &[1.0])).collect());
            let mut a = build();
            let mut b = build();
            a.discard_half_with(&mut ChaCha8Rng::seed_from_u64(42));
            b.discard_half_with(&mut ChaCha8Rng::seed_from_u64(42));
            assert_eq!(a.len(), half_rounded_to_even(n), "n = {}", n);
            assert_eq!(a, b, "Same seed should keep the same units");

            let kept: Vec<usize> = a.groups().iter().map(|g| g.key.peptide_index).collect();
            let mut sorted = kept.clone();
            sorted.sort_unstable();
            assert_eq!(kept, sorted, "Survivors should keep their order");
        }
    }

    #[test]
    fn test_find_missing_scores() {
        let mut set = ScoredGroupPeaksSet::new(vec![
            group_with_scores(0, &[1.0]),
            group_with_scores(1, &[2.0]),
        ]);
        set.groups[1].peaks[0].features = vec![f64::NAN];
        assert_eq!(find_missing_scores(&set, 0), vec![key(1)]);
        assert_eq!(find_missing_scores(&set, 3).len(), 2);
    }
}

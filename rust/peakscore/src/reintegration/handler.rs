use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    info,
    warn,
};

use super::features::{
    ExtractedFeatures,
    ScoringUnit,
    extract_features,
    peptide_units,
};
use crate::errors::{
    ReintegrationError,
    ScoringIncompatibility,
};
use crate::ml::{
    QValueEstimator,
    QValueMode,
};
use crate::models::{
    ChromatogramProvider,
    Document,
    GroupChromInfo,
    GroupPeaksKey,
    PeakBounds,
    PeptideNode,
    ScoredGroupPeaks,
    ScoredGroupPeaksSet,
    TransitionChromInfo,
    TransitionGroupNode,
    UserSet,
};
use crate::scoring::PeakScoringModel;
use crate::utils::stats::mean;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReintegrationOptions {
    #[serde(default)]
    pub q_value_mode: QValueMode,
    /// Also reintegrate peaks a user picked by hand.
    #[serde(default)]
    pub overwrite_manual: bool,
    /// Refuse the model as soon as one unit scores NaN everywhere.
    #[serde(default)]
    pub fail_on_any_incompatible: bool,
}

/// Scored candidates of one unit and the q-value of its best peak.
#[derive(Debug, Clone)]
pub(super) struct ScoredUnit {
    pub(super) peaks: ScoredGroupPeaks,
    pub(super) q_value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReintegrationSummary {
    pub units: usize,
    pub kept: usize,
    pub cleared: usize,
    /// Units with candidates that all scored NaN. They are cleared too.
    pub incompatible: usize,
    pub manual_skipped: usize,
    /// Units without candidate peaks. They are cleared and counted in
    /// `cleared` as well.
    pub no_candidates: usize,
}

impl std::ops::AddAssign for ReintegrationSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.units += rhs.units;
        self.kept += rhs.kept;
        self.cleared += rhs.cleared;
        self.incompatible += rhs.incompatible;
        self.manual_skipped += rhs.manual_skipped;
        self.no_candidates += rhs.no_candidates;
    }
}

/// Everything needed to pick peaks for a document, computed up front so
/// that [ReintegrationHandler::change_peaks] cannot fail half way.
pub struct ReintegrationHandler<'a, P: ChromatogramProvider + ?Sized> {
    document: Arc<Document>,
    provider: &'a P,
    model: Arc<PeakScoringModel>,
    options: ReintegrationOptions,
    calculators_len: usize,
    units: HashMap<GroupPeaksKey, ScoredUnit>,
}

fn finite(x: f64) -> Option<f64> {
    x.is_finite().then_some(x)
}

fn set_q_values(
    set: &ScoredGroupPeaksSet,
    estimator: &QValueEstimator,
    mode: &QValueMode,
    out: &mut HashMap<GroupPeaksKey, ScoredUnit>,
) {
    let best: Vec<f64> = set
        .groups()
        .iter()
        .map(|g| g.max_peak().map(|p| p.score).unwrap_or(f64::NAN))
        .collect();
    let q_values = estimator.q_values(&best, mode);
    for (group, q_value) in set.groups().iter().zip(q_values) {
        out.insert(
            group.key,
            ScoredUnit {
                peaks: group.clone(),
                q_value,
            },
        );
    }
}

impl<'a, P: ChromatogramProvider + ?Sized> ReintegrationHandler<'a, P> {
    /// Extract, score and check compatibility. Nothing is written yet.
    pub fn new(
        document: Arc<Document>,
        provider: &'a P,
        model: Arc<PeakScoringModel>,
        options: ReintegrationOptions,
    ) -> Result<Self, ReintegrationError> {
        if !model.is_trained() {
            return Err(ReintegrationError::UntrainedModel {
                model: model.name().to_string(),
            });
        }
        let features = extract_features(document.as_ref(), provider, model.calculators())?;
        Self::from_features(document, provider, model, options, features)
    }

    /// Same as [Self::new] with features that were already extracted with
    /// the calculators of `model`.
    pub fn from_features(
        document: Arc<Document>,
        provider: &'a P,
        model: Arc<PeakScoringModel>,
        options: ReintegrationOptions,
        features: ExtractedFeatures,
    ) -> Result<Self, ReintegrationError> {
        let untrained = || ReintegrationError::UntrainedModel {
            model: model.name().to_string(),
        };
        let params = model.parameters().ok_or_else(untrained)?;
        let estimator = model.q_value_estimator().ok_or_else(untrained)?;

        let ExtractedFeatures {
            mut targets,
            mut decoys,
            ..
        } = features;
        targets.score_peaks(params)?;
        decoys.score_peaks(params)?;

        let with_candidates = targets
            .groups()
            .iter()
            .chain(decoys.groups())
            .filter(|g| !g.peaks.is_empty())
            .count();
        let incompatible = targets
            .groups()
            .iter()
            .chain(decoys.groups())
            .filter(|g| g.all_scores_nan())
            .count();
        let refuse = incompatible > 0
            && (incompatible == with_candidates || options.fail_on_any_incompatible);
        if refuse {
            return Err(ScoringIncompatibility {
                model: model.name().to_string(),
                incompatible_groups: incompatible,
                total_groups: with_candidates,
            }
            .into());
        }
        if incompatible > 0 {
            warn!(
                "{} of {} units have no usable score under model {}",
                incompatible,
                with_candidates,
                model.name()
            );
        }

        let mut units = HashMap::with_capacity(targets.len() + decoys.len());
        set_q_values(&targets, &estimator, &options.q_value_mode, &mut units);
        set_q_values(&decoys, &estimator, &options.q_value_mode, &mut units);

        Ok(Self {
            document,
            provider,
            calculators_len: model.calculators().len(),
            model,
            options,
            units,
        })
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn model(&self) -> &Arc<PeakScoringModel> {
        &self.model
    }

    pub(super) fn unit(&self, key: &GroupPeaksKey) -> Option<&ScoredUnit> {
        self.units.get(key)
    }

    /// Share of the mean target score per calculator, measured on the best
    /// target peaks of this document.
    pub fn percent_contributions(&self) -> Vec<f64> {
        let mut best: Vec<(GroupPeaksKey, &[f64])> = self
            .units
            .values()
            .filter(|u| !u.peaks.key.is_decoy)
            .filter_map(|u| u.peaks.max_peak().map(|p| (u.peaks.key, p.features.as_slice())))
            .collect();
        // Sum in key order so the result does not depend on hashing.
        best.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        let means: Vec<f64> = (0..self.calculators_len)
            .map(|i| {
                let column: Vec<f64> = best.iter().map(|(_, f)| f[i]).collect();
                mean(&column)
            })
            .collect();
        self.model.percent_contributions(&means)
    }

    /// Transition results of `group` for a kept peak.
    fn kept_transitions(
        &self,
        group: &TransitionGroupNode,
        replicate: usize,
        candidate: usize,
        bounds: &PeakBounds,
        user_set: UserSet,
    ) -> Vec<TransitionChromInfo> {
        let chromatograms = self.provider.group_chromatograms(group.id, replicate);
        group
            .transitions
            .iter()
            .map(|node| {
                let peak = chromatograms
                    .as_ref()
                    .and_then(|c| c.transition(node.id))
                    .and_then(|t| t.peaks.get(candidate))
                    .map(|p| {
                        let mut p = p.clone();
                        p.start_time = bounds.start_time;
                        p.end_time = bounds.end_time;
                        p
                    });
                TransitionChromInfo { peak, user_set }
            })
            .collect()
    }

    /// Apply the decision for one unit to the working copy of the groups.
    fn change_unit(
        &self,
        peptide: &PeptideNode,
        groups: &mut [Arc<TransitionGroupNode>],
        unit: &ScoringUnit,
        q_cutoff: f64,
        summary: &mut ReintegrationSummary,
    ) {
        summary.units += 1;
        let replicate = unit.replicate;
        let locked = unit
            .partners
            .members
            .iter()
            .any(|&g| groups[g].is_user_set(replicate));
        if locked && !self.options.overwrite_manual {
            summary.manual_skipped += 1;
            return;
        }

        // A unit without candidates never reaches the cutoff.
        let scored = self
            .units
            .get(&unit.key(peptide))
            .filter(|x| !x.peaks.peaks.is_empty());
        let best = scored.and_then(|x| x.peaks.max_peak());
        let unit_q_value = scored.map_or(f64::NAN, |x| x.q_value);
        let kept = best.and_then(|p| {
            let passes = unit_q_value <= q_cutoff;
            passes.then_some(p.bounds.map(|b| (p.candidate_index, b))).flatten()
        });
        match (scored, best, kept) {
            (_, _, Some(_)) => summary.kept += 1,
            (None, _, None) => {
                summary.no_candidates += 1;
                summary.cleared += 1;
            }
            (Some(_), None, None) => {
                summary.incompatible += 1;
                summary.cleared += 1;
            }
            (Some(_), Some(_), None) => summary.cleared += 1,
        }
        let score = best.and_then(|p| finite(p.score));
        let q_value = finite(unit_q_value);

        for &g in unit.partners.members.iter() {
            let user_set = if g == unit.partners.representative {
                UserSet::Reintegrated
            } else {
                UserSet::Matched
            };
            let group = groups[g].as_ref();
            let group_info = GroupChromInfo {
                peak: kept.map(|(_, b)| b),
                user_set,
                score,
                q_value,
            };
            let transition_infos = match &kept {
                Some((candidate, bounds)) => {
                    self.kept_transitions(group, replicate, *candidate, bounds, user_set)
                }
                None => group
                    .transitions
                    .iter()
                    .map(|_| TransitionChromInfo {
                        peak: None,
                        user_set,
                    })
                    .collect(),
            };
            if let Some(changed) = group.with_replicate_result(replicate, group_info, transition_infos)
            {
                groups[g] = Arc::new(changed);
            }
        }
    }

    /// New version of one peptide, `None` when nothing about it changed.
    fn change_peptide(
        &self,
        peptide_index: usize,
        peptide: &Arc<PeptideNode>,
        q_cutoff: f64,
    ) -> (Option<Arc<PeptideNode>>, ReintegrationSummary) {
        let mut summary = ReintegrationSummary::default();
        let mut groups = peptide.groups.clone();
        let units = peptide_units(peptide_index, peptide, self.document.replicates.len());
        for unit in units.iter() {
            self.change_unit(peptide, &mut groups, unit, q_cutoff, &mut summary);
        }
        let changed = groups
            .iter()
            .zip(peptide.groups.iter())
            .any(|(a, b)| !Arc::ptr_eq(a, b));
        if !changed {
            return (None, summary);
        }
        let out = PeptideNode {
            groups,
            ..(**peptide).clone()
        };
        (Some(Arc::new(out)), summary)
    }

    /// Pick or clear the peak of every unit at `q_cutoff`.
    ///
    /// Nodes that end up identical keep their `Arc`. When the whole document
    /// is unchanged and the model is already bound, the input document is
    /// returned as is.
    #[cfg_attr(
        feature = "instrumentation",
        tracing::instrument(skip(self), level = "trace")
    )]
    pub fn change_peaks(&self, q_cutoff: f64) -> Arc<Document> {
        let st = Instant::now();
        let change = |(i, p): (usize, &Arc<PeptideNode>)| self.change_peptide(i, p, q_cutoff);

        #[cfg(not(feature = "serial_scoring"))]
        let results: Vec<(Option<Arc<PeptideNode>>, ReintegrationSummary)> = self
            .document
            .peptides
            .par_iter()
            .enumerate()
            .with_min_len(16)
            .map(change)
            .collect();

        #[cfg(feature = "serial_scoring")]
        let results: Vec<(Option<Arc<PeptideNode>>, ReintegrationSummary)> = self
            .document
            .peptides
            .iter()
            .enumerate()
            .map(change)
            .collect();

        let mut summary = ReintegrationSummary::default();
        let mut any_changed = false;
        let peptides: Vec<Arc<PeptideNode>> = results
            .into_iter()
            .zip(self.document.peptides.iter())
            .map(|((changed, counts), original)| {
                summary += counts;
                match changed {
                    Some(p) => {
                        any_changed = true;
                        p
                    }
                    None => Arc::clone(original),
                }
            })
            .collect();

        let elapsed = st.elapsed();
        let throughput = summary.units as f64 / elapsed.as_secs_f64().max(1e-9);
        info!(
            "Reintegrated {} units at q <= {}: {} kept, {} cleared ({} incompatible), {} manual skipped, {} without candidates. Took {:?} ({:#.1} units/s)",
            summary.units,
            q_cutoff,
            summary.kept,
            summary.cleared,
            summary.incompatible,
            summary.manual_skipped,
            summary.no_candidates,
            elapsed,
            throughput
        );

        if !any_changed {
            return self.document.with_scoring_model(Arc::clone(&self.model));
        }
        let mut out = (*self.document).clone();
        out.peptides = peptides;
        out.revision += 1;
        out.settings.peak_scoring_model = Some(Arc::clone(&self.model));
        Arc::new(out)
    }

    /// Counts [Self::change_peaks] would produce, without building anything.
    pub fn summary(&self, q_cutoff: f64) -> ReintegrationSummary {
        let mut summary = ReintegrationSummary::default();
        for (i, peptide) in self.document.peptides.iter().enumerate() {
            let (_, counts) = self.change_peptide(i, peptide, q_cutoff);
            summary += counts;
        }
        summary
    }
}

/// Score `document` with `model` and pick peaks at `q_cutoff`.
pub fn reintegrate<P: ChromatogramProvider + ?Sized>(
    document: &Arc<Document>,
    provider: &P,
    model: Arc<PeakScoringModel>,
    q_cutoff: f64,
    options: ReintegrationOptions,
) -> Result<Arc<Document>, ReintegrationError> {
    let handler = ReintegrationHandler::new(Arc::clone(document), provider, model, options)?;
    Ok(handler.change_peaks(q_cutoff))
}

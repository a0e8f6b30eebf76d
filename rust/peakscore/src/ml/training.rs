//! Semi-supervised training of the linear peak scoring function.
//!
//! Every iteration takes the best peak of each target unit under the
//! current weights, keeps the ones that pass a target-decoy competition
//! q-value cutoff as positives and fits a Fisher discriminant against the
//! negatives (decoy best peaks, second best target peaks, or both).
//! The final weights are rescaled so that the negative scores follow a
//! standard normal distribution.

use std::borrow::Cow;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{
    Deserialize,
    Serialize,
};
use tracing::{
    debug,
    info,
    warn,
};

use super::lda::fisher_discriminant;
use super::qvalues::assign_qval;
use super::{
    LabelledScore,
    TargetDecoy,
};
use crate::errors::TrainingError;
use crate::models::ScoredGroupPeaksSet;
use crate::scoring::LinearModelParams;
use crate::utils::stats::{
    mean,
    sample_stdev,
};

#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub max_iterations: usize,
    /// Competition q-value a target best peak needs to be a positive on the
    /// first iteration.
    pub initial_q_cutoff: f64,
    /// Same, for every later iteration.
    pub q_cutoff: f64,
    /// Below this many positives every target best peak is used instead.
    pub min_positives: usize,
    /// Starting weights. Masked to the eligible calculators before use.
    pub seed: Option<LinearModelParams>,
    /// Units of both populations that take part in training.
    pub subsample: Subsample,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            initial_q_cutoff: 0.15,
            q_cutoff: 0.02,
            min_positives: 2,
            seed: None,
            subsample: Subsample::All,
        }
    }
}

/// Training on part of the data, e.g. to hold the rest out for validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsample {
    #[default]
    All,
    /// Every other unit of each population.
    Half,
    /// A random half of each population, drawn from a generator seeded with
    /// `seed`.
    RandomHalf { seed: u64 },
}

impl Subsample {
    /// Target and decoy populations of `input` after subsampling. Nothing
    /// is copied for [Subsample::All].
    pub fn apply<'a>(
        &self,
        input: &TrainingInput<'a>,
    ) -> (Cow<'a, ScoredGroupPeaksSet>, Cow<'a, ScoredGroupPeaksSet>) {
        if *self == Subsample::All {
            return (Cow::Borrowed(input.targets), Cow::Borrowed(input.decoys));
        }
        let mut targets = input.targets.clone();
        let mut decoys = input.decoys.clone();
        match *self {
            Subsample::RandomHalf { seed } => {
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                targets.discard_half_with(&mut rng);
                decoys.discard_half_with(&mut rng);
            }
            _ => {
                targets.discard_half();
                decoys.discard_half();
            }
        }
        debug!(
            "Training on {} of {} target and {} of {} decoy units",
            targets.len(),
            input.targets.len(),
            decoys.len(),
            input.decoys.len()
        );
        (Cow::Owned(targets), Cow::Owned(decoys))
    }
}

/// Borrowed view of everything a training call reads.
#[derive(Debug, Clone, Copy)]
pub struct TrainingInput<'a> {
    pub targets: &'a ScoredGroupPeaksSet,
    pub decoys: &'a ScoredGroupPeaksSet,
    /// One name per feature column, only used in diagnostics.
    pub names: &'a [String],
    /// Calculators the caller wants trained.
    pub enabled: &'a [bool],
    pub uses_decoys: bool,
    pub uses_second_best: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Number of discriminant fits performed.
    pub iterations: usize,
    pub converged: bool,
    /// Requested calculators dropped because some peak had no finite value.
    pub ineligible: Vec<usize>,
    pub num_positives: usize,
    pub num_negatives: usize,
    pub percent_contributions: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub params: LinearModelParams,
    pub decoy_mean: f64,
    pub decoy_stdev: f64,
    pub colinear_warning: bool,
    pub report: TrainingReport,
}

/// One entry of the target-decoy competition used to pick positives.
struct Competitor {
    score: f64,
    label: TargetDecoy,
    qval: f32,
    /// Position in the target best list, for targets.
    target: Option<usize>,
}

impl LabelledScore for Competitor {
    fn get_score(&self) -> f64 {
        self.score
    }

    fn get_label(&self) -> TargetDecoy {
        self.label
    }

    fn assign_qval(&mut self, q: f32) {
        self.qval = q;
    }

    fn get_qval(&self) -> f32 {
        self.qval
    }
}

/// Which peaks took part in one fit, as (unit, peak) positions.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Selection {
    positives: Vec<(usize, usize)>,
    decoy_negatives: Vec<(usize, usize)>,
}

/// Drop the enabled calculators that are not finite on every candidate
/// peak. Returns the eligible mask and the indices that were dropped.
pub fn eligible_calculators(
    targets: &ScoredGroupPeaksSet,
    decoys: Option<&ScoredGroupPeaksSet>,
    enabled: &[bool],
) -> (Vec<bool>, Vec<usize>) {
    let mut eligible = enabled.to_vec();
    let decoy_peaks = decoys.into_iter().flat_map(|d| d.iter_peaks());
    for peak in targets.iter_peaks().chain(decoy_peaks) {
        for (i, value) in peak.features.iter().enumerate() {
            if eligible.get(i).copied().unwrap_or(false) && !value.is_finite() {
                eligible[i] = false;
            }
        }
    }
    let ineligible = (0..enabled.len())
        .filter(|&i| enabled[i] && !eligible[i])
        .collect();
    (eligible, ineligible)
}

fn check_feature_counts(input: &TrainingInput) -> Result<(), TrainingError> {
    let expected = input.enabled.len();
    for peak in input.targets.iter_peaks().chain(input.decoys.iter_peaks()) {
        if peak.features.len() != expected {
            return Err(TrainingError::FeatureCountMismatch {
                expected,
                other: peak.features.len(),
            });
        }
    }
    Ok(())
}

fn name_of(input: &TrainingInput, index: usize) -> String {
    input
        .names
        .get(index)
        .cloned()
        .unwrap_or_else(|| format!("#{}", index))
}

/// Shared preconditions of both training flavours. Returns the eligible
/// mask and the ineligible indices.
fn prepare(input: &TrainingInput) -> Result<(Vec<bool>, Vec<usize>), TrainingError> {
    let has_decoys = input.uses_decoys && !input.decoys.is_empty();
    if !has_decoys && !input.uses_second_best {
        return Err(TrainingError::NoNegativePopulation {
            uses_decoys: input.uses_decoys,
            uses_second_best: input.uses_second_best,
            num_decoy_groups: input.decoys.len(),
        });
    }
    if input.targets.iter_peaks().next().is_none() {
        return Err(TrainingError::EmptyTargetPopulation);
    }
    check_feature_counts(input)?;

    let decoys = input.uses_decoys.then_some(input.decoys);
    let (eligible, ineligible) = eligible_calculators(input.targets, decoys, input.enabled);
    for &i in ineligible.iter() {
        warn!(
            "Calculator {} disabled for training, some peaks have no value for it",
            name_of(input, i)
        );
    }
    if !eligible.iter().any(|x| *x) {
        return Err(TrainingError::NoEnabledCalculators {
            requested: input.enabled.iter().filter(|x| **x).count(),
            ineligible: ineligible.iter().map(|i| name_of(input, *i)).collect(),
        });
    }
    Ok((eligible, ineligible))
}

fn has_weights(params: &LinearModelParams) -> bool {
    params.weights().iter().any(|w| !w.is_nan())
}

fn unit_seed(eligible: &[bool]) -> LinearModelParams {
    let first = eligible.iter().position(|x| *x);
    let weights = (0..eligible.len())
        .map(|i| if Some(i) == first { 1.0 } else { f64::NAN })
        .collect();
    LinearModelParams::new(weights, 0.0)
}

/// Second best target peaks, frozen for the whole training call.
fn second_best_features(targets: &ScoredGroupPeaksSet, uses_second_best: bool) -> Vec<Vec<f64>> {
    if !uses_second_best {
        return Vec::new();
    }
    targets
        .second_best_peaks()
        .into_iter()
        .map(|p| p.features.clone())
        .collect()
}

fn best_positions(set: &ScoredGroupPeaksSet) -> Vec<(usize, usize)> {
    set.groups()
        .iter()
        .enumerate()
        .filter_map(|(u, g)| g.max_index().map(|i| (u, i)))
        .collect()
}

fn score_rows(params: &LinearModelParams, rows: &[Vec<f64>]) -> Vec<f64> {
    rows.iter()
        .map(|f| params.score(f).unwrap_or(f64::NAN))
        .collect()
}

fn select_populations(
    targets: &ScoredGroupPeaksSet,
    decoys: &ScoredGroupPeaksSet,
    second_best: &[Vec<f64>],
    params: &LinearModelParams,
    q_cutoff: f64,
    min_positives: usize,
    uses_decoys: bool,
) -> Selection {
    let target_best = best_positions(targets);
    let decoy_best = if uses_decoys {
        best_positions(decoys)
    } else {
        Vec::new()
    };

    let mut competition: Vec<Competitor> = target_best
        .iter()
        .enumerate()
        .map(|(j, &(u, i))| Competitor {
            score: targets.groups()[u].peaks[i].score,
            label: TargetDecoy::Target,
            qval: f32::NAN,
            target: Some(j),
        })
        .collect();
    let negative_scores = decoy_best
        .iter()
        .map(|&(u, i)| decoys.groups()[u].peaks[i].score)
        .chain(score_rows(params, second_best));
    competition.extend(negative_scores.map(|score| Competitor {
        score,
        label: TargetDecoy::Decoy,
        qval: f32::NAN,
        target: None,
    }));
    competition.retain(|c| !c.score.is_nan());
    competition.sort_by(|a, b| b.score.total_cmp(&a.score));
    assign_qval(&mut competition);

    let mut positives: Vec<(usize, usize)> = competition
        .iter()
        .filter(|c| (c.qval as f64) <= q_cutoff)
        .filter_map(|c| c.target)
        .map(|j| target_best[j])
        .collect();
    if positives.len() < min_positives {
        debug!(
            "Only {} positives at q <= {}, using all {} target peaks",
            positives.len(),
            q_cutoff,
            target_best.len()
        );
        positives = target_best;
    }
    positives.sort_unstable();

    Selection {
        positives,
        decoy_negatives: decoy_best,
    }
}

/// Scores of the negative population: decoy best peaks plus the frozen
/// second best peaks.
fn negative_scores(
    decoys: &ScoredGroupPeaksSet,
    second_best: &[Vec<f64>],
    params: &LinearModelParams,
    uses_decoys: bool,
) -> Vec<f64> {
    let mut scores = if uses_decoys {
        decoys.best_scores()
    } else {
        Vec::new()
    };
    scores.extend(score_rows(params, second_best));
    scores.retain(|x| !x.is_nan());
    scores
}

/// Mean feature values of the target best peaks, accumulated in unit order.
fn mean_best_features(targets: &ScoredGroupPeaksSet, num_features: usize) -> Vec<f64> {
    let best = targets.best_peaks();
    (0..num_features)
        .map(|i| {
            let column: Vec<f64> = best.iter().map(|p| p.features[i]).collect();
            mean(&column)
        })
        .collect()
}

/// Rescale against the negative population and build the outcome.
fn finish(
    mut targets: ScoredGroupPeaksSet,
    mut decoys: ScoredGroupPeaksSet,
    second_best: &[Vec<f64>],
    params: LinearModelParams,
    input: &TrainingInput,
    report: TrainingReport,
    colinear_warning: bool,
) -> Result<TrainingOutcome, TrainingError> {
    decoys.score_peaks(&params)?;
    let scores = negative_scores(&decoys, second_best, &params, input.uses_decoys);
    let raw_mean = mean(&scores);
    let raw_stdev = sample_stdev(&scores);
    if !raw_mean.is_finite() || !raw_stdev.is_finite() || raw_stdev <= 0.0 {
        return Err(TrainingError::DegenerateDecoyDistribution {
            mean: raw_mean,
            stdev: raw_stdev,
            num_negatives: scores.len(),
        });
    }
    let params = params.rescale(raw_mean, raw_stdev)?;

    targets.score_peaks(&params)?;
    decoys.score_peaks(&params)?;
    let scores = negative_scores(&decoys, second_best, &params, input.uses_decoys);
    let decoy_mean = mean(&scores);
    let decoy_stdev = sample_stdev(&scores);

    let mean_features = mean_best_features(&targets, params.len());
    let report = TrainingReport {
        percent_contributions: params.percent_contributions(&mean_features),
        ..report
    };

    info!(
        "Trained on {} positives and {} negatives, decoy mean {:.4} stdev {:.4}",
        report.num_positives, report.num_negatives, decoy_mean, decoy_stdev
    );

    Ok(TrainingOutcome {
        params,
        decoy_mean,
        decoy_stdev,
        colinear_warning,
        report,
    })
}

/// Iterative discriminant training.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn train_discriminant(
    input: &TrainingInput,
    options: &TrainingOptions,
) -> Result<TrainingOutcome, TrainingError> {
    let (targets, decoys) = options.subsample.apply(input);
    let input = &TrainingInput {
        targets: &targets,
        decoys: &decoys,
        ..*input
    };
    let (eligible, ineligible) = prepare(input)?;
    let num_features = eligible.len();
    let columns: Vec<usize> = (0..num_features).filter(|&i| eligible[i]).collect();

    let mut params = match &options.seed {
        Some(seed) if seed.len() != num_features => {
            return Err(TrainingError::FeatureCountMismatch {
                expected: num_features,
                other: seed.len(),
            });
        }
        Some(seed) => seed.masked(&eligible),
        None => unit_seed(&eligible),
    };
    if !has_weights(&params) {
        debug!("Seed has no eligible weights, starting from a single calculator");
        params = unit_seed(&eligible);
    }

    let mut targets = input.targets.clone();
    let mut decoys = input.decoys.clone();
    targets.score_peaks(&params)?;
    let second_best = second_best_features(&targets, input.uses_second_best);

    let mut previous: Option<Selection> = None;
    let mut iterations = 0;
    let mut converged = false;
    let mut colinear_warning = false;
    let mut counts = (0, 0);

    for k in 0..options.max_iterations {
        if k > 0 {
            targets.score_peaks(&params)?;
        }
        decoys.score_peaks(&params)?;

        let q_cutoff = if k == 0 {
            options.initial_q_cutoff
        } else {
            options.q_cutoff
        };
        let selection = select_populations(
            &targets,
            &decoys,
            &second_best,
            &params,
            q_cutoff,
            options.min_positives,
            input.uses_decoys,
        );
        counts = (
            selection.positives.len(),
            selection.decoy_negatives.len() + second_best.len(),
        );
        info!(
            "Training iteration {}: {} positives, {} negatives",
            k, counts.0, counts.1
        );
        if previous.as_ref() == Some(&selection) {
            converged = true;
            break;
        }

        let positives: Vec<&[f64]> = selection
            .positives
            .iter()
            .map(|&(u, i)| targets.groups()[u].peaks[i].features.as_slice())
            .collect();
        let negatives: Vec<&[f64]> = selection
            .decoy_negatives
            .iter()
            .map(|&(u, i)| decoys.groups()[u].peaks[i].features.as_slice())
            .chain(second_best.iter().map(|x| x.as_slice()))
            .collect();

        let Some(fit) = fisher_discriminant(&positives, &negatives, &columns) else {
            warn!("Positives and negatives cannot be separated, keeping the previous weights");
            break;
        };
        colinear_warning |= fit.regularized;
        let mut weights = vec![f64::NAN; num_features];
        for (&c, w) in columns.iter().zip(fit.weights) {
            weights[c] = w;
        }
        params = LinearModelParams::new(weights, 0.0);
        iterations = k + 1;
        previous = Some(selection);
    }

    if converged {
        info!("Training converged after {} iterations", iterations);
    } else {
        info!(
            "Training stopped after {} iterations without converging",
            iterations
        );
    }
    if colinear_warning {
        warn!("Calculator values are colinear, the discriminant was regularized");
    }

    let report = TrainingReport {
        iterations,
        converged,
        ineligible,
        num_positives: counts.0,
        num_negatives: counts.1,
        percent_contributions: Vec::new(),
    };
    finish(
        targets,
        decoys,
        &second_best,
        params,
        input,
        report,
        colinear_warning,
    )
}

/// Keeps `weights` as they are, apart from masking and rescaling against
/// the negative population.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn train_fixed_weights(
    input: &TrainingInput,
    weights: &LinearModelParams,
    subsample: Subsample,
) -> Result<TrainingOutcome, TrainingError> {
    let (targets, decoys) = subsample.apply(input);
    let input = &TrainingInput {
        targets: &targets,
        decoys: &decoys,
        ..*input
    };
    let (eligible, ineligible) = prepare(input)?;
    if weights.len() != eligible.len() {
        return Err(TrainingError::FeatureCountMismatch {
            expected: eligible.len(),
            other: weights.len(),
        });
    }
    let params = weights.masked(&eligible);
    if !has_weights(&params) {
        return Err(TrainingError::NoEnabledCalculators {
            requested: input.enabled.iter().filter(|x| **x).count(),
            ineligible: ineligible.iter().map(|i| name_of(input, *i)).collect(),
        });
    }

    let mut targets = input.targets.clone();
    targets.score_peaks(&params)?;
    let second_best = second_best_features(&targets, input.uses_second_best);
    let decoys = input.decoys.clone();
    let num_decoys = if input.uses_decoys { decoys.len() } else { 0 };

    let report = TrainingReport {
        iterations: 0,
        converged: true,
        ineligible,
        num_positives: targets.best_peaks().len(),
        num_negatives: num_decoys + second_best.len(),
        percent_contributions: Vec::new(),
    };
    finish(targets, decoys, &second_best, params, input, report, false)
}

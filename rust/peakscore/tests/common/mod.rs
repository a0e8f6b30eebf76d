//! Synthetic documents with known true peaks.
//!
//! Every group gets three candidate peaks per replicate. Targets carry one
//! strong, co-eluting peak at a random candidate; the other candidates, and
//! every candidate of a decoy, are small bumps shifted independently per
//! transition.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use peakscore::calculators::CalculatorId;
use peakscore::ml::TrainingOptions;
use peakscore::models::{
    ChromatogramSnapshot,
    Document,
    GroupChromatograms,
    LabelType,
    PeakIdentification,
    PeptideNode,
    SummaryPeakData,
    TransitionChromatogram,
    TransitionGroupId,
    TransitionGroupNode,
    TransitionId,
    TransitionNode,
};
use peakscore::reintegration::extract_features;
use peakscore::scoring::{
    PeakScoringModel,
    ScoringModelKind,
};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const NUM_POINTS: usize = 60;
pub const CANDIDATE_CENTERS: [usize; 3] = [12, 30, 48];
const HALF_WIDTH: usize = 4;
const RELATIVE_INTENSITIES: [f64; 3] = [1.0, 0.6, 0.3];

#[derive(Debug, Clone)]
pub struct SyntheticOptions {
    pub num_targets: usize,
    pub num_decoys: usize,
    pub num_replicates: usize,
    /// Add a heavy internal standard partner to every peptide.
    pub with_standard: bool,
    pub seed: u64,
}

impl Default for SyntheticOptions {
    fn default() -> Self {
        Self {
            num_targets: 60,
            num_decoys: 60,
            num_replicates: 2,
            with_standard: false,
            seed: 42,
        }
    }
}

pub struct SyntheticRun {
    pub document: Arc<Document>,
    pub chromatograms: ChromatogramSnapshot,
    /// Candidate index of the true peak, per (peptide index, replicate).
    pub true_candidates: HashMap<(usize, usize), usize>,
}

pub fn calculators() -> Vec<CalculatorId> {
    vec![
        CalculatorId::MQuestIntensity,
        CalculatorId::MQuestWeightedShape,
        CalculatorId::MQuestWeightedCoElution,
    ]
}

fn gaussian(trace: &mut [f32], center: f64, sigma: f64, height: f64) {
    for (i, x) in trace.iter_mut().enumerate() {
        let z = (i as f64 - center) / sigma;
        *x += (height * (-0.5 * z * z).exp()) as f32;
    }
}

fn summary(trace: &[f32], center: usize) -> SummaryPeakData {
    let start = center - HALF_WIDTH;
    let end = center + HALF_WIDTH;
    let window = &trace[start..=end];
    let (apex, height) = window
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |acc, (i, &x)| if x > acc.1 { (i, x) } else { acc });
    SummaryPeakData {
        retention_time: (start + apex) as f32,
        start_time: start as f32,
        end_time: end as f32,
        area: window.iter().sum(),
        background_area: 0.0,
        height,
        fwhm: 2.0,
        mass_error_ppm: None,
        is_forced_integration: false,
        identified: PeakIdentification::False,
        start_index: Some(start),
        end_index: Some(end),
        time_index: Some(start + apex),
    }
}

/// Traces of one group in one replicate. `true_candidate` is `None` for
/// decoys.
fn group_traces(rng: &mut ChaCha8Rng, true_candidate: Option<usize>) -> Vec<Vec<f32>> {
    let mut traces: Vec<Vec<f32>> = (0..RELATIVE_INTENSITIES.len())
        .map(|_| (0..NUM_POINTS).map(|_| rng.gen_range(0.0..20.0)).collect())
        .collect();
    let true_height = rng.gen_range(2000.0..8000.0);
    for (c, &center) in CANDIDATE_CENTERS.iter().enumerate() {
        for (t, trace) in traces.iter_mut().enumerate() {
            if Some(c) == true_candidate {
                gaussian(trace, center as f64, 1.5, true_height * RELATIVE_INTENSITIES[t]);
            } else {
                let shift = rng.gen_range(-3.0..3.0);
                let height = rng.gen_range(50.0..300.0);
                gaussian(trace, center as f64 + shift, 1.2, height);
            }
        }
    }
    traces
}

fn group_chromatograms(
    group: &TransitionGroupNode,
    replicate: usize,
    times: &Arc<[f32]>,
    traces: &[Vec<f32>],
    scale: f32,
) -> GroupChromatograms {
    let transitions = group
        .transitions
        .iter()
        .zip(traces.iter())
        .map(|(node, trace)| {
            let trace: Vec<f32> = trace.iter().map(|x| x * scale).collect();
            TransitionChromatogram {
                transition_id: node.id,
                peaks: CANDIDATE_CENTERS.iter().map(|&c| summary(&trace, c)).collect(),
                intensities: Some(Arc::from(trace)),
            }
        })
        .collect();
    GroupChromatograms {
        group_id: group.id,
        replicate,
        times: Arc::clone(times),
        transitions,
    }
}

fn group_node(id: u32, label_type: LabelType, is_standard: bool) -> TransitionGroupNode {
    let transitions = ["y7", "y6", "y5"]
        .iter()
        .enumerate()
        .map(|(i, ion)| TransitionNode {
            id: TransitionId(id * 10 + i as u32),
            ion_name: ion.to_string(),
            is_ms1: false,
            library_intensity: None,
            isotope_proportion: None,
            results: vec![],
        })
        .collect();
    TransitionGroupNode {
        id: TransitionGroupId(id),
        precursor_charge: 2,
        label_type,
        is_standard,
        transitions,
        results: vec![],
    }
}

pub fn synthetic_run(options: &SyntheticOptions) -> SyntheticRun {
    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let times: Arc<[f32]> = (0..NUM_POINTS).map(|x| x as f32).collect();
    let mut chromatograms = ChromatogramSnapshot::new();
    let mut true_candidates = HashMap::new();
    let mut peptides = Vec::new();
    let mut next_id = 1u32;

    for i in 0..(options.num_targets + options.num_decoys) {
        let is_decoy = i >= options.num_targets;
        let mut groups = vec![group_node(next_id, LabelType::light(), false)];
        next_id += 1;
        if options.with_standard {
            groups.push(group_node(next_id, LabelType::heavy(), true));
            next_id += 1;
        }

        for replicate in 0..options.num_replicates {
            let true_candidate = if is_decoy {
                None
            } else {
                let c = rng.gen_range(0..CANDIDATE_CENTERS.len());
                true_candidates.insert((i, replicate), c);
                Some(c)
            };
            let traces = group_traces(&mut rng, true_candidate);
            for (g, group) in groups.iter().enumerate() {
                let scale = if g == 0 { 1.0 } else { 0.5 };
                chromatograms.insert(group_chromatograms(group, replicate, &times, &traces, scale));
            }
        }

        let sequence = if is_decoy {
            format!("DECOY_PEPTIDE{}K", i)
        } else {
            format!("PEPTIDE{}K", i)
        };
        peptides.push(PeptideNode {
            sequence,
            is_decoy,
            predicted_retention_time: None,
            groups: groups.into_iter().map(Arc::new).collect(),
        });
    }

    let replicates = (0..options.num_replicates)
        .map(|r| format!("run_{}", r))
        .collect();
    SyntheticRun {
        document: Arc::new(Document::new(replicates, peptides)),
        chromatograms,
        true_candidates,
    }
}

/// An mProphet model over [calculators] trained on `run`.
pub fn trained_model(run: &SyntheticRun, name: &str) -> PeakScoringModel {
    let calculators = calculators();
    let features = extract_features(&run.document, &run.chromatograms, &calculators).unwrap();
    let model = PeakScoringModel::with_calculator_list(name, ScoringModelKind::MProphet, calculators);
    let enabled = vec![true; model.calculators().len()];
    let (trained, _) = model
        .train(&features.targets, &features.decoys, &enabled, &TrainingOptions::default())
        .unwrap();
    trained
}

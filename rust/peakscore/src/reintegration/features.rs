//! Feature extraction over the whole document.
//!
//! A scoring unit is one matched label-type set of a peptide in one
//! replicate. All partner groups share the candidate peaks, so each
//! candidate is scored once for the whole set.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{
    debug,
    info,
};

use super::accumulator::ExtractionAccumulator;
use crate::calculators::{
    CalculatorId,
    GroupPeakData,
    PeakScoringContext,
    PeptidePeakData,
    TransitionPeakData,
    calculate_features,
};
use crate::errors::DataProcessingError;
use crate::models::{
    ChromatogramProvider,
    Document,
    GroupChromatograms,
    GroupPeaksKey,
    LabelPartners,
    PeakBounds,
    PeptideNode,
    ScoredGroupPeaks,
    ScoredGroupPeaksSet,
    ScoredPeak,
    TransitionGroupNode,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringUnit {
    pub peptide_index: usize,
    pub partners: LabelPartners,
    pub replicate: usize,
}

impl ScoringUnit {
    pub fn key(&self, peptide: &PeptideNode) -> GroupPeaksKey {
        GroupPeaksKey {
            peptide_index: self.peptide_index,
            group_id: peptide.groups[self.partners.representative].id,
            replicate: self.replicate,
            is_decoy: peptide.is_decoy,
        }
    }
}

/// Units of one peptide, partner sets first, then replicates.
pub fn peptide_units(peptide_index: usize, peptide: &PeptideNode, num_replicates: usize) -> Vec<ScoringUnit> {
    peptide
        .label_partner_sets()
        .into_iter()
        .flat_map(|partners| {
            (0..num_replicates).map(move |replicate| ScoringUnit {
                peptide_index,
                partners: partners.clone(),
                replicate,
            })
        })
        .collect()
}

/// Every unit of the document, in document order.
pub fn scoring_units(document: &Document) -> Vec<ScoringUnit> {
    let num_replicates = document.replicates.len();
    document
        .peptides
        .iter()
        .enumerate()
        .flat_map(|(i, p)| peptide_units(i, p, num_replicates))
        .collect()
}

/// Target and decoy units with their candidate features, in document order.
#[derive(Debug, Clone, Default)]
pub struct ExtractedFeatures {
    pub calculators: Vec<CalculatorId>,
    pub targets: ScoredGroupPeaksSet,
    pub decoys: ScoredGroupPeaksSet,
}

impl ExtractedFeatures {
    pub fn from_units(calculators: Vec<CalculatorId>, units: Vec<ScoredGroupPeaks>) -> Self {
        let (decoys, targets): (Vec<_>, Vec<_>) = units.into_iter().partition(|x| x.key.is_decoy);
        Self {
            calculators,
            targets: ScoredGroupPeaksSet::new(targets),
            decoys: ScoredGroupPeaksSet::new(decoys),
        }
    }

    pub fn num_units(&self) -> usize {
        self.targets.len() + self.decoys.len()
    }
}

/// Shared bounds of one candidate across every transition of the unit.
///
/// The apex is the retention time of the tallest transition.
pub fn candidate_bounds(peak: &PeptidePeakData) -> Option<PeakBounds> {
    let mut transitions = peak.groups.iter().flat_map(|g| g.transitions.iter());
    let first = transitions.next()?;
    let mut bounds = PeakBounds {
        start_time: first.peak.start_time,
        end_time: first.peak.end_time,
        apex_time: first.peak.retention_time,
    };
    let mut apex_height = first.peak.height;
    for trans in transitions {
        bounds.start_time = bounds.start_time.min(trans.peak.start_time);
        bounds.end_time = bounds.end_time.max(trans.peak.end_time);
        if trans.peak.height > apex_height {
            apex_height = trans.peak.height;
            bounds.apex_time = trans.peak.retention_time;
        }
    }
    Some(bounds)
}

fn group_peak_data(
    group: &TransitionGroupNode,
    chromatograms: &GroupChromatograms,
    candidate: usize,
) -> GroupPeakData {
    let transitions = group
        .transitions
        .iter()
        .filter_map(|node| {
            let chrom = chromatograms.transition(node.id)?;
            let peak = chrom.peaks.get(candidate)?.clone();
            Some(TransitionPeakData {
                is_ms1: node.is_ms1,
                library_intensity: node.library_intensity,
                isotope_proportion: node.isotope_proportion,
                peak,
                intensities: chrom.intensities.clone(),
            })
        })
        .collect();
    GroupPeakData {
        is_standard: group.is_standard,
        times: Arc::clone(&chromatograms.times),
        transitions,
    }
}

/// Score every candidate peak of one unit with `calculators`.
///
/// Partner groups without chromatograms are left out. A unit without any
/// chromatograms comes back with no candidates.
pub fn extract_unit<P: ChromatogramProvider + ?Sized>(
    document: &Document,
    provider: &P,
    calculators: &[CalculatorId],
    unit: &ScoringUnit,
) -> Result<ScoredGroupPeaks, DataProcessingError> {
    let peptide = &document.peptides[unit.peptide_index];
    let key = unit.key(peptide);
    let context = PeakScoringContext {
        predicted_retention_time: peptide.predicted_retention_time,
    };

    let mut members: Vec<(&TransitionGroupNode, Arc<GroupChromatograms>)> = Vec::new();
    let mut num_candidates: Option<usize> = None;
    for &g in unit.partners.members.iter() {
        let group = peptide.groups[g].as_ref();
        let Some(chromatograms) = provider.group_chromatograms(group.id, unit.replicate) else {
            continue;
        };
        let count = chromatograms.num_candidates().map_err(|e| {
            e.append_to_context(&format!(" (peptide {})", peptide.sequence))
        })?;
        match num_candidates {
            Some(expected) if expected != count => {
                return Err(DataProcessingError::InconsistentCandidateCount {
                    expected,
                    other: count,
                    context: format!(
                        "label partners of group {} in replicate {}",
                        key.group_id, unit.replicate
                    ),
                });
            }
            _ => num_candidates = Some(count),
        }
        members.push((group, chromatograms));
    }

    let peaks = (0..num_candidates.unwrap_or(0))
        .map(|candidate| {
            let peak_data = PeptidePeakData {
                groups: members
                    .iter()
                    .map(|(group, chroms)| group_peak_data(group, chroms, candidate))
                    .collect(),
            };
            let features = calculate_features(calculators, &context, &peak_data);
            let scored = ScoredPeak::new(candidate, features);
            match candidate_bounds(&peak_data) {
                Some(bounds) => scored.with_bounds(bounds),
                None => scored,
            }
        })
        .collect();

    Ok(ScoredGroupPeaks::new(key, peaks))
}

/// [extract_unit] over many units in parallel. Output order follows `units`.
#[cfg_attr(
    feature = "instrumentation",
    tracing::instrument(skip_all, level = "trace")
)]
pub fn extract_units<P: ChromatogramProvider + ?Sized>(
    document: &Document,
    provider: &P,
    calculators: &[CalculatorId],
    units: &[ScoringUnit],
) -> Result<Vec<ScoredGroupPeaks>, DataProcessingError> {
    let extract = |(i, unit): (usize, &ScoringUnit)| {
        (i, extract_unit(document, provider, calculators, unit))
    };

    #[cfg(not(feature = "serial_scoring"))]
    let acc: ExtractionAccumulator = units
        .par_iter()
        .enumerate()
        .with_min_len(64)
        .map(extract)
        .collect();

    #[cfg(feature = "serial_scoring")]
    let acc: ExtractionAccumulator = units.iter().enumerate().map(extract).collect();

    if acc.empty_units > 0 {
        debug!("{} units have no candidate peaks", acc.empty_units);
    }
    acc.into_ordered()
}

/// Extract features of every unit of the document.
pub fn extract_features<P: ChromatogramProvider + ?Sized>(
    document: &Document,
    provider: &P,
    calculators: &[CalculatorId],
) -> Result<ExtractedFeatures, DataProcessingError> {
    let st = Instant::now();
    let units = scoring_units(document);
    let scored = extract_units(document, provider, calculators, &units)?;
    let out = ExtractedFeatures::from_units(calculators.to_vec(), scored);
    info!(
        "Extracted {} calculators for {} target and {} decoy units in {:?}",
        calculators.len(),
        out.targets.len(),
        out.decoys.len(),
        st.elapsed()
    );
    Ok(out)
}

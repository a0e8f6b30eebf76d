//! Copy-on-write document tree.
//!
//! Every level below [Document] is shared through [Arc], so publishing a new
//! revision only allocates the nodes on the path to a change. Nodes that did
//! not change keep their pointer, which lets callers compare revisions with
//! [Arc::ptr_eq].

use serde::{
    Deserialize,
    Serialize,
};
use std::sync::Arc;

use super::chromatograms::SummaryPeakData;
use crate::scoring::PeakScoringModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionGroupId(pub u32);

impl std::fmt::Display for TransitionGroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionId(pub u32);

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Isotope label of a transition group, "light" for the unlabeled form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelType(pub String);

impl LabelType {
    pub fn light() -> Self {
        Self("light".to_string())
    }

    pub fn heavy() -> Self {
        Self("heavy".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LabelType {
    fn default() -> Self {
        Self::light()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakBounds {
    pub start_time: f32,
    pub end_time: f32,
    pub apex_time: f32,
}

/// Who chose the current peak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSet {
    #[default]
    False,
    True,
    Reintegrated,
    Matched,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupChromInfo {
    #[serde(default)]
    pub peak: Option<PeakBounds>,
    #[serde(default)]
    pub user_set: UserSet,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub q_value: Option<f64>,
}

impl GroupChromInfo {
    pub fn is_empty(&self) -> bool {
        self.peak.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionChromInfo {
    #[serde(default)]
    pub peak: Option<SummaryPeakData>,
    #[serde(default)]
    pub user_set: UserSet,
}

impl TransitionChromInfo {
    pub fn is_empty(&self) -> bool {
        self.peak.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionNode {
    pub id: TransitionId,
    pub ion_name: String,
    #[serde(default)]
    pub is_ms1: bool,
    #[serde(default)]
    pub library_intensity: Option<f32>,
    #[serde(default)]
    pub isotope_proportion: Option<f32>,
    /// One entry per replicate.
    #[serde(default)]
    pub results: Vec<TransitionChromInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionGroupNode {
    pub id: TransitionGroupId,
    pub precursor_charge: u8,
    #[serde(default)]
    pub label_type: LabelType,
    #[serde(default)]
    pub is_standard: bool,
    pub transitions: Vec<TransitionNode>,
    /// One entry per replicate.
    #[serde(default)]
    pub results: Vec<GroupChromInfo>,
}

impl TransitionGroupNode {
    pub fn chrom_info(&self, replicate: usize) -> Option<&GroupChromInfo> {
        self.results.get(replicate)
    }

    pub fn is_user_set(&self, replicate: usize) -> bool {
        self.chrom_info(replicate)
            .is_some_and(|x| x.user_set == UserSet::True)
    }

    /// Copy of this group with the results of one replicate replaced.
    ///
    /// `transition_infos` must line up with `self.transitions`. Returns
    /// `None` when the replacement is identical to what is already stored.
    pub fn with_replicate_result(
        &self,
        replicate: usize,
        group_info: GroupChromInfo,
        transition_infos: Vec<TransitionChromInfo>,
    ) -> Option<Self> {
        debug_assert_eq!(transition_infos.len(), self.transitions.len());
        let unchanged_group = self
            .results
            .get(replicate)
            .is_some_and(|x| *x == group_info);
        let unchanged_transitions = self
            .transitions
            .iter()
            .zip(transition_infos.iter())
            .all(|(t, info)| t.results.get(replicate).is_some_and(|x| x == info));
        if unchanged_group && unchanged_transitions {
            return None;
        }

        let mut out = self.clone();
        set_at(&mut out.results, replicate, group_info);
        for (trans, info) in out.transitions.iter_mut().zip(transition_infos) {
            set_at(&mut trans.results, replicate, info);
        }
        Some(out)
    }
}

fn set_at<T: Default>(values: &mut Vec<T>, index: usize, value: T) {
    if values.len() <= index {
        values.resize_with(index + 1, T::default);
    }
    values[index] = value;
}

/// Groups of one peptide that share a precursor charge and are integrated
/// together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPartners {
    /// Index (into `PeptideNode::groups`) of the group that identifies the set.
    pub representative: usize,
    /// All members, representative included, in document order.
    pub members: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeptideNode {
    pub sequence: String,
    #[serde(default)]
    pub is_decoy: bool,
    #[serde(default)]
    pub predicted_retention_time: Option<f64>,
    pub groups: Vec<Arc<TransitionGroupNode>>,
}

impl PeptideNode {
    /// Partition the groups of this peptide into matched label-type sets.
    ///
    /// The representative of each set is its first non-standard group, or
    /// the first group when every member is a standard.
    pub fn label_partner_sets(&self) -> Vec<LabelPartners> {
        let mut charges: Vec<u8> = Vec::new();
        for group in self.groups.iter() {
            if !charges.contains(&group.precursor_charge) {
                charges.push(group.precursor_charge);
            }
        }

        charges
            .into_iter()
            .map(|charge| {
                let members: Vec<usize> = self
                    .groups
                    .iter()
                    .enumerate()
                    .filter(|(_, g)| g.precursor_charge == charge)
                    .map(|(i, _)| i)
                    .collect();
                let representative = members
                    .iter()
                    .copied()
                    .find(|&i| !self.groups[i].is_standard)
                    .unwrap_or(members[0]);
                LabelPartners {
                    representative,
                    members,
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSettings {
    #[serde(default)]
    pub peak_scoring_model: Option<Arc<PeakScoringModel>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub revision: u64,
    pub replicates: Vec<String>,
    pub peptides: Vec<Arc<PeptideNode>>,
    #[serde(default)]
    pub settings: DocumentSettings,
}

impl Document {
    pub fn new(replicates: Vec<String>, peptides: Vec<PeptideNode>) -> Self {
        Self {
            revision: 0,
            replicates,
            peptides: peptides.into_iter().map(Arc::new).collect(),
            settings: DocumentSettings::default(),
        }
    }

    /// Publish a revision with `model` bound into the settings.
    ///
    /// Hands back the same document when an equal model is already bound.
    pub fn with_scoring_model(self: &Arc<Self>, model: Arc<PeakScoringModel>) -> Arc<Self> {
        if self.settings.peak_scoring_model.as_deref() == Some(&*model) {
            return Arc::clone(self);
        }
        let mut out = (**self).clone();
        out.settings.peak_scoring_model = Some(model);
        out.revision += 1;
        Arc::new(out)
    }

    pub fn group_chrom_info(
        &self,
        peptide_index: usize,
        group_index: usize,
        replicate: usize,
    ) -> Option<&GroupChromInfo> {
        self.peptides
            .get(peptide_index)?
            .groups
            .get(group_index)?
            .chrom_info(replicate)
    }

    pub fn iter_groups(&self) -> impl Iterator<Item = (&PeptideNode, &TransitionGroupNode)> {
        self.peptides
            .iter()
            .flat_map(|p| p.groups.iter().map(move |g| (p.as_ref(), g.as_ref())))
    }

    pub fn iter_transition_chrom_infos(&self) -> impl Iterator<Item = &TransitionChromInfo> {
        self.iter_groups()
            .flat_map(|(_, g)| g.transitions.iter())
            .flat_map(|t| t.results.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: u32, charge: u8, label: LabelType, is_standard: bool) -> Arc<TransitionGroupNode> {
        Arc::new(TransitionGroupNode {
            id: TransitionGroupId(id),
            precursor_charge: charge,
            label_type: label,
            is_standard,
            transitions: vec![TransitionNode {
                id: TransitionId(id * 10),
                ion_name: "y7".to_string(),
                is_ms1: false,
                library_intensity: None,
                isotope_proportion: None,
                results: vec![],
            }],
            results: vec![],
        })
    }

    #[test]
    fn test_label_partner_sets() {
        let pep = PeptideNode {
            sequence: "PEPTIDEK".to_string(),
            is_decoy: false,
            predicted_retention_time: None,
            groups: vec![
                group(1, 2, LabelType::heavy(), true),
                group(2, 2, LabelType::light(), false),
                group(3, 3, LabelType::light(), false),
            ],
        };
        let sets = pep.label_partner_sets();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].representative, 1);
        assert_eq!(sets[0].members, vec![0, 1]);
        assert_eq!(sets[1].representative, 2);
        assert_eq!(sets[1].members, vec![2]);
    }

    #[test]
    fn test_with_replicate_result_detects_no_change() {
        let g = group(1, 2, LabelType::light(), false);
        let info = GroupChromInfo {
            peak: Some(PeakBounds {
                start_time: 1.0,
                end_time: 2.0,
                apex_time: 1.5,
            }),
            user_set: UserSet::Reintegrated,
            score: Some(3.0),
            q_value: Some(0.001),
        };
        let changed = g
            .with_replicate_result(1, info.clone(), vec![TransitionChromInfo::default()])
            .unwrap();
        assert_eq!(changed.results.len(), 2);
        assert_eq!(changed.transitions[0].results.len(), 2);
        assert!(changed
            .with_replicate_result(1, info, vec![TransitionChromInfo::default()])
            .is_none());
    }
}

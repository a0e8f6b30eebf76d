pub mod chromatograms;
pub mod document;
pub mod scored_peaks;

pub use chromatograms::{
    ChromatogramProvider,
    ChromatogramSnapshot,
    GroupChromatograms,
    PeakIdentification,
    SummaryPeakData,
    TransitionChromatogram,
};
pub use document::{
    Document,
    DocumentSettings,
    GroupChromInfo,
    LabelPartners,
    LabelType,
    PeakBounds,
    PeptideNode,
    TransitionChromInfo,
    TransitionGroupId,
    TransitionGroupNode,
    TransitionId,
    TransitionNode,
    UserSet,
};
pub use scored_peaks::{
    GroupPeaksKey,
    ScoredGroupPeaks,
    ScoredGroupPeaksSet,
    ScoredPeak,
    find_missing_scores,
};

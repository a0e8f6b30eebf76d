//! Calculators carried over from the original fixed-weight scoring, kept so
//! the legacy model and older saved models still have their inputs.

use super::peak_data::{
    GroupPeakData,
    PeptidePeakData,
};

fn unforced_area<'a>(groups: impl Iterator<Item = &'a GroupPeakData>) -> f64 {
    groups
        .flat_map(|g| g.ms2())
        .filter(|t| !t.peak.is_forced_integration)
        .map(|t| t.area().max(0.0))
        .sum()
}

/// `ln(analyte + standard^1.2)` over peaks the detector actually found.
pub(super) fn log_unforced_area(peak: &PeptidePeakData) -> f64 {
    let analyte = unforced_area(peak.analyte_groups());
    let standard = unforced_area(peak.standard_groups());
    (analyte + standard.powf(1.2)).max(1.0).ln()
}

/// Fraction of transitions with a detected peak, scaled to 4 once there are
/// more than 4 transitions so long and short precursors compare.
pub(super) fn unforced_count_score<'a>(groups: impl Iterator<Item = &'a GroupPeakData>) -> f64 {
    let (unforced, total) = groups
        .flat_map(|g| g.ms2())
        .fold((0usize, 0usize), |acc, t| {
            let found = !t.peak.is_forced_integration && t.peak.area > 0.0;
            (acc.0 + found as usize, acc.1 + 1)
        });
    if total == 0 {
        return f64::NAN;
    }
    if total > 4 {
        4.0 * unforced as f64 / total as f64
    } else {
        unforced as f64
    }
}

pub(super) fn identified_count<'a>(groups: impl Iterator<Item = &'a GroupPeakData>) -> f64 {
    let (identified, total) = groups.fold((0usize, 0usize), |acc, g| {
        let id = g.transitions.iter().any(|t| t.peak.identified.is_identified());
        (acc.0 + id as usize, acc.1 + 1)
    });
    if total == 0 {
        return f64::NAN;
    }
    identified as f64
}

#[cfg(test)]
mod tests {
    use super::super::test_data::{
        peptide,
        transition,
    };
    use super::*;
    use crate::models::PeakIdentification;

    #[test]
    fn test_unforced_count_scaling() {
        let mut transitions: Vec<_> = (0..8).map(|_| transition(100.0, 10.0)).collect();
        transitions[0].peak.is_forced_integration = true;
        transitions[1].peak.area = 0.0;
        let pep = peptide(vec![(false, transitions)]);
        // 6 of 8 found -> 4 * 6 / 8
        assert_eq!(unforced_count_score(pep.analyte_groups()), 3.0);

        let small = peptide(vec![(false, (0..3).map(|_| transition(1.0, 1.0)).collect())]);
        assert_eq!(unforced_count_score(small.analyte_groups()), 3.0);
        assert!(unforced_count_score(small.standard_groups()).is_nan());
    }

    #[test]
    fn test_log_unforced_area() {
        let pep = peptide(vec![
            (false, vec![transition(100.0, 1.0), transition(50.0, 1.0)]),
            (true, vec![transition(10.0, 1.0)]),
        ]);
        let expected = (150.0 + 10.0f64.powf(1.2)).ln();
        assert!((log_unforced_area(&pep) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_identified_count() {
        let mut t = transition(1.0, 1.0);
        t.peak.identified = PeakIdentification::Aligned;
        let pep = peptide(vec![(false, vec![t]), (false, vec![transition(1.0, 1.0)])]);
        assert_eq!(identified_count(pep.analyte_groups()), 1.0);
    }
}

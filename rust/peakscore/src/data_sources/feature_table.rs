//! mProphet style feature tables.
//!
//! Tab separated, one row per candidate peak. Rows sharing a
//! `transition_group_id` and `run_id` compete for the same unit. Feature
//! columns are one `main_var_*` column followed by any number of `var_*`
//! columns.

use std::collections::HashMap;
use std::io::{
    Read,
    Write,
};
use std::path::Path;

use tracing::info;

use crate::calculators::CalculatorId;
use crate::errors::{
    FeatureTableError,
    PeakScoringError,
};
use crate::models::{
    GroupPeaksKey,
    ScoredGroupPeaks,
    ScoredGroupPeaksSet,
    ScoredPeak,
    TransitionGroupId,
};

const GROUP_COLUMN: &str = "transition_group_id";
const RUN_COLUMN: &str = "run_id";
const DECOY_COLUMN: &str = "decoy";
const MAIN_PREFIX: &str = "main_var_";
const VAR_PREFIX: &str = "var_";

#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    /// Feature column names as written in the header, main variable first.
    pub columns: Vec<String>,
    /// Distinct group ids, indexed by `GroupPeaksKey::peptide_index`.
    pub group_names: Vec<String>,
    /// Distinct run ids, indexed by `GroupPeaksKey::replicate`.
    pub runs: Vec<String>,
    pub targets: ScoredGroupPeaksSet,
    pub decoys: ScoredGroupPeaksSet,
}

impl FeatureTable {
    /// Calculators named by the columns, if every column names one.
    pub fn calculators(&self) -> Option<Vec<CalculatorId>> {
        self.columns
            .iter()
            .map(|c| CalculatorId::from_name(c))
            .collect()
    }
}

fn parse_value(value: &str, row: usize, column: &str) -> Result<f64, FeatureTableError> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("nan") || value.eq_ignore_ascii_case("na") {
        return Ok(f64::NAN);
    }
    value.parse::<f64>().map_err(|_| FeatureTableError::InvalidValue {
        row,
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn parse_decoy(value: &str, row: usize) -> Result<bool, FeatureTableError> {
    match value.trim() {
        "1" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(FeatureTableError::InvalidValue {
            row,
            column: DECOY_COLUMN.to_string(),
            value: other.to_string(),
        }),
    }
}

fn index_of(names: &mut Vec<String>, lookup: &mut HashMap<String, usize>, name: &str) -> usize {
    if let Some(i) = lookup.get(name) {
        return *i;
    }
    let i = names.len();
    names.push(name.to_string());
    lookup.insert(name.to_string(), i);
    i
}

/// Parse a feature table from any reader.
pub fn parse_feature_table<R: Read>(reader: R) -> Result<FeatureTable, FeatureTableError> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();
    let position = |name: &str| headers.iter().position(|h| h == name);

    let group_col = position(GROUP_COLUMN).ok_or(FeatureTableError::MissingColumn {
        name: GROUP_COLUMN,
    })?;
    let decoy_col = position(DECOY_COLUMN).ok_or(FeatureTableError::MissingColumn {
        name: DECOY_COLUMN,
    })?;
    let run_col = position(RUN_COLUMN);

    let main: Vec<usize> = (0..headers.len())
        .filter(|&i| headers[i].starts_with(MAIN_PREFIX))
        .collect();
    if main.len() != 1 {
        return Err(FeatureTableError::MainVariable { found: main.len() });
    }
    let mut feature_cols = main;
    feature_cols.extend((0..headers.len()).filter(|&i| headers[i].starts_with(VAR_PREFIX)));
    let columns: Vec<String> = feature_cols.iter().map(|&i| headers[i].to_string()).collect();

    let mut group_names = Vec::new();
    let mut group_lookup = HashMap::new();
    let mut runs = Vec::new();
    let mut run_lookup = HashMap::new();
    let mut units: Vec<ScoredGroupPeaks> = Vec::new();
    let mut unit_lookup: HashMap<(usize, usize), usize> = HashMap::new();

    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let group = index_of(&mut group_names, &mut group_lookup, field(group_col));
        let run = index_of(
            &mut runs,
            &mut run_lookup,
            run_col.map(field).unwrap_or("0"),
        );
        let is_decoy = parse_decoy(field(decoy_col), row)?;
        let features = feature_cols
            .iter()
            .map(|&i| parse_value(field(i), row, &headers[i]))
            .collect::<Result<Vec<f64>, _>>()?;

        let unit = *unit_lookup.entry((group, run)).or_insert_with(|| {
            units.push(ScoredGroupPeaks::new(
                GroupPeaksKey {
                    peptide_index: group,
                    group_id: TransitionGroupId(group as u32),
                    replicate: run,
                    is_decoy,
                },
                Vec::new(),
            ));
            units.len() - 1
        });
        let candidate = units[unit].peaks.len();
        units[unit].peaks.push(ScoredPeak::new(candidate, features));
    }

    let (decoys, targets): (Vec<_>, Vec<_>) = units.into_iter().partition(|u| u.key.is_decoy);
    Ok(FeatureTable {
        columns,
        group_names,
        runs,
        targets: ScoredGroupPeaksSet::new(targets),
        decoys: ScoredGroupPeaksSet::new(decoys),
    })
}

pub fn read_feature_table(path: &Path) -> Result<FeatureTable, PeakScoringError> {
    let file = std::fs::File::open(path).map_err(|e| PeakScoringError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    let table = parse_feature_table(std::io::BufReader::new(file))?;
    info!(
        "Read {} target and {} decoy units with {} features from {}",
        table.targets.len(),
        table.decoys.len(),
        table.columns.len(),
        path.display()
    );
    Ok(table)
}

/// Write extracted features in the same layout [parse_feature_table] reads.
/// The first calculator becomes the main variable.
pub fn write_feature_table<W: Write>(
    writer: W,
    calculators: &[CalculatorId],
    sets: &[&ScoredGroupPeaksSet],
) -> Result<(), FeatureTableError> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    let mut header = vec![
        GROUP_COLUMN.to_string(),
        RUN_COLUMN.to_string(),
        DECOY_COLUMN.to_string(),
    ];
    header.extend(calculators.iter().enumerate().map(|(i, c)| {
        let prefix = if i == 0 { MAIN_PREFIX } else { VAR_PREFIX };
        format!("{}{}", prefix, c.name())
    }));
    wtr.write_record(&header)?;

    for group in sets.iter().flat_map(|s| s.groups()) {
        for peak in group.peaks.iter() {
            let mut record = vec![
                group.key.group_id.to_string(),
                group.key.replicate.to_string(),
                (group.key.is_decoy as u8).to_string(),
            ];
            record.extend(peak.features.iter().map(|x| {
                if x.is_nan() {
                    "NaN".to_string()
                } else {
                    x.to_string()
                }
            }));
            wtr.write_record(&record)?;
        }
    }
    wtr.flush().map_err(|e| FeatureTableError::Csv(e.into()))?;
    Ok(())
}

pub fn save_feature_table(
    path: &Path,
    calculators: &[CalculatorId],
    sets: &[&ScoredGroupPeaksSet],
) -> Result<(), PeakScoringError> {
    let file = std::fs::File::create(path).map_err(|e| PeakScoringError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    write_feature_table(std::io::BufWriter::new(file), calculators, sets)?;
    info!(
        "Wrote {} units with {} features to {}",
        sets.iter().map(|s| s.len()).sum::<usize>(),
        calculators.len(),
        path.display()
    );
    Ok(())
}

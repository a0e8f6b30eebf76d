//! Document and chromatogram files.
//!
//! Documents are a single JSON object. Chromatograms are either a JSON
//! array of [GroupChromatograms] or newline delimited JSON with one group
//! per line.

use std::io::{
    BufRead,
    BufReader,
    BufWriter,
    Read,
    Write,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::errors::PeakScoringError;
use crate::models::{
    ChromatogramSnapshot,
    Document,
    GroupChromatograms,
};
use crate::scoring::{
    PeakScoringModel,
    ScoringModelRecord,
};

fn open(path: &Path) -> Result<BufReader<std::fs::File>, PeakScoringError> {
    let file = std::fs::File::open(path).map_err(|e| PeakScoringError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    Ok(BufReader::new(file))
}

fn create(path: &Path) -> Result<BufWriter<std::fs::File>, PeakScoringError> {
    let file = std::fs::File::create(path).map_err(|e| PeakScoringError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    Ok(BufWriter::new(file))
}

/// Parse a document. A bound scoring model is converted from its record
/// separately, so a broken model reports as a model format error.
pub fn parse_document<R: Read>(reader: R) -> Result<Document, PeakScoringError> {
    let mut value: serde_json::Value = serde_json::from_reader(reader)?;
    let model = value
        .get_mut("settings")
        .and_then(|x| x.get_mut("peak_scoring_model"))
        .map(serde_json::Value::take)
        .unwrap_or(serde_json::Value::Null);
    let mut document: Document = serde_json::from_value(value)?;
    if !model.is_null() {
        let record: ScoringModelRecord = serde_json::from_value(model)?;
        let model = PeakScoringModel::try_from(record)?;
        document.settings.peak_scoring_model = Some(Arc::new(model));
    }
    Ok(document)
}

pub fn read_document(path: &Path) -> Result<Document, PeakScoringError> {
    let st = Instant::now();
    let document = parse_document(open(path)?)?;
    info!(
        "Read document with {} peptides and {} replicates from {} in {:?}",
        document.peptides.len(),
        document.replicates.len(),
        path.display(),
        st.elapsed()
    );
    Ok(document)
}

pub fn write_document(path: &Path, document: &Document) -> Result<(), PeakScoringError> {
    let mut writer = create(path)?;
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.flush()?;
    info!("Wrote document revision {} to {}", document.revision, path.display());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromatogramFormat {
    Json,
    NdJson,
}

impl ChromatogramFormat {
    pub fn detect_from_path(path: &Path) -> Result<Self, PeakScoringError> {
        let path_str = path.to_string_lossy().to_lowercase();
        if path_str.ends_with(".ndjson") || path_str.ends_with(".jsonl") {
            Ok(ChromatogramFormat::NdJson)
        } else if path_str.ends_with(".json") {
            Ok(ChromatogramFormat::Json)
        } else {
            Self::detect_from_content(open(path)?)
        }
    }

    /// A JSON array starts with `[`, anything else is read line by line.
    fn detect_from_content<R: Read>(reader: R) -> Result<Self, PeakScoringError> {
        for byte in reader.bytes() {
            let byte = byte?;
            if byte.is_ascii_whitespace() {
                continue;
            }
            return Ok(if byte == b'[' {
                ChromatogramFormat::Json
            } else {
                ChromatogramFormat::NdJson
            });
        }
        Ok(ChromatogramFormat::Json)
    }
}

/// Parse chromatograms from any reader in the given format.
pub fn parse_chromatograms<R: BufRead>(
    reader: R,
    format: ChromatogramFormat,
) -> Result<ChromatogramSnapshot, PeakScoringError> {
    match format {
        ChromatogramFormat::Json => Ok(serde_json::from_reader(reader)?),
        ChromatogramFormat::NdJson => {
            let mut out = ChromatogramSnapshot::new();
            for (i, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let group: GroupChromatograms =
                    serde_json::from_str(&line).map_err(|e| PeakScoringError::ParseError {
                        msg: format!("Error parsing chromatograms on line {}: {}", i + 1, e),
                    })?;
                out.insert(group);
            }
            Ok(out)
        }
    }
}

pub fn read_chromatograms(path: &Path) -> Result<ChromatogramSnapshot, PeakScoringError> {
    let st = Instant::now();
    let format = ChromatogramFormat::detect_from_path(path)?;
    let snapshot = parse_chromatograms(open(path)?, format)?;
    info!(
        "Read chromatograms for {} groups from {} ({:?}) in {:?}",
        snapshot.len(),
        path.display(),
        format,
        st.elapsed()
    );
    Ok(snapshot)
}

pub fn write_chromatograms(
    path: &Path,
    snapshot: &ChromatogramSnapshot,
) -> Result<(), PeakScoringError> {
    let mut writer = create(path)?;
    match ChromatogramFormat::detect_from_path(path).unwrap_or(ChromatogramFormat::Json) {
        ChromatogramFormat::Json => serde_json::to_writer(&mut writer, snapshot)?,
        ChromatogramFormat::NdJson => {
            let groups: Vec<GroupChromatograms> = snapshot.clone().into();
            for group in groups.iter() {
                serde_json::to_writer(&mut writer, group)?;
                writer.write_all(b"\n")?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

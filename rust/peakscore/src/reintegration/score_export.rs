use std::io::Write;

use super::features::scoring_units;
use super::handler::ReintegrationHandler;
use crate::errors::PeakScoringError;
use crate::models::ChromatogramProvider;

fn format_value(x: f64) -> String {
    if x.is_finite() {
        x.to_string()
    } else {
        String::new()
    }
}

impl<P: ChromatogramProvider + ?Sized> ReintegrationHandler<'_, P> {
    /// Write one tab separated row per candidate peak.
    ///
    /// Non-finite values are written as empty fields. The q-value is only
    /// filled on the best peak of each unit.
    pub fn write_scores<W: Write>(&self, writer: W) -> Result<usize, PeakScoringError> {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(writer);

        let calculators = self.model().calculators();
        let mut header: Vec<String> = [
            "peptide",
            "transition_group_id",
            "label_partners",
            "replicate",
            "candidate",
            "decoy",
        ]
        .iter()
        .map(|x| x.to_string())
        .collect();
        header.extend(calculators.iter().map(|c| c.header_name().to_string()));
        header.extend(["score", "q_value", "best"].iter().map(|x| x.to_string()));
        wtr.write_record(&header)?;

        let document = self.document();
        let mut rows = 0;
        for unit in scoring_units(document) {
            let peptide = &document.peptides[unit.peptide_index];
            let Some(scored) = self.unit(&unit.key(peptide)) else {
                continue;
            };
            let partners = unit
                .partners
                .members
                .iter()
                .map(|&g| peptide.groups[g].id.to_string())
                .collect::<Vec<_>>()
                .join(";");
            let replicate = document
                .replicates
                .get(unit.replicate)
                .cloned()
                .unwrap_or_else(|| unit.replicate.to_string());
            let best = scored.peaks.max_index();

            for (i, peak) in scored.peaks.peaks.iter().enumerate() {
                let is_best = best == Some(i);
                let mut record = vec![
                    peptide.sequence.clone(),
                    scored.peaks.key.group_id.to_string(),
                    partners.clone(),
                    replicate.clone(),
                    peak.candidate_index.to_string(),
                    (peptide.is_decoy as u8).to_string(),
                ];
                record.extend(peak.features.iter().map(|x| format_value(*x)));
                record.push(format_value(peak.score));
                record.push(if is_best {
                    format_value(scored.q_value)
                } else {
                    String::new()
                });
                record.push((is_best as u8).to_string());
                wtr.write_record(&record)?;
                rows += 1;
            }
        }
        wtr.flush().map_err(|e| PeakScoringError::Io {
            source: e,
            path: None,
        })?;
        Ok(rows)
    }
}

//! CSV export of the display window (best scenario first).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::optimizer::ScenarioResult;
use crate::report::window_rows;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to create '{path}': {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to flush csv: {0}")]
    Io(#[from] std::io::Error),
}

/// Write the best scenario and up to `limit` alternatives. Returns the number of data rows.
pub fn write_scenarios_csv<W: Write>(
    writer: W,
    scenarios: &[ScenarioResult],
    limit: usize,
) -> Result<usize, ExportError> {
    let rows = window_rows(scenarios, limit);
    let mut csv_writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        csv_writer.write_record([
            "mix",
            "clients",
            "total_tpv",
            "multiplier",
            "gross_commission",
            "final_commission",
        ])?;
    }
    for row in &rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(rows.len())
}

pub fn export_scenarios_csv(
    path: impl AsRef<Path>,
    scenarios: &[ScenarioResult],
    limit: usize,
) -> Result<usize, ExportError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| ExportError::Create {
        path: path.display().to_string(),
        source,
    })?;
    write_scenarios_csv(file, scenarios, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commission::OfferTable;
    use crate::optimizer::{search, RankingStrategy, SearchParameters, TierCaps};

    fn scenarios() -> Vec<ScenarioResult> {
        search(
            &OfferTable::reference(),
            &SearchParameters {
                goal_tpv: 300_000.0,
                goal_commission: 1_000.0,
                caps: TierCaps::FORM_DEFAULTS,
                strategy: RankingStrategy::MinimizeTpv,
            },
        )
        .expect("search should run")
    }

    #[test]
    fn csv_has_header_and_best_first() {
        let scenarios = scenarios();
        assert!(scenarios.len() > 3);

        let mut buffer = Vec::new();
        let written = write_scenarios_csv(&mut buffer, &scenarios, 2).expect("csv should write");
        assert_eq!(written, 3);

        let text = String::from_utf8(buffer).expect("csv is utf-8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("mix,clients,total_tpv,multiplier,gross_commission,final_commission")
        );
        assert_eq!(lines.count(), 3);

        let mut reader = csv::Reader::from_reader(text.as_bytes());
        let first = reader
            .records()
            .next()
            .expect("first row")
            .expect("valid row");
        let tpv: f64 = first[2].parse().expect("numeric tpv");
        assert_eq!(tpv, scenarios[0].total_tpv);
    }

    #[test]
    fn empty_result_still_writes_header() {
        let mut buffer = Vec::new();
        let written = write_scenarios_csv(&mut buffer, &[], 50).expect("csv should write");
        assert_eq!(written, 0);
        let text = String::from_utf8(buffer).expect("csv is utf-8");
        assert_eq!(
            text.trim_end(),
            "mix,clients,total_tpv,multiplier,gross_commission,final_commission"
        );
    }
}

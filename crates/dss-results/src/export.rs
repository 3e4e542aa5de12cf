//! Single-series extraction and CSV export.

use crate::types::StepRecord;
use crate::{ResultsError, ResultsResult};
use chrono::NaiveDateTime;
use std::io::Write;

/// `(time, value)` points of one recorded key.
pub fn extract_series(
    run_id: &str,
    records: &[StepRecord],
    key: &str,
) -> ResultsResult<Vec<(NaiveDateTime, f64)>> {
    let series: Vec<_> = records
        .iter()
        .filter_map(|r| r.get(key).map(|v| (r.time, v)))
        .collect();
    if series.is_empty() && !records.is_empty() {
        return Err(ResultsError::SeriesNotFound {
            key: key.to_string(),
            run_id: run_id.to_string(),
        });
    }
    Ok(series)
}

/// Write `time,<key>` rows.
pub fn write_series_csv<W: Write>(
    writer: W,
    key: &str,
    series: &[(NaiveDateTime, f64)],
) -> ResultsResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["time", key])?;
    for (time, value) in series {
        wtr.write_record([
            time.format("%Y-%m-%dT%H:%M:%S").to_string(),
            value.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

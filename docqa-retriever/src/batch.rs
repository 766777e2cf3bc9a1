//! Answering a CSV file of questions

use crate::assistant::Assistant;
use crate::config::BatchConfig;
use crate::error::{BatchError, Result};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

pub const SKIPPED_QUESTION_MESSAGE: &str = "Skipped empty question.";

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub rows: usize,
    pub answered: usize,
    pub skipped: usize,
}

/// Find `name` among `headers`, ignoring surrounding whitespace and case.
pub fn find_column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| header.trim().eq_ignore_ascii_case(name.trim()))
}

/// Answer every question in `input` and write the table, plus a response column,
/// to `output`.
///
/// Rows keep their input order. The question column is located before any row
/// is processed; if it is missing nothing is written. An existing response
/// column is overwritten.
pub async fn answer_csv(
    assistant: &Assistant,
    input: &Path,
    output: &Path,
    config: &BatchConfig,
) -> Result<BatchSummary> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(input)
        .map_err(BatchError::from)?;
    let headers = reader.headers().map_err(BatchError::from)?.clone();

    let question_idx =
        find_column(&headers, &config.question_column).ok_or_else(|| BatchError::MissingColumn {
            column: config.question_column.clone(),
        })?;
    let response_idx = find_column(&headers, &config.response_column);

    let records = reader
        .records()
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(BatchError::from)?;
    info!("Answering {} questions from {}", records.len(), input.display());

    let mut summary = BatchSummary {
        rows: records.len(),
        answered: 0,
        skipped: 0,
    };
    let mut responses = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let question = record.get(question_idx).unwrap_or("").trim();
        if question.is_empty() {
            info!("Skipping empty question at row {}", i + 1);
            responses.push(SKIPPED_QUESTION_MESSAGE.to_string());
            summary.skipped += 1;
            continue;
        }
        info!("Processing question {}/{}", i + 1, records.len());
        responses.push(assistant.ask(question).await.text);
        summary.answered += 1;
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(output).map_err(BatchError::from)?;

    let mut out_headers = headers.clone();
    if response_idx.is_none() {
        out_headers.push_field(&config.response_column);
    }
    writer.write_record(&out_headers).map_err(BatchError::from)?;

    // Rows are written at header width; fields past the last header have no column
    let overlong = records.iter().filter(|r| r.len() > headers.len()).count();
    if overlong > 0 {
        warn!(
            "Dropping fields beyond the {} header columns in {} rows",
            headers.len(),
            overlong
        );
    }
    for (record, response) in records.iter().zip(&responses) {
        let mut row: csv::StringRecord = (0..headers.len())
            .map(|i| match response_idx {
                Some(idx) if i == idx => response.as_str(),
                _ => record.get(i).unwrap_or(""),
            })
            .collect();
        if response_idx.is_none() {
            row.push_field(response);
        }
        writer.write_record(&row).map_err(BatchError::from)?;
    }
    writer.flush()?;

    info!("Wrote {} answers to {}", responses.len(), output.display());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_column_is_lenient() {
        let headers = csv::StringRecord::from(vec!["id", "  QUESTIONS ", "notes"]);
        assert_eq!(find_column(&headers, "Questions"), Some(1));
        assert_eq!(find_column(&headers, "answers"), None);
    }
}

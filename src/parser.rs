//! CSV parsers for submission exports and classified assignment sheets.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::borrow::Cow;
use std::io::Read;
use tracing::warn;

use crate::analyzers::types::{ClassifiedSheet, ClassifiedSubmission, SubmissionRecord, SubmissionRow, Tier};
use crate::error::EngineError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Prefix identifying the flag column of an assignment sheet.
pub const FLAG_HEADER_PREFIX: &str = "Flag";
/// Header of the tier column written next to the flag.
pub const TIER_HEADER: &str = "Tier";

/// Returns `bytes` unchanged, or gunzipped when they start with the gzip magic.
pub fn decompress(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(Cow::Borrowed(bytes));
    }
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut out)
        .context("failed to decompress gzip input")?;
    Ok(Cow::Owned(out))
}

/// Decodes a submissions CSV into records. Extra columns are ignored.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CSV or a row cannot be read.
pub fn parse_submissions(bytes: &[u8]) -> Result<Vec<SubmissionRecord>> {
    let bytes = decompress(bytes)?;
    let mut rdr = csv::Reader::from_reader(bytes.as_ref());
    let mut records = Vec::new();

    for (i, result) in rdr.deserialize().enumerate() {
        let row: SubmissionRow = result.with_context(|| format!("invalid submission row {}", i + 1))?;
        records.push(SubmissionRecord::from(row));
    }

    Ok(records)
}

/// Decodes a classified assignment sheet.
///
/// The flag column is the first header starting with `Flag`; its full text is
/// kept as the sheet's rule label.
///
/// # Errors
///
/// [`EngineError::MissingFlagColumn`] when no such header exists, or a CSV error.
pub fn parse_sheet(bytes: &[u8]) -> Result<ClassifiedSheet> {
    let bytes = decompress(bytes)?;
    let mut rdr = csv::Reader::from_reader(bytes.as_ref());
    let headers = rdr.headers()?.clone();

    let (flag_idx, label) = headers
        .iter()
        .enumerate()
        .find(|(_, h)| h.starts_with(FLAG_HEADER_PREFIX))
        .map(|(i, h)| (i, h.to_string()))
        .ok_or(EngineError::MissingFlagColumn)?;
    let tier_idx = headers.iter().position(|h| h == TIER_HEADER);

    let mut rows = Vec::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        let row: SubmissionRow = record
            .deserialize(Some(&headers))
            .with_context(|| format!("invalid sheet row {}", i + 1))?;

        let cell = record.get(flag_idx).unwrap_or_default().trim();
        let flag = if cell.is_empty() {
            0.0
        } else {
            cell.parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .unwrap_or_else(|| {
                    warn!(row = i + 1, value = cell, "Unreadable flag, counting as 0");
                    0.0
                })
        };
        let tier = tier_idx.and_then(|t| record.get(t)).and_then(Tier::parse);

        rows.push(ClassifiedSubmission {
            record: SubmissionRecord::from(row),
            flag,
            tier,
        });
    }

    Ok(ClassifiedSheet {
        flag_header_label: label,
        rows,
    })
}

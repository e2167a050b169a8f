use std::borrow::Cow;

use encoding_rs::WINDOWS_1252;
use holdings_model::Value;

use crate::normalize::RawGrid;
use crate::IngestError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Parse CSV bytes whose first `preamble_lines` physical lines are free-form text and whose next
/// non-blank record is the header.
pub(crate) fn parse_csv(bytes: &[u8], preamble_lines: usize) -> Result<RawGrid, IngestError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let body = skip_lines(bytes, preamble_lines).ok_or_else(|| {
        IngestError::malformed(format!(
            "expected at least {} lines, found fewer",
            preamble_lines + 1
        ))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body);

    let mut header: Option<Vec<String>> = None;
    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    let mut row_no = preamble_lines as u64;
    loop {
        match reader.read_byte_record(&mut record) {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => return Err(map_csv_error(err, row_no + 1)),
        }
        row_no += 1;

        match header {
            None => {
                if record.iter().all(|field| field.is_empty()) {
                    continue;
                }
                header = Some(
                    record
                        .iter()
                        .map(|f| decode_field(f).into_owned())
                        .collect(),
                );
            }
            Some(_) => rows.push(
                record
                    .iter()
                    .map(|field| {
                        if field.is_empty() {
                            Value::Missing
                        } else {
                            Value::Text(decode_field(field).into_owned())
                        }
                    })
                    .collect(),
            ),
        }
    }

    let header = header.ok_or_else(|| {
        IngestError::malformed(format!("no header row after {preamble_lines} preamble lines"))
    })?;
    log::debug!("parsed csv: {} columns, {} rows", header.len(), rows.len());
    Ok(RawGrid { header, rows })
}

/// The remainder after `n` newline-terminated lines, or `None` if the input has fewer than
/// `n + 1` lines.
fn skip_lines(bytes: &[u8], n: usize) -> Option<&[u8]> {
    let mut rest = bytes;
    for _ in 0..n {
        let pos = rest.iter().position(|b| *b == b'\n')?;
        rest = &rest[pos + 1..];
    }
    if rest.is_empty() {
        return None;
    }
    Some(rest)
}

/// UTF-8 when valid, Windows-1252 otherwise (the usual encoding of Excel-exported CSVs).
fn decode_field(field: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(field) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            let (cow, _, _) = WINDOWS_1252.decode(field);
            cow
        }
    }
}

fn map_csv_error(err: csv::Error, fallback_row: u64) -> IngestError {
    let row = err
        .position()
        .map(|p| p.line())
        .filter(|line| *line > 0)
        .unwrap_or(fallback_row);
    IngestError::malformed(format!("csv error near record {row}: {err}"))
}

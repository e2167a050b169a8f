//! Reading the holdings sheet out of an (already decrypted) OOXML workbook.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, XlsxError};
use holdings_model::Value;

use crate::normalize::RawGrid;
use crate::IngestError;

pub(crate) type Workbook<'a> = Xlsx<Cursor<&'a [u8]>>;

/// Open a workbook from memory without any password handling.
pub(crate) fn open(bytes: &[u8]) -> Result<Workbook<'_>, XlsxError> {
    Xlsx::new(Cursor::new(bytes))
}

/// Read `sheet` (matched case-sensitively), skipping `preamble_rows` absolute rows. The next
/// row is the header.
pub(crate) fn read_sheet(
    workbook: &mut Workbook<'_>,
    sheet: &str,
    preamble_rows: u32,
) -> Result<RawGrid, IngestError> {
    let names = workbook.sheet_names();
    if !names.iter().any(|name| name == sheet) {
        log::debug!("sheet `{sheet}` not found among {} sheets", names.len());
        return Err(IngestError::MissingSheet {
            sheet: sheet.to_string(),
        });
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|err| {
            IngestError::malformed(format!("failed to read sheet `{sheet}`: {err}"))
        })?;

    let (Some((_, start_col)), Some((end_row, end_col))) = (range.start(), range.end()) else {
        return Err(IngestError::malformed(format!("sheet `{sheet}` is empty")));
    };
    if end_row < preamble_rows {
        return Err(IngestError::malformed(format!(
            "sheet `{sheet}` has {} rows, expected at least {}",
            end_row + 1,
            preamble_rows + 1
        )));
    }

    let header_row = preamble_rows;
    let header = (start_col..=end_col)
        .map(|col| {
            let cell = range.get_value((header_row, col)).map(cell_value);
            match cell {
                Some(Value::Text(s)) => s,
                Some(value) => value.to_string(),
                None => String::new(),
            }
        })
        .collect();

    let rows = (header_row + 1..=end_row)
        .map(|row| {
            (start_col..=end_col)
                .map(|col| {
                    range
                        .get_value((row, col))
                        .map(cell_value)
                        .unwrap_or(Value::Missing)
                })
                .collect()
        })
        .collect::<Vec<Vec<Value>>>();

    log::debug!(
        "read sheet `{sheet}`: {} columns, {} rows",
        end_col - start_col + 1,
        rows.len()
    );
    Ok(RawGrid { header, rows })
}

fn cell_value(data: &Data) -> Value {
    match data {
        Data::Empty | Data::Error(_) => Value::Missing,
        Data::Int(v) => Value::Number(*v as f64),
        Data::Float(v) => Value::Number(*v),
        Data::String(v) => Value::Text(v.clone()),
        Data::Bool(v) => Value::Text(if *v { "TRUE" } else { "FALSE" }.to_string()),
        Data::DateTime(v) => Value::Number(v.as_f64()),
        Data::DateTimeIso(v) | Data::DurationIso(v) => Value::Text(v.clone()),
    }
}

use std::collections::{HashMap, HashSet};

use holdings_model::{NormalizedTable, Value};

use crate::IngestError;

/// Header row plus data rows as read from the source, before cleanup.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct RawGrid {
    pub(crate) header: Vec<String>,
    pub(crate) rows: Vec<Vec<Value>>,
}

/// Trim and de-duplicate column names, fit every row to the header width, and drop rows that
/// carry no values at all.
pub(crate) fn normalize(raw: RawGrid) -> Result<NormalizedTable, IngestError> {
    let columns = column_names(&raw.header);
    let width = columns.len();

    let mut truncated = 0usize;
    let mut dropped = 0usize;
    let mut rows = Vec::with_capacity(raw.rows.len());
    for mut row in raw.rows {
        if row.iter().all(Value::is_missing) {
            dropped += 1;
            continue;
        }
        if row.len() > width {
            truncated += 1;
        }
        row.resize(width, Value::Missing);
        rows.push(row);
    }
    if dropped > 0 {
        log::debug!("dropped {dropped} empty rows");
    }
    if truncated > 0 {
        log::debug!("truncated {truncated} rows wider than the header ({width} columns)");
    }

    NormalizedTable::new(columns, rows).map_err(|err| IngestError::malformed(err.to_string()))
}

fn column_names(header: &[String]) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::with_capacity(header.len());
    let mut next_suffix: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(header.len());

    for (idx, raw) in header.iter().enumerate() {
        let trimmed = raw.trim();
        let base = if trimmed.is_empty() {
            format!("Column{}", idx + 1)
        } else {
            trimmed.to_string()
        };

        let mut name = base.clone();
        if taken.contains(&name) {
            let suffix = next_suffix.entry(base.clone()).or_insert(1);
            loop {
                name = format!("{base}.{suffix}");
                *suffix += 1;
                if !taken.contains(&name) {
                    break;
                }
            }
        }
        taken.insert(name.clone());
        out.push(name);
    }
    out
}

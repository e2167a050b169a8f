use std::io::Write;

use thiserror::Error;

use crate::{NormalizedTable, Position};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Write the table as comma-separated text: header row first, missing values as empty fields.
pub fn write_table_csv<W: Write>(table: &NormalizedTable, writer: W) -> Result<(), ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(table.columns())?;
    for row in table.rows() {
        out.write_record(row.values().iter().map(|v| v.to_string()))?;
    }
    out.flush()?;
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write derived positions with the columns `name,quantity,avg_cost,ltp,profit_loss`.
pub fn write_positions_csv<W: Write>(positions: &[Position], writer: W) -> Result<(), ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(["name", "quantity", "avg_cost", "ltp", "profit_loss"])?;
    for p in positions {
        out.write_record([
            p.name.clone(),
            optional(p.quantity),
            optional(p.avg_cost),
            p.ltp.to_string(),
            optional(p.profit_loss),
        ])?;
    }
    out.flush()?;
    Ok(())
}

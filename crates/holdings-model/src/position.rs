use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{NormalizedTable, Value};

/// Names of the four columns a position is built from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMap {
    pub name: String,
    pub quantity: String,
    pub avg_cost: String,
    pub ltp: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            name: "Company Name".to_string(),
            quantity: "Total Quantity".to_string(),
            avg_cost: "Avg Trading Price".to_string(),
            ltp: "LTP".to_string(),
        }
    }
}

impl ColumnMap {
    /// Column names in the order they are reported when absent.
    fn in_order(&self) -> [&str; 4] {
        [
            self.name.as_str(),
            self.quantity.as_str(),
            self.avg_cost.as_str(),
            self.ltp.as_str(),
        ]
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeriveError {
    #[error("missing required columns: {}", .missing.join(", "))]
    MissingColumns { missing: Vec<String> },
}

/// One holding with a positive last traded price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub name: String,
    pub quantity: Option<f64>,
    pub avg_cost: Option<f64>,
    pub ltp: f64,
    /// `(ltp - avg_cost) * quantity`, missing when either input is missing.
    pub profit_loss: Option<f64>,
}

impl Position {
    pub fn new(
        name: impl Into<String>,
        quantity: Option<f64>,
        avg_cost: Option<f64>,
        ltp: f64,
    ) -> Self {
        let profit_loss = match (quantity, avg_cost) {
            (Some(qty), Some(cost)) => Some((ltp - cost) * qty),
            _ => None,
        };
        Self {
            name: name.into(),
            quantity,
            avg_cost,
            ltp,
            profit_loss,
        }
    }

    /// `avg_cost * quantity`.
    pub fn invested(&self) -> Option<f64> {
        Some(self.avg_cost? * self.quantity?)
    }

    /// `ltp * quantity`.
    pub fn market_value(&self) -> Option<f64> {
        Some(self.ltp * self.quantity?)
    }
}

fn display_name(value: &Value) -> String {
    match value {
        Value::Text(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Derive positions from a table.
///
/// All four mapped columns must exist (exact, case-sensitive). Numeric fields that do not parse
/// become `None` for that row only; rows whose LTP is missing or not strictly positive are
/// dropped.
pub fn derive(table: &NormalizedTable, columns: &ColumnMap) -> Result<Vec<Position>, DeriveError> {
    let missing: Vec<String> = columns
        .in_order()
        .into_iter()
        .filter(|name| !table.has_column(name))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(DeriveError::MissingColumns { missing });
    }

    let number = |row: &crate::Row<'_>, column: &str| row.get(column).and_then(Value::as_number);

    let positions: Vec<Position> = table
        .rows()
        .filter_map(|row| {
            let ltp = number(&row, columns.ltp.as_str()).filter(|ltp| *ltp > 0.0)?;
            let name = row
                .get(&columns.name)
                .map(display_name)
                .unwrap_or_default();
            Some(Position::new(
                name,
                number(&row, columns.quantity.as_str()),
                number(&row, columns.avg_cost.as_str()),
                ltp,
            ))
        })
        .collect();

    debug!(
        "derived {} positions from {} rows ({} excluded)",
        positions.len(),
        table.len(),
        table.len() - positions.len()
    );
    Ok(positions)
}

use std::fmt;

use holdings_model::{PortfolioSummary, Position};
use serde::Serialize;

/// Machine-readable report printed by `--format json`.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub file: &'a str,
    pub columns: &'a [String],
    pub rows: usize,
    pub positions: &'a [Position],
    pub summary: &'a PortfolioSummary,
}

/// Human-readable report: one line per position, then the totals.
pub struct TextReport<'a> {
    pub file: &'a str,
    pub rows: usize,
    pub positions: &'a [Position],
    pub summary: &'a PortfolioSummary,
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Holdings: {} ({} rows, {} positions)",
            self.file,
            self.rows,
            self.positions.len()
        )?;
        writeln!(f)?;

        if self.positions.is_empty() {
            writeln!(f, "No positions with a positive LTP.")?;
        } else {
            let name_width = self
                .positions
                .iter()
                .map(|p| p.name.chars().count())
                .chain(std::iter::once("Name".len()))
                .max()
                .unwrap_or_default();
            writeln!(
                f,
                "{:<name_width$}  {:>12}  {:>12}  {:>12}  {:>14}",
                "Name", "Quantity", "Avg Cost", "LTP", "P/L"
            )?;
            for p in self.positions {
                writeln!(
                    f,
                    "{:<name_width$}  {:>12}  {:>12}  {:>12}  {:>14}",
                    p.name,
                    cell(p.quantity),
                    cell(p.avg_cost),
                    cell(Some(p.ltp)),
                    cell(p.profit_loss)
                )?;
            }
        }

        let s = self.summary;
        writeln!(f)?;
        writeln!(f, "Gainers:      {}", s.gainers)?;
        writeln!(f, "Losers:       {}", s.losers)?;
        writeln!(f, "Total profit: {:.2}", s.total_profit)?;
        writeln!(f, "Total loss:   {:.2}", s.total_loss)?;
        writeln!(f, "Net P/L:      {:.2}", s.net_profit_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_report_lists_positions_then_totals() {
        let positions = vec![
            Position::new("Acme", Some(10.0), Some(100.0), 120.0),
            Position::new("Globex", None, Some(50.0), 40.0),
        ];
        let summary = PortfolioSummary::from_positions(&positions);
        let text = TextReport {
            file: "holdings.csv",
            rows: 3,
            positions: &positions,
            summary: &summary,
        }
        .to_string();

        assert!(text.starts_with("Holdings: holdings.csv (3 rows, 2 positions)\n"));
        let acme = text.lines().find(|l| l.starts_with("Acme")).unwrap();
        assert!(acme.ends_with("200.00"), "{acme}");
        let globex = text.lines().find(|l| l.starts_with("Globex")).unwrap();
        assert!(globex.ends_with('-'), "{globex}");
        assert!(text.contains("Total profit: 200.00\n"));
        assert!(text.ends_with("Net P/L:      200.00\n"));
    }

    #[test]
    fn json_report_shape() {
        let positions = vec![Position::new("Acme", Some(10.0), Some(100.0), 120.0)];
        let summary = PortfolioSummary::from_positions(&positions);
        let columns = vec!["Company Name".to_string()];
        let json = serde_json::to_value(JsonReport {
            file: "h.csv",
            columns: &columns,
            rows: 1,
            positions: &positions,
            summary: &summary,
        })
        .unwrap();

        assert_eq!(json["positions"][0]["profit_loss"], 200.0);
        assert_eq!(json["summary"]["total_profit"], 200.0);
        assert_eq!(json["columns"][0], "Company Name");
    }
}

//! Profit/loss aggregation over derived positions.
//!
//! Everything here is a pure function of the position slice and is recomputed on every call.

use serde::Serialize;

use crate::Position;

/// Sum of positive profit/loss values.
pub fn total_profit(positions: &[Position]) -> f64 {
    positions
        .iter()
        .filter_map(|p| p.profit_loss)
        .filter(|pl| *pl > 0.0)
        .sum()
}

/// Sum of negative profit/loss values (a number `<= 0`).
pub fn total_loss(positions: &[Position]) -> f64 {
    positions
        .iter()
        .filter_map(|p| p.profit_loss)
        .filter(|pl| *pl < 0.0)
        .sum()
}

pub fn net_profit_loss(positions: &[Position]) -> f64 {
    total_profit(positions) + total_loss(positions)
}

fn sorted_by_magnitude<'a>(
    positions: &'a [Position],
    keep: impl Fn(f64) -> bool,
) -> Vec<&'a Position> {
    let mut out: Vec<&Position> = positions
        .iter()
        .filter(|p| p.profit_loss.is_some_and(&keep))
        .collect();
    out.sort_by(|a, b| {
        let a = a.profit_loss.unwrap_or_default().abs();
        let b = b.profit_loss.unwrap_or_default().abs();
        b.total_cmp(&a)
    });
    out
}

/// Positions with a positive profit/loss, largest first.
pub fn gainers(positions: &[Position]) -> Vec<&Position> {
    sorted_by_magnitude(positions, |pl| pl > 0.0)
}

/// Positions with a negative profit/loss, largest loss first.
pub fn losers(positions: &[Position]) -> Vec<&Position> {
    sorted_by_magnitude(positions, |pl| pl < 0.0)
}

/// Snapshot of the portfolio-level figures.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub positions: usize,
    pub gainers: usize,
    pub losers: usize,
    pub total_profit: f64,
    pub total_loss: f64,
    pub net_profit_loss: f64,
    /// Sum of `avg_cost * quantity` over positions where both are known.
    pub total_invested: f64,
    /// Sum of `ltp * quantity` over positions where quantity is known.
    pub total_market_value: f64,
}

impl PortfolioSummary {
    pub fn from_positions(positions: &[Position]) -> Self {
        let total_profit = total_profit(positions);
        let total_loss = total_loss(positions);
        Self {
            positions: positions.len(),
            gainers: positions
                .iter()
                .filter(|p| p.profit_loss.is_some_and(|pl| pl > 0.0))
                .count(),
            losers: positions
                .iter()
                .filter(|p| p.profit_loss.is_some_and(|pl| pl < 0.0))
                .count(),
            total_profit,
            total_loss,
            net_profit_loss: total_profit + total_loss,
            total_invested: positions.iter().filter_map(Position::invested).sum(),
            total_market_value: positions.iter().filter_map(Position::market_value).sum(),
        }
    }
}

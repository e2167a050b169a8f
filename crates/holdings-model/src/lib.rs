//! In-memory holdings model: the normalized table produced by ingestion, positions derived from
//! it, and the profit/loss aggregates shown to the user.

mod export;
mod position;
mod summary;
mod table;
mod value;

pub use export::{write_positions_csv, write_table_csv, ExportError};
pub use position::{derive, ColumnMap, DeriveError, Position};
pub use summary::{gainers, losers, net_profit_loss, total_loss, total_profit, PortfolioSummary};
pub use table::{NormalizedTable, Row, TableError};
pub use value::Value;

//! Holdings ingestion: turns an uploaded CSV or XLSX file (optionally password-protected) into a
//! [`NormalizedTable`].
//!
//! Both formats carry a free-form preamble of [`PREAMBLE_ROWS`] rows before the header row.
//! Workbooks must contain a sheet named [`EQUITY_SHEET`].

mod cache;
mod credential;
mod csv_source;
mod error;
mod format;
mod normalize;
mod pipeline;
mod upload;
mod workbook;

pub use cache::{CacheKey, IngestCache};
pub use credential::Credential;
pub use error::{DecryptionFailure, IngestError, IngestErrorKind};
pub use format::SourceFormat;
pub use pipeline::{ingest, Decryptor, OfficeDecryptor, Pipeline};
pub use upload::RawUpload;

pub use holdings_model::{NormalizedTable, Value};
pub use holdings_offcrypto::DecryptError;

/// Number of free-form rows (CSV lines, sheet rows) ahead of the header row.
pub const PREAMBLE_ROWS: usize = 7;

/// The only sheet read from a workbook. Matched case-sensitively.
pub const EQUITY_SHEET: &str = "Equity";

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use holdings_io::{Credential, IngestError, Pipeline, RawUpload};
use holdings_model::{derive, write_positions_csv, write_table_csv, ColumnMap, PortfolioSummary};

use crate::logging::init_tracing;
use crate::report::{JsonReport, TextReport};

/// Exit status when the file needs a (different) password. Wrappers re-prompt on this code.
pub const EXIT_PASSWORD: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "holdings",
    about = "Read a broker holdings export (CSV or XLSX, optionally password-protected) and report profit/loss per position."
)]
pub struct Args {
    /// Holdings file (`.csv`, `.xlsx` or `.xlsm`).
    pub file: PathBuf,

    /// Password for an encrypted workbook.
    #[arg(long)]
    pub password: Option<String>,

    /// Read the password from a file (trailing newlines are trimmed).
    #[arg(long, value_name = "PATH", conflicts_with = "password")]
    pub password_file: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Column holding the instrument name.
    #[arg(long, value_name = "COLUMN")]
    pub name_column: Option<String>,

    /// Column holding the held quantity.
    #[arg(long, value_name = "COLUMN")]
    pub quantity_column: Option<String>,

    /// Column holding the average acquisition price.
    #[arg(long, value_name = "COLUMN")]
    pub avg_cost_column: Option<String>,

    /// Column holding the last traded price.
    #[arg(long, value_name = "COLUMN")]
    pub ltp_column: Option<String>,

    /// Write the normalized table as CSV to this path.
    #[arg(long, value_name = "PATH")]
    pub export_table: Option<PathBuf>,

    /// Write the derived positions as CSV to this path.
    #[arg(long, value_name = "PATH")]
    pub export_positions: Option<PathBuf>,
}

impl Args {
    fn column_map(&self) -> ColumnMap {
        let mut columns = ColumnMap::default();
        let overrides = [
            (&mut columns.name, &self.name_column),
            (&mut columns.quantity, &self.quantity_column),
            (&mut columns.avg_cost, &self.avg_cost_column),
            (&mut columns.ltp, &self.ltp_column),
        ];
        for (slot, value) in overrides {
            if let Some(value) = value {
                *slot = value.clone();
            }
        }
        columns
    }

    fn password(&self) -> Result<Option<String>> {
        if let Some(path) = self.password_file.as_deref() {
            let value = std::fs::read_to_string(path)
                .with_context(|| format!("read password file {}", path.display()))?;
            return Ok(Some(value.trim_end_matches(&['\r', '\n'][..]).to_string()));
        }
        Ok(self.password.clone())
    }
}

/// Parse arguments, run, and map the outcome to a process exit code.
pub fn run() -> ExitCode {
    let args = Args::parse();
    init_tracing();
    match run_with_args(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// `2` when re-prompting for a password could help, `1` otherwise.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<IngestError>() {
        Some(ingest) if ingest.kind().needs_password() => EXIT_PASSWORD,
        _ => 1,
    }
}

pub fn run_with_args(args: &Args) -> Result<()> {
    let upload = RawUpload::from_path(&args.file)
        .with_context(|| format!("read {}", args.file.display()))?;
    let password = args.password()?;

    let table = Pipeline::new()
        .ingest(&upload, move || password.map(Credential::new))
        .with_context(|| format!("ingest {}", args.file.display()))?;

    if let Some(path) = &args.export_table {
        write_table_csv(&table, create(path)?)
            .with_context(|| format!("export table to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote normalized table");
    }

    let positions = derive(&table, &args.column_map())?;
    let summary = PortfolioSummary::from_positions(&positions);

    if let Some(path) = &args.export_positions {
        write_positions_csv(&positions, create(path)?)
            .with_context(|| format!("export positions to {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote positions");
    }

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    let written = match args.format {
        OutputFormat::Text => write!(
            handle,
            "{}",
            TextReport {
                file: upload.filename(),
                rows: table.len(),
                positions: &positions,
                summary: &summary,
            }
        ),
        OutputFormat::Json => serde_json::to_writer(
            &mut handle,
            &JsonReport {
                file: upload.filename(),
                columns: table.columns(),
                rows: table.len(),
                positions: &positions,
                summary: &summary,
            },
        )
        .map_err(std::io::Error::from)
        .and_then(|()| handle.write_all(b"\n")),
    };
    ignore_broken_pipe(written.and_then(|()| handle.flush()))?;
    Ok(())
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .with_context(|| format!("create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

/// A reader that goes away early (`holdings ... | head`) is not an error.
fn ignore_broken_pipe(result: std::io::Result<()>) -> std::io::Result<()> {
    match result {
        Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

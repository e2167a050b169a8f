mod common;

use common::{
    csv_bytes, encrypt, holdings_grid, preamble, xlsx_bytes, CountingDecryptor, PASSWORD,
};
use holdings_io::{
    ingest, Credential, DecryptError, DecryptionFailure, Decryptor, IngestError, IngestErrorKind,
    Pipeline, RawUpload, Value,
};
use holdings_model::{derive, total_profit, ColumnMap};
use pretty_assertions::assert_eq;

const COLUMNS: [&str; 4] = ["Company Name", "Total Quantity", "Avg Trading Price", "LTP"];

fn no_password() -> Option<Credential> {
    None
}

fn sample_rows() -> Vec<[&'static str; 4]> {
    vec![
        ["Acme", "10", "100", "120"],
        ["Globex", "5", "50", "40"],
        ["Initech", "3", "20", "0"],
    ]
}

fn equity_xlsx() -> Vec<u8> {
    xlsx_bytes(&[("Equity", holdings_grid(&sample_rows()))])
}

#[test]
fn csv_header_is_line_eight_trimmed() {
    let upload = RawUpload::new("holdings.csv", csv_bytes(&holdings_grid(&sample_rows())));
    let table = ingest(&upload, no_password).unwrap();

    assert_eq!(table.columns(), COLUMNS);
    assert_eq!(table.len(), 3);
    assert_eq!(
        table.row(0).unwrap().get("Company Name"),
        Some(&Value::from("Acme"))
    );
}

#[test]
fn csv_acme_example_reaches_total_profit() {
    let upload = RawUpload::new(
        "HOLDINGS.CSV",
        csv_bytes(&holdings_grid(&[["Acme", "10", "100", "120"]])),
    );
    let table = ingest(&upload, no_password).unwrap();
    let positions = derive(&table, &ColumnMap::default()).unwrap();
    assert_eq!(format!("{:.2}", positions[0].profit_loss.unwrap()), "200.00");
    assert_eq!(total_profit(&positions), 200.0);
}

#[test]
fn csv_with_only_preamble_is_malformed() {
    let upload = RawUpload::new("holdings.csv", csv_bytes(&preamble()));
    let err = ingest(&upload, no_password).unwrap_err();
    assert_eq!(err.kind(), IngestErrorKind::EmptyOrMalformed);
}

#[test]
fn unsupported_extension_is_rejected_before_parsing() {
    let upload = RawUpload::new("holdings.xls", equity_xlsx());
    let err = ingest(&upload, || panic!("no password for unsupported files")).unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedFormat { ref extension } if extension == "xls"));
}

#[test]
fn xlsx_cells_keep_their_types() {
    let upload = RawUpload::new("holdings.xlsx", equity_xlsx());
    let table = ingest(&upload, no_password).unwrap();

    assert_eq!(table.columns(), COLUMNS);
    let first = table.row(0).unwrap();
    assert_eq!(first.get("Company Name"), Some(&Value::from("Acme")));
    assert_eq!(first.get("Total Quantity"), Some(&Value::Number(10.0)));
    assert_eq!(first.get("LTP"), Some(&Value::Number(120.0)));
}

#[test]
fn xlsx_and_csv_derive_the_same_positions() {
    let csv = ingest(
        &RawUpload::new("h.csv", csv_bytes(&holdings_grid(&sample_rows()))),
        no_password,
    )
    .unwrap();
    let xlsx = ingest(&RawUpload::new("h.xlsx", equity_xlsx()), no_password).unwrap();

    let columns = ColumnMap::default();
    assert_eq!(
        derive(&csv, &columns).unwrap(),
        derive(&xlsx, &columns).unwrap()
    );
}

#[test]
fn xlsm_is_read_like_xlsx() {
    let upload = RawUpload::new("holdings.xlsm", equity_xlsx());
    assert_eq!(ingest(&upload, no_password).unwrap().len(), 3);
}

#[test]
fn missing_equity_sheet_is_reported() {
    let grid = holdings_grid(&sample_rows());
    for name in ["Holdings", "equity", "Equity "] {
        let upload = RawUpload::new("holdings.xlsx", xlsx_bytes(&[(name, grid.clone())]));
        let err = ingest(&upload, no_password).unwrap_err();
        assert_eq!(err.kind(), IngestErrorKind::MissingSheet, "sheet {name:?}");
    }
}

#[test]
fn equity_is_found_among_other_sheets() {
    let upload = RawUpload::new(
        "holdings.xlsx",
        xlsx_bytes(&[
            ("Summary", preamble()),
            ("Equity", holdings_grid(&sample_rows())),
        ]),
    );
    assert_eq!(ingest(&upload, no_password).unwrap().len(), 3);
}

#[test]
fn short_sheet_is_malformed() {
    let upload = RawUpload::new("holdings.xlsx", xlsx_bytes(&[("Equity", preamble())]));
    let err = ingest(&upload, no_password).unwrap_err();
    assert_eq!(err.kind(), IngestErrorKind::EmptyOrMalformed);
}

#[test]
fn non_workbook_bytes_are_malformed_not_encrypted() {
    let upload = RawUpload::new(
        "holdings.xlsx",
        csv_bytes(&holdings_grid(&sample_rows())),
    );
    let err = ingest(&upload, || panic!("plain garbage never asks for a password")).unwrap_err();
    assert_eq!(err.kind(), IngestErrorKind::EmptyOrMalformed);
}

#[test]
fn encrypted_without_password_requires_one() {
    let upload = RawUpload::new("holdings.xlsx", encrypt(&equity_xlsx(), PASSWORD));
    let decryptor = CountingDecryptor::default();
    let err = Pipeline::with_decryptor(&decryptor)
        .ingest(&upload, no_password)
        .unwrap_err();

    assert!(matches!(
        err,
        IngestError::DecryptionFailed(DecryptionFailure::PasswordRequired)
    ));
    assert_eq!(decryptor.calls(), 0);
}

#[test]
fn encrypted_with_correct_password_matches_plain_file() {
    let plain = ingest(&RawUpload::new("holdings.xlsx", equity_xlsx()), no_password).unwrap();

    let upload = RawUpload::new("holdings.xlsx", encrypt(&equity_xlsx(), PASSWORD));
    let decryptor = CountingDecryptor::default();
    let table = Pipeline::with_decryptor(&decryptor)
        .ingest(&upload, || Some(Credential::new(PASSWORD)))
        .unwrap();

    assert_eq!(table, plain);
    assert_eq!(decryptor.calls(), 1);
}

#[test]
fn wrong_and_empty_passwords_are_distinguished() {
    let upload = RawUpload::new("holdings.xlsx", encrypt(&equity_xlsx(), PASSWORD));

    let err = ingest(&upload, || Some(Credential::new("guess"))).unwrap_err();
    assert_eq!(err.kind(), IngestErrorKind::WrongPassword);

    let err = ingest(&upload, || Some(Credential::new(""))).unwrap_err();
    assert_eq!(err.kind(), IngestErrorKind::MissingPassword);
}

/// Hands the container back unchanged, as if decryption produced another encrypted file.
struct Echo;

impl Decryptor for Echo {
    fn decrypt(&self, container: &[u8], _: &Credential) -> Result<Vec<u8>, DecryptError> {
        Ok(container.to_vec())
    }
}

#[test]
fn still_encrypted_after_decryption_is_malformed() {
    let upload = RawUpload::new("holdings.xlsx", encrypt(&equity_xlsx(), PASSWORD));
    let err = Pipeline::with_decryptor(Echo)
        .ingest(&upload, || Some(Credential::new(PASSWORD)))
        .unwrap_err();
    assert_eq!(err.kind(), IngestErrorKind::EmptyOrMalformed);
}

#[test]
fn three_attempts_on_one_container() {
    let workbook = xlsx_bytes(&[("Positions", holdings_grid(&sample_rows()))]);
    let upload = RawUpload::new("holdings.xlsx", encrypt(&workbook, PASSWORD));
    let decryptor = CountingDecryptor::default();
    let pipeline = Pipeline::with_decryptor(&decryptor);

    let first = pipeline.ingest(&upload, no_password).unwrap_err();
    assert_eq!(first.kind(), IngestErrorKind::PasswordRequired);
    assert_eq!(decryptor.calls(), 0);

    let second = pipeline
        .ingest(&upload, || Some(Credential::new("wrong")))
        .unwrap_err();
    assert_eq!(second.kind(), IngestErrorKind::WrongPassword);
    assert_eq!(decryptor.calls(), 1);

    let third = pipeline
        .ingest(&upload, || Some(Credential::new(PASSWORD)))
        .unwrap_err();
    assert_eq!(third.kind(), IngestErrorKind::MissingSheet);
    assert_eq!(decryptor.calls(), 2);
}

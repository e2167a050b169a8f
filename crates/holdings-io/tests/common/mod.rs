#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use holdings_io::{Credential, DecryptError, Decryptor, OfficeDecryptor};
use ms_offcrypto_writer::Ecma376AgileWriter;
use rand::{rngs::StdRng, SeedableRng as _};
use zip::write::FileOptions;

pub const PASSWORD: &str = "tr4ding-desk";

pub const HEADER: [&str; 4] = [
    "  Company Name ",
    "Total Quantity ",
    " Avg Trading Price",
    "LTP",
];

/// Seven rows of broker boilerplate, the fourth one blank.
pub fn preamble() -> Vec<Vec<String>> {
    [
        "Holdings statement",
        "Client ID: AB1234",
        "Generated: 2024-03-31",
        "",
        "Segment: Equity",
        "Exchange: NSE",
        "All values in INR",
    ]
    .iter()
    .map(|line| {
        if line.is_empty() {
            Vec::new()
        } else {
            vec![line.to_string()]
        }
    })
    .collect()
}

/// Preamble, then [`HEADER`], then `data`.
pub fn holdings_grid(data: &[[&str; 4]]) -> Vec<Vec<String>> {
    let mut grid = preamble();
    grid.push(HEADER.iter().map(|s| s.to_string()).collect());
    grid.extend(
        data.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect()),
    );
    grid
}

pub fn csv_bytes(grid: &[Vec<String>]) -> Vec<u8> {
    let mut out = String::new();
    for row in grid {
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out.into_bytes()
}

fn column_letter(idx: usize) -> char {
    (b'A' + idx as u8) as char
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn sheet_xml(grid: &[Vec<String>]) -> String {
    let mut rows = String::new();
    for (r, row) in grid.iter().enumerate() {
        let mut cells = String::new();
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            let cell_ref = format!("{}{}", column_letter(c), r + 1);
            if value.trim() == value && value.parse::<f64>().is_ok() {
                cells.push_str(&format!(r#"<c r="{cell_ref}"><v>{value}</v></c>"#));
            } else {
                cells.push_str(&format!(
                    r#"<c r="{cell_ref}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                    escape(value)
                ));
            }
        }
        if !cells.is_empty() {
            rows.push_str(&format!(r#"<row r="{}">{cells}</row>"#, r + 1));
        }
    }
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{rows}</sheetData></worksheet>"#
    )
}

/// A minimal XLSX package with one worksheet per `(name, grid)` pair.
pub fn xlsx_bytes(sheets: &[(&str, Vec<Vec<String>>)]) -> Vec<u8> {
    let mut overrides = String::new();
    let mut sheet_entries = String::new();
    let mut rels = String::new();
    for (idx, (name, _)) in sheets.iter().enumerate() {
        let n = idx + 1;
        overrides.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        sheet_entries.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape(name)
        ));
        rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }

    let content_types = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>{overrides}</Types>"#
    );
    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;
    let workbook = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>{sheet_entries}</sheets></workbook>"#
    );
    let workbook_rels = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
    );

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::<()>::default().compression_method(zip::CompressionMethod::Stored);
    let mut add = |path: &str, body: &str| {
        zip.start_file(path, options).expect("start zip entry");
        zip.write_all(body.as_bytes()).expect("write zip entry");
    };
    add("[Content_Types].xml", &content_types);
    add("_rels/.rels", root_rels);
    add("xl/workbook.xml", &workbook);
    add("xl/_rels/workbook.xml.rels", &workbook_rels);
    for (idx, (_, grid)) in sheets.iter().enumerate() {
        add(&format!("xl/worksheets/sheet{}.xml", idx + 1), &sheet_xml(grid));
    }
    zip.finish().expect("finish zip").into_inner()
}

/// Wrap a plain package in an Agile-encrypted OLE container.
pub fn encrypt(plain: &[u8], password: &str) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    let mut rng = StdRng::from_seed([7u8; 32]);
    let mut agile =
        Ecma376AgileWriter::create(&mut rng, password, &mut cursor).expect("create agile writer");
    agile.write_all(plain).expect("write package");
    agile.finalize().expect("finalize agile writer");
    cursor.into_inner()
}

/// Delegates to [`OfficeDecryptor`] and counts invocations.
#[derive(Default)]
pub struct CountingDecryptor {
    calls: AtomicUsize,
}

impl CountingDecryptor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decryptor for CountingDecryptor {
    fn decrypt(&self, container: &[u8], credential: &Credential) -> Result<Vec<u8>, DecryptError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        OfficeDecryptor.decrypt(container, credential)
    }
}

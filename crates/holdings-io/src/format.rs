use crate::{IngestError, RawUpload};

/// Input format, chosen from the filename extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    /// Office Open XML workbook (`.xlsx`, or macro-enabled `.xlsm`), possibly encrypted.
    Xlsx,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" | "xlsm" => Some(SourceFormat::Xlsx),
            _ => None,
        }
    }

    pub fn detect(upload: &RawUpload) -> Result<Self, IngestError> {
        let ext = upload.extension().unwrap_or_default();
        Self::from_extension(&ext).ok_or(IngestError::UnsupportedFormat { extension: ext })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IngestErrorKind;

    #[test]
    fn detects_by_extension_case_insensitively() {
        let detect = |name: &str| SourceFormat::detect(&RawUpload::new(name, Vec::new()));
        assert_eq!(detect("a.csv").unwrap(), SourceFormat::Csv);
        assert_eq!(detect("a.CSV").unwrap(), SourceFormat::Csv);
        assert_eq!(detect("a.Xlsx").unwrap(), SourceFormat::Xlsx);
        assert_eq!(detect("a.xlsm").unwrap(), SourceFormat::Xlsx);
    }

    #[test]
    fn content_is_not_sniffed() {
        let upload = RawUpload::new("holdings.txt", b"PK\x03\x04".to_vec());
        let err = SourceFormat::detect(&upload).unwrap_err();
        assert_eq!(err.kind(), IngestErrorKind::UnsupportedFormat);
        assert!(err.to_string().contains("`txt`"));

        let err = SourceFormat::detect(&RawUpload::new("holdings", Vec::new())).unwrap_err();
        assert_eq!(err.kind(), IngestErrorKind::UnsupportedFormat);
    }
}

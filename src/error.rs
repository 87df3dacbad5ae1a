//! Error codes and the error type shared by every raw-cell operation

/// Error classification for raw-cell operations
///
/// A load call keeps at most one of these (see `LoadReport::error`), so the
/// codes stay small and `Copy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ErrorCode {
    #[error("unable to open input file")]
    InputFileOpenError,
    #[error("input file read or write failed")]
    InputFileError,
    #[error("truncated record")]
    TruncatedRecord,
    #[error("record longer than the reader limit")]
    RecordTooLong,
    #[error("invalid GDSII file")]
    InvalidFile,
    #[error("missing cell reference")]
    MissingReference,
    #[error("empty cell name")]
    EmptyName,
    #[error("polygon id counter overflow")]
    IdOverflow,
}

impl ErrorCode {
    /// Fatal codes abort a scan; the rest leave a usable result behind
    pub fn is_fatal(self) -> bool {
        !matches!(self, ErrorCode::MissingReference)
    }
}

/// Error carried through `Result` by the library
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} ({code})")]
pub struct GdsError {
    #[source]
    pub code: ErrorCode,
    pub message: String,
}

impl GdsError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn io(context: &str, err: std::io::Error) -> Self {
        let code = if err.kind() == std::io::ErrorKind::UnexpectedEof {
            ErrorCode::TruncatedRecord
        } else {
            ErrorCode::InputFileError
        };
        Self::new(code, format!("{}: {}", context, err))
    }
}

pub type Result<T> = std::result::Result<T, GdsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_reference_is_not_fatal() {
        assert!(!ErrorCode::MissingReference.is_fatal());
        assert!(ErrorCode::InvalidFile.is_fatal());
        assert!(ErrorCode::InputFileOpenError.is_fatal());
    }

    #[test]
    fn test_unexpected_eof_maps_to_truncated() {
        let err = GdsError::io(
            "reading header",
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof"),
        );
        assert_eq!(err.code, ErrorCode::TruncatedRecord);
        assert!(err.to_string().contains("reading header"));
    }

    #[test]
    fn test_display_and_source() {
        use std::error::Error;
        let err = GdsError::new(ErrorCode::EmptyName, "structure at offset 40");
        assert_eq!(err.to_string(), "structure at offset 40 (empty cell name)");
        assert_eq!(err.source().map(|s| s.to_string()), Some("empty cell name".to_string()));
    }
}

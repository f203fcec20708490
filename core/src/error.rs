use crate::validator::issue::ImportValidationError;
use thiserror::Error;

/// Fatal errors. These never pass through the error policy; they unwind
/// straight out of `Validator::validate`.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("error opening the import file: {0}")]
    ArchiveOpen(#[source] std::io::Error),

    #[error("error reading the import file metadata: {0}")]
    ArchiveMetadata(#[source] std::io::Error),

    #[error("error reading the ZIP file: {0}")]
    ArchiveFormat(#[source] zip::result::ZipError),

    #[error("could not find a .jsonl file in the import archive")]
    ManifestMissing,

    #[error("error reading the .jsonl file: {0}")]
    ManifestRead(#[source] std::io::Error),

    #[error("line {line} of the .jsonl file exceeds the maximum line length of {limit} bytes")]
    LineTooLong { line: u64, limit: usize },

    /// Returned by the default policy: the first defect, unchanged.
    #[error("{0}")]
    Invalid(Box<ImportValidationError>),

    /// Returned by a custom policy that decided to stop.
    #[error("validation aborted: {0}")]
    Aborted(String),
}

impl ValidateError {
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ValidateError::Invalid(_) | ValidateError::Aborted(_))
    }

    /// The defect that stopped validation, when the default policy aborted.
    pub fn validation_error(&self) -> Option<&ImportValidationError> {
        match self {
            ValidateError::Invalid(e) => Some(&**e),
            _ => None,
        }
    }
}

pub type ValidateResult<T> = Result<T, ValidateError>;

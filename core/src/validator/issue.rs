use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::sync::Arc;

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Location name used for entities seeded before validation.
pub const INJECTED: &str = "injected";

/// Where a record was defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportFileInfo {
    pub archive_name: String,
    pub file_name: String,
    pub total_lines: u64,
    #[serde(rename = "current_line")]
    pub line_number: u64,
}

impl ImportFileInfo {
    pub fn injected() -> Self {
        Self {
            archive_name: INJECTED.to_string(),
            file_name: INJECTED.to_string(),
            total_lines: 0,
            line_number: 0,
        }
    }

    pub fn is_injected(&self) -> bool {
        self.archive_name == INJECTED && self.file_name == INJECTED
    }
}

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UNEXPECTED_EMPTY_LINE,
    JSON_DECODE,
    MISSING_VERSION_FIRST,
    VERSION_VALUE_INVALID,
    UNKNOWN_RECORD_TYPE,
    MISSING_PAYLOAD,
    FIELD_VALIDATION,
    DUPLICATE_ENTITY,
    UNKNOWN_REFERENCE,
    MISSING_ATTACHMENT,
    IMAGE_DECODE,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UNEXPECTED_EMPTY_LINE => "UNEXPECTED_EMPTY_LINE",
            ErrorKind::JSON_DECODE => "JSON_DECODE",
            ErrorKind::MISSING_VERSION_FIRST => "MISSING_VERSION_FIRST",
            ErrorKind::VERSION_VALUE_INVALID => "VERSION_VALUE_INVALID",
            ErrorKind::UNKNOWN_RECORD_TYPE => "UNKNOWN_RECORD_TYPE",
            ErrorKind::MISSING_PAYLOAD => "MISSING_PAYLOAD",
            ErrorKind::FIELD_VALIDATION => "FIELD_VALIDATION",
            ErrorKind::DUPLICATE_ENTITY => "DUPLICATE_ENTITY",
            ErrorKind::UNKNOWN_REFERENCE => "UNKNOWN_REFERENCE",
            ErrorKind::MISSING_ATTACHMENT => "MISSING_ATTACHMENT",
            ErrorKind::IMAGE_DECODE => "IMAGE_DECODE",
        }
    }
}

/// Continuation a policy may call to accept the suggested fix.
#[derive(Clone)]
pub struct ApplySuggestion(Arc<dyn Fn() + Send + Sync>);

impl ApplySuggestion {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn apply(&self) {
        (self.0)()
    }
}

impl fmt::Debug for ApplySuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApplySuggestion(..)")
    }
}

/// A recoverable defect, handed to the error policy.
#[derive(Debug)]
pub struct ImportValidationError {
    kind: ErrorKind,
    file_info: Option<ImportFileInfo>,
    field_name: Option<String>,
    cause: Option<BoxError>,
    suggestion: Option<String>,
    suggested_values: Vec<String>,
    apply_suggestion: Option<ApplySuggestion>,
}

impl ImportValidationError {
    pub fn new(kind: ErrorKind, file_info: &ImportFileInfo) -> Self {
        Self {
            kind,
            file_info: Some(file_info.clone()),
            field_name: None,
            cause: None,
            suggestion: None,
            suggested_values: Vec::new(),
            apply_suggestion: None,
        }
    }

    pub fn without_location(kind: ErrorKind) -> Self {
        Self {
            kind,
            file_info: None,
            field_name: None,
            cause: None,
            suggestion: None,
            suggested_values: Vec::new(),
            apply_suggestion: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_message(self, message: impl Into<String>) -> Self {
        let message: String = message.into();
        self.with_cause(message)
    }

    pub fn with_suggestion(
        mut self,
        suggestion: impl Into<String>,
        values: Vec<String>,
        apply: Option<ApplySuggestion>,
    ) -> Self {
        self.suggestion = Some(suggestion.into());
        self.suggested_values = values;
        self.apply_suggestion = apply;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn file_info(&self) -> Option<&ImportFileInfo> {
        self.file_info.as_ref()
    }

    pub fn line_number(&self) -> Option<u64> {
        self.file_info.as_ref().map(|i| i.line_number)
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    pub fn cause_message(&self) -> String {
        self.cause.as_ref().map(|c| c.to_string()).unwrap_or_default()
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    pub fn suggested_values(&self) -> &[String] {
        &self.suggested_values
    }

    pub fn apply_suggestion(&self) -> Option<&ApplySuggestion> {
        self.apply_suggestion.as_ref()
    }
}

impl fmt::Display for ImportValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("import validation error")?;
        if let Some(info) = &self.file_info {
            write!(
                f,
                " in \"{}\"->\"{}\":{}",
                info.archive_name, info.file_name, info.line_number
            )?;
        }
        if let Some(name) = &self.field_name {
            write!(f, " field \"{}\"", name)?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {}", cause)?;
        }
        Ok(())
    }
}

impl Error for ImportValidationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause.as_deref().map(|c| c as &(dyn Error + 'static))
    }
}

pub mod archive;
pub mod config;
pub mod model;
pub mod report;
pub mod validator;

pub mod error;

pub use config::ValidatorConfig;
pub use error::{ValidateError, ValidateResult};
pub use validator::issue::{ApplySuggestion, ErrorKind, ImportFileInfo, ImportValidationError};
pub use validator::Validator;

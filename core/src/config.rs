use serde::{Deserialize, Serialize};

pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;
pub const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_ATTACHMENTS_PREFIX: &str = "data/";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidatorConfig {
    /// Emit a progress line every this many manifest lines. 0 disables progress.
    pub progress_interval: u64,
    pub max_line_bytes: usize,
    /// Archive entries under this prefix are attachments.
    pub attachments_prefix: String,
    /// Teams assumed to exist on the target server.
    pub injected_teams: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            attachments_prefix: DEFAULT_ATTACHMENTS_PREFIX.to_string(),
            injected_teams: Vec::new(),
        }
    }
}

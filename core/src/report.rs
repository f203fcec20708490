use crate::validator::issue::{ErrorKind, ImportValidationError};
use crate::validator::Validator;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportedError {
    pub kind: ErrorKind,
    pub file_name: String,
    pub current_line: u64,
    pub field: Option<String>,
    pub message: String,
    pub suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggested_values: Vec<String>,
}

impl From<&ImportValidationError> for ReportedError {
    fn from(e: &ImportValidationError) -> Self {
        Self {
            kind: e.kind(),
            file_name: e.file_info().map(|i| i.file_name.clone()).unwrap_or_default(),
            current_line: e.line_number().unwrap_or(0),
            field: e.field_name().map(str::to_string),
            message: e.cause_message(),
            suggestion: e.suggestion().map(str::to_string),
            suggested_values: e.suggested_values().to_vec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub archive_name: String,
    pub archive_sha256: String,
    pub validated_at: String,
    pub overall: String, // PASS|FAIL
    pub total_lines: u64,
    pub schemes: Vec<String>,
    pub teams: Vec<String>,
    pub injected_teams: Vec<String>,
    pub channels: Vec<String>,
    pub users: Vec<String>,
    pub emojis: Vec<String>,
    pub posts: u64,
    pub direct_channels: u64,
    pub attachments: Vec<String>,
    pub unused_attachments: Vec<String>,
    pub errors: Vec<ReportedError>,
}

impl ValidationReport {
    /// Builds the report from a validator that has finished `validate`.
    /// `teams` lists archive-defined teams only.
    pub fn from_validator(
        v: &Validator,
        archive_sha256: String,
        errors: &[ImportValidationError],
    ) -> Self {
        let injected = v.injected_teams();
        let teams = v
            .teams()
            .into_iter()
            .filter(|t| !injected.contains(t))
            .collect();
        let errors: Vec<ReportedError> = errors.iter().map(ReportedError::from).collect();
        let overall = if errors.is_empty() { "PASS" } else { "FAIL" };
        Self {
            archive_name: v.archive_name().to_string(),
            archive_sha256,
            validated_at: now_rfc3339_utc(),
            overall: overall.to_string(),
            total_lines: v.total_lines(),
            schemes: v.schemes(),
            teams,
            injected_teams: injected,
            channels: v.channels(),
            users: v.users(),
            emojis: v.emojis(),
            posts: v.post_count(),
            direct_channels: v.direct_channel_count(),
            attachments: v.attachments(),
            unused_attachments: v.unused_attachments(),
            errors,
        }
    }

    pub fn passed(&self) -> bool {
        self.overall == "PASS"
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// One row per defect, in manifest order.
    pub fn errors_csv(&self) -> Result<String, csv::Error> {
        let mut wtr = csv::WriterBuilder::new().from_writer(vec![]);
        wtr.write_record(["kind", "file", "current_line", "field", "message"])?;
        for e in &self.errors {
            wtr.write_record([
                e.kind.as_str(),
                e.file_name.as_str(),
                e.current_line.to_string().as_str(),
                e.field.as_deref().unwrap_or(""),
                e.message.as_str(),
            ])?;
        }
        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).replace("\r\n", "\n"))
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for e in &self.errors {
            out.push_str(&format!("{}:{}", e.file_name, e.current_line));
            if let Some(field) = &e.field {
                out.push_str(&format!(" field {:?}", field));
            }
            out.push_str(&format!(": {}\n", e.message));
            if let Some(s) = &e.suggestion {
                out.push_str(&format!("  suggestion: {}\n", s));
            }
        }
        out.push_str(&format!(
            "{} ({}): {} lines, {} errors\n",
            self.archive_name,
            self.overall,
            self.total_lines,
            self.errors.len()
        ));
        out.push_str(&format!(
            "schemes: {}, teams: {} (+{} injected), channels: {}, users: {}, emojis: {}\n",
            self.schemes.len(),
            self.teams.len(),
            self.injected_teams.len(),
            self.channels.len(),
            self.users.len(),
            self.emojis.len()
        ));
        out.push_str(&format!(
            "posts: {}, direct channels: {}\n",
            self.posts, self.direct_channels
        ));
        out.push_str(&format!(
            "attachments: {} used, {} unused\n",
            self.attachments.len(),
            self.unused_attachments.len()
        ));
        for a in &self.unused_attachments {
            out.push_str(&format!("  unused: {}\n", a));
        }
        out
    }
}

pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut f = File::open(path)?;
    let mut h = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = f.read(&mut buf)?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }
    Ok(hex::encode(h.finalize()))
}

fn now_rfc3339_utc() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

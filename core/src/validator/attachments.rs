use std::collections::HashMap;

/// Attachment index plus per-path use counts.
#[derive(Debug, Default)]
pub struct AttachmentTracker {
    index: HashMap<String, usize>,
    used: HashMap<String, u64>,
}

impl AttachmentTracker {
    pub fn register(&mut self, path: impl Into<String>, entry_index: usize) {
        self.index.insert(path.into(), entry_index);
    }

    /// Resolves `path` and records a use. Returns the archive entry index.
    pub fn resolve(&mut self, path: &str) -> Option<usize> {
        let entry_index = *self.index.get(path)?;
        *self.used.entry(path.to_string()).or_insert(0) += 1;
        Some(entry_index)
    }

    pub fn used(&self) -> Vec<String> {
        sorted_keys(self.used.keys())
    }

    pub fn unused(&self) -> Vec<String> {
        sorted_keys(self.index.keys().filter(|p| !self.used.contains_key(*p)))
    }
}

pub(crate) fn sorted_keys<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut out: Vec<String> = keys.cloned().collect();
    out.sort();
    out
}

/// Joins a record-relative attachment path under the attachments prefix.
pub fn attachment_path(prefix: &str, relative: &str) -> String {
    let mut rel = relative.trim_start_matches('/');
    while let Some(rest) = rel.strip_prefix("./") {
        rel = rest.trim_start_matches('/');
    }
    if prefix.is_empty() || prefix.ends_with('/') {
        format!("{}{}", prefix, rel)
    } else {
        format!("{}/{}", prefix, rel)
    }
}

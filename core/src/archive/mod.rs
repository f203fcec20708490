pub mod scanner;

use crate::error::{ValidateError, ValidateResult};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;
use zip::ZipArchive;

pub const MANIFEST_SUFFIX: &str = ".jsonl";

/// An attachment entry: its in-archive path and the index that re-opens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentEntry {
    pub path: String,
    pub index: usize,
}

/// An opened import archive with its manifest located and attachments listed.
/// Dropping it closes the underlying file.
pub struct ImportArchive {
    zip: ZipArchive<File>,
    manifest_index: usize,
    manifest_name: String,
    attachments: Vec<AttachmentEntry>,
}

impl ImportArchive {
    pub fn open(path: &Path, attachments_prefix: &str) -> ValidateResult<Self> {
        let file = File::open(path).map_err(ValidateError::ArchiveOpen)?;
        let size = file
            .metadata()
            .map_err(ValidateError::ArchiveMetadata)?
            .len();
        let mut zip = ZipArchive::new(file).map_err(ValidateError::ArchiveFormat)?;
        debug!(archive = %path.display(), size, entries = zip.len(), "opened import archive");

        // Entries are listed raw: an attachment stored with a method this
        // build cannot decompress only fails if something reads it.
        // First pass: the first .jsonl entry wins.
        let mut manifest = None;
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i).map_err(ValidateError::ArchiveFormat)?;
            if entry.name().ends_with(MANIFEST_SUFFIX) {
                manifest = Some((i, entry.name().to_string()));
                break;
            }
        }
        let (manifest_index, manifest_name) = manifest.ok_or(ValidateError::ManifestMissing)?;

        // Second pass: every non-directory entry under the attachments prefix.
        let mut attachments = Vec::new();
        for i in 0..zip.len() {
            let entry = zip.by_index_raw(i).map_err(ValidateError::ArchiveFormat)?;
            if entry.is_dir() || !entry.name().starts_with(attachments_prefix) {
                continue;
            }
            attachments.push(AttachmentEntry {
                path: entry.name().to_string(),
                index: i,
            });
        }
        debug!(
            manifest = %manifest_name,
            attachments = attachments.len(),
            "indexed import archive"
        );

        Ok(Self {
            zip,
            manifest_index,
            manifest_name,
            attachments,
        })
    }

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    pub fn attachments(&self) -> &[AttachmentEntry] {
        &self.attachments
    }

    /// Opens the manifest for a streaming read. Each call starts from the top.
    pub fn open_manifest(&mut self) -> ValidateResult<impl Read + '_> {
        self.zip
            .by_index(self.manifest_index)
            .map_err(|e| ValidateError::ManifestRead(io::Error::new(io::ErrorKind::Other, e)))
    }
}

/// A second, lazily opened handle on the archive used to read attachment
/// bytes while the manifest stream holds the first one.
pub struct EntryReader {
    path: PathBuf,
    zip: Option<ZipArchive<File>>,
}

impl EntryReader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            zip: None,
        }
    }

    /// Reads entry `index`, at most `max_bytes` of it when a limit is given.
    pub fn read(&mut self, index: usize, max_bytes: Option<u64>) -> io::Result<Vec<u8>> {
        if self.zip.is_none() {
            let file = File::open(&self.path)?;
            let zip =
                ZipArchive::new(file).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            self.zip = Some(zip);
        }
        let Some(zip) = self.zip.as_mut() else {
            return Err(io::Error::new(io::ErrorKind::Other, "archive is not open"));
        };
        let entry = zip
            .by_index(index)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let mut out = Vec::new();
        entry
            .take(max_bytes.unwrap_or(u64::MAX))
            .read_to_end(&mut out)?;
        Ok(out)
    }
}

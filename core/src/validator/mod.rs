pub mod attachments;
pub mod issue;
pub mod probe;

use crate::archive::scanner::{count_lines, LineScanner};
use crate::archive::{EntryReader, ImportArchive};
use crate::config::ValidatorConfig;
use crate::error::{ValidateError, ValidateResult};
use crate::model::rules::{self, FieldError};
use crate::model::{
    decode_line, ChannelImportData, DirectChannelImportData, EmojiImportData, LineImportData,
    PostImportData, SchemeImportData, TeamImportData, UserImportData,
};
use attachments::{attachment_path, sorted_keys, AttachmentTracker};
use issue::{ApplySuggestion, ErrorKind, ImportFileInfo, ImportValidationError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Decides what happens to a recoverable defect: `Ok(())` continues,
/// an error stops validation and is returned from `validate`.
pub type ErrorPolicy = Box<dyn FnMut(ImportValidationError) -> ValidateResult<()>>;

const MAX_SUGGESTED_VALUES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitingVersion,
    InBody,
}

pub struct Validator {
    archive_path: PathBuf,
    archive_name: String,
    config: ValidatorConfig,
    on_error: Option<ErrorPolicy>,

    attachments: AttachmentTracker,
    schemes: HashMap<String, ImportFileInfo>,
    teams: HashMap<String, ImportFileInfo>,
    channels: HashMap<String, ImportFileInfo>,
    users: HashMap<String, ImportFileInfo>,
    emojis: HashMap<String, ImportFileInfo>,
    posts: u64,
    direct_channels: u64,
    total_lines: u64,

    // Filled by `ApplySuggestion` callbacks, drained after every policy call.
    pending_team_injections: Arc<Mutex<Vec<String>>>,
}

impl Validator {
    pub fn new(archive_path: impl AsRef<Path>) -> Self {
        Self::with_config(archive_path, ValidatorConfig::default())
    }

    pub fn with_config(archive_path: impl AsRef<Path>, config: ValidatorConfig) -> Self {
        let archive_path = archive_path.as_ref().to_path_buf();
        let archive_name = archive_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| archive_path.display().to_string());
        let mut v = Self {
            archive_path,
            archive_name,
            config,
            on_error: None,
            attachments: AttachmentTracker::default(),
            schemes: HashMap::new(),
            teams: HashMap::new(),
            channels: HashMap::new(),
            users: HashMap::new(),
            emojis: HashMap::new(),
            posts: 0,
            direct_channels: 0,
            total_lines: 0,
            pending_team_injections: Arc::new(Mutex::new(Vec::new())),
        };
        for team in v.config.injected_teams.clone() {
            v.inject_team(team);
        }
        v
    }

    /// Sets the error policy; `None` restores the default abort-on-first policy.
    pub fn set_error_policy(&mut self, policy: Option<ErrorPolicy>) {
        self.on_error = policy;
    }

    pub fn on_error<F>(&mut self, policy: F)
    where
        F: FnMut(ImportValidationError) -> ValidateResult<()> + 'static,
    {
        self.on_error = Some(Box::new(policy));
    }

    /// Seeds the teams index with a team assumed to exist on the target server.
    pub fn inject_team(&mut self, name: impl Into<String>) {
        self.teams.insert(name.into(), ImportFileInfo::injected());
    }

    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn validate(&mut self) -> ValidateResult<()> {
        let mut archive =
            ImportArchive::open(&self.archive_path, &self.config.attachments_prefix)?;
        for entry in archive.attachments() {
            self.attachments.register(entry.path.clone(), entry.index);
        }
        let file_name = archive.manifest_name().to_string();

        let total = count_lines(archive.open_manifest()?)?;
        self.total_lines = total;
        info!("{}", line_count_message(total));

        let mut entries = EntryReader::new(&self.archive_path);
        let mut scanner = LineScanner::new(archive.open_manifest()?, self.config.max_line_bytes);
        let mut state = State::AwaitingVersion;

        while let Some((line_number, line)) = scanner.next_line()? {
            let info = ImportFileInfo {
                archive_name: self.archive_name.clone(),
                file_name: file_name.clone(),
                total_lines: total,
                line_number,
            };
            self.report_progress(info.line_number, total);

            if is_blank(line) {
                self.report(
                    ImportValidationError::new(ErrorKind::UNEXPECTED_EMPTY_LINE, &info)
                        .with_message("unexpected empty line"),
                )?;
                continue;
            }

            let record = match decode_line(line) {
                Ok(record) => record,
                Err(e) => {
                    self.report(
                        ImportValidationError::new(ErrorKind::JSON_DECODE, &info).with_cause(e),
                    )?;
                    LineImportData::empty()
                }
            };
            state = self.validate_line(state, &info, record, &mut entries)?;
        }

        debug!(
            posts = self.posts,
            direct_channels = self.direct_channels,
            "validation finished"
        );
        Ok(())
    }

    fn report_progress(&self, line: u64, total: u64) {
        if let Some(message) = progress_message(line, total, self.config.progress_interval) {
            info!("{}", message);
        }
    }

    /// Hands a defect to the policy.
    fn report(&mut self, err: ImportValidationError) -> ValidateResult<()> {
        debug!(kind = err.kind().as_str(), "{}", err);
        let outcome = match self.on_error.as_mut() {
            Some(policy) => policy(err),
            None => Err(ValidateError::Invalid(Box::new(err))),
        };
        self.apply_pending_injections();
        outcome
    }

    fn apply_pending_injections(&mut self) {
        let pending: Vec<String> = match self.pending_team_injections.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => return,
        };
        for team in pending {
            if !self.teams.contains_key(&team) {
                debug!(team = %team, "injecting team from accepted suggestion");
                self.teams.insert(team, ImportFileInfo::injected());
            }
        }
    }

    fn validate_line(
        &mut self,
        state: State,
        info: &ImportFileInfo,
        record: LineImportData,
        entries: &mut EntryReader,
    ) -> ValidateResult<State> {
        if state == State::AwaitingVersion {
            match record {
                LineImportData::Version(version) => self.validate_version(info, version)?,
                other => self.report(
                    ImportValidationError::new(ErrorKind::MISSING_VERSION_FIRST, info)
                        .with_message(format!(
                            "first line must be a version line, found type {:?}",
                            other.type_tag()
                        )),
                )?,
            }
            return Ok(State::InBody);
        }

        match record {
            LineImportData::Version(version) => self.validate_version(info, version)?,
            LineImportData::Scheme(data) => {
                self.validate_not_nil(info, "scheme", data, Self::check_scheme)?
            }
            LineImportData::Team(data) => {
                self.validate_not_nil(info, "team", data, Self::check_team)?
            }
            LineImportData::Channel(data) => {
                self.validate_not_nil(info, "channel", data, Self::check_channel)?
            }
            LineImportData::User(data) => {
                self.validate_not_nil(info, "user", data, Self::check_user)?
            }
            LineImportData::Post(data) => {
                self.validate_not_nil(info, "post", data, Self::check_post)?;
                self.posts += 1;
            }
            LineImportData::DirectChannel(data) => {
                self.validate_not_nil(info, "direct_channel", data, Self::check_direct_channel)?;
                self.direct_channels += 1;
            }
            LineImportData::Emoji(data) => {
                self.validate_not_nil(info, "emoji", data, |v, info, data| {
                    v.check_emoji(info, data, entries)
                })?
            }
            LineImportData::Unknown(tag) => self.report(
                ImportValidationError::new(ErrorKind::UNKNOWN_RECORD_TYPE, info)
                    .with_field("type")
                    .with_message(format!("unknown import type {:?}", tag)),
            )?,
        }
        Ok(State::InBody)
    }

    fn validate_version(
        &mut self,
        info: &ImportFileInfo,
        version: Option<i64>,
    ) -> ValidateResult<()> {
        match version {
            None => self.report(missing_payload(info, "version")),
            Some(1) => Ok(()),
            Some(other) => self.report(
                ImportValidationError::new(ErrorKind::VERSION_VALUE_INVALID, info)
                    .with_field("version")
                    .with_message(format!("version must be 1, found {}", other)),
            ),
        }
    }

    /// Reports a missing payload, otherwise runs `check` and reports the
    /// first defect it finds.
    fn validate_not_nil<T, F>(
        &mut self,
        info: &ImportFileInfo,
        tag: &str,
        data: Option<T>,
        check: F,
    ) -> ValidateResult<()>
    where
        F: FnOnce(&mut Self, &ImportFileInfo, &T) -> Option<ImportValidationError>,
    {
        let defect = match data {
            None => Some(missing_payload(info, tag)),
            Some(data) => check(self, info, &data),
        };
        match defect {
            Some(err) => self.report(err),
            None => Ok(()),
        }
    }

    fn check_scheme(
        &mut self,
        info: &ImportFileInfo,
        data: &SchemeImportData,
    ) -> Option<ImportValidationError> {
        if let Err(e) = rules::validate_scheme(data) {
            return Some(field_error(info, "scheme", e));
        }
        let name = data.name.clone().unwrap_or_default();
        if let Some(prev) = self.schemes.get(&name) {
            return Some(duplicate(info, "scheme", prev));
        }
        self.schemes.insert(name, info.clone());
        None
    }

    fn check_team(
        &mut self,
        info: &ImportFileInfo,
        data: &TeamImportData,
    ) -> Option<ImportValidationError> {
        if let Err(e) = rules::validate_team(data) {
            return Some(field_error(info, "team", e));
        }
        let name = data.name.clone().unwrap_or_default();
        if let Some(prev) = self.teams.get(&name) {
            // A definition replaces an injected placeholder.
            if !prev.is_injected() {
                return Some(duplicate(info, "team", prev));
            }
        }
        self.teams.insert(name, info.clone());

        if let Some(scheme) = data.scheme.as_deref() {
            if !self.schemes.contains_key(scheme) {
                return Some(unknown_reference(
                    info,
                    "team.scheme",
                    "scheme",
                    scheme,
                    &self.schemes,
                ));
            }
        }
        None
    }

    fn check_channel(
        &mut self,
        info: &ImportFileInfo,
        data: &ChannelImportData,
    ) -> Option<ImportValidationError> {
        if let Err(e) = rules::validate_channel(data) {
            return Some(field_error(info, "channel", e));
        }
        let name = data.name.clone().unwrap_or_default();
        if let Some(prev) = self.channels.get(&name) {
            return Some(duplicate(info, "channel", prev));
        }
        self.channels.insert(name, info.clone());

        if let Some(scheme) = data.scheme.as_deref() {
            if !self.schemes.contains_key(scheme) {
                return Some(unknown_reference(
                    info,
                    "channel.scheme",
                    "scheme",
                    scheme,
                    &self.schemes,
                ));
            }
        }
        if let Some(team) = data.team.as_deref() {
            if !self.teams.contains_key(team) {
                return Some(self.unknown_team(info, "channel.team", team));
            }
        }
        None
    }

    fn check_user(
        &mut self,
        info: &ImportFileInfo,
        data: &UserImportData,
    ) -> Option<ImportValidationError> {
        if let Err(e) = rules::validate_user(data) {
            return Some(field_error(info, "user", e));
        }
        let username = data.username.clone().unwrap_or_default();
        if let Some(prev) = self.users.get(&username) {
            return Some(duplicate(info, "user", prev));
        }
        self.users.insert(username, info.clone());

        for (i, team) in data.teams.iter().flatten().enumerate() {
            let team_name = team.name.as_deref().unwrap_or_default();
            if !self.teams.contains_key(team_name) {
                return Some(self.unknown_team(info, &format!("user.teams[{}]", i), team_name));
            }
            for (j, channel) in team.channels.iter().flatten().enumerate() {
                let channel_name = channel.name.as_deref().unwrap_or_default();
                if !self.channels.contains_key(channel_name) {
                    return Some(unknown_reference(
                        info,
                        &format!("user.teams[{}].channels[{}]", i, j),
                        "channel",
                        channel_name,
                        &self.channels,
                    ));
                }
            }
        }
        None
    }

    fn check_post(
        &mut self,
        info: &ImportFileInfo,
        data: &PostImportData,
    ) -> Option<ImportValidationError> {
        if let Err(e) = rules::validate_post(data) {
            return Some(field_error(info, "post", e));
        }
        let team = data.team.as_deref().unwrap_or_default();
        if !self.teams.contains_key(team) {
            return Some(self.unknown_team(info, "post.team", team));
        }
        let channel = data.channel.as_deref().unwrap_or_default();
        if !self.channels.contains_key(channel) {
            return Some(unknown_reference(
                info,
                "post.channel",
                "channel",
                channel,
                &self.channels,
            ));
        }
        let user = data.user.as_deref().unwrap_or_default();
        if !self.users.contains_key(user) {
            return Some(unknown_reference(
                info,
                "post.user",
                "user",
                user,
                &self.users,
            ));
        }

        for (i, attachment) in data.attachments.iter().flatten().enumerate() {
            let rel = attachment.path.as_deref().unwrap_or_default();
            let path = attachment_path(&self.config.attachments_prefix, rel);
            if self.attachments.resolve(&path).is_none() {
                return Some(
                    ImportValidationError::new(ErrorKind::MISSING_ATTACHMENT, info)
                        .with_field(format!("post.attachments[{}]", i))
                        .with_message(format!("missing attachment file {:?}", path)),
                );
            }
        }
        None
    }

    fn check_direct_channel(
        &mut self,
        info: &ImportFileInfo,
        data: &DirectChannelImportData,
    ) -> Option<ImportValidationError> {
        if let Err(e) = rules::validate_direct_channel(data) {
            return Some(field_error(info, "direct_channel", e));
        }
        for (i, user) in data.favorited_by.iter().flatten().enumerate() {
            if !self.users.contains_key(user) {
                return Some(unknown_reference(
                    info,
                    &format!("direct_channel.favorited_by[{}]", i),
                    "user",
                    user,
                    &self.users,
                ));
            }
        }
        for (i, user) in data.members.iter().flatten().enumerate() {
            if !self.users.contains_key(user) {
                return Some(unknown_reference(
                    info,
                    &format!("direct_channel.members[{}]", i),
                    "user",
                    user,
                    &self.users,
                ));
            }
        }
        None
    }

    fn check_emoji(
        &mut self,
        info: &ImportFileInfo,
        data: &EmojiImportData,
        entries: &mut EntryReader,
    ) -> Option<ImportValidationError> {
        if let Err(e) = rules::validate_emoji(data) {
            return Some(field_error(info, "emoji", e));
        }
        let name = data.name.clone().unwrap_or_default();
        if let Some(prev) = self.emojis.get(&name) {
            return Some(duplicate(info, "emoji", prev));
        }
        self.emojis.insert(name, info.clone());

        let rel = data.image.as_deref().unwrap_or_default();
        let path = attachment_path(&self.config.attachments_prefix, rel);
        let Some(entry_index) = self.attachments.resolve(&path) else {
            return Some(
                ImportValidationError::new(ErrorKind::MISSING_ATTACHMENT, info)
                    .with_field("emoji.image")
                    .with_message(format!("missing image file {:?}", path)),
            );
        };

        let probed = entries
            .read(entry_index, probe::read_limit(&path))
            .map_err(probe::ProbeError::from)
            .and_then(|bytes| probe::probe_image(&path, &bytes));
        match probed {
            Ok(()) => None,
            Err(e) => Some(
                ImportValidationError::new(ErrorKind::IMAGE_DECODE, info)
                    .with_field("emoji.image")
                    .with_cause(e),
            ),
        }
    }

    fn unknown_team(
        &self,
        info: &ImportFileInfo,
        field: &str,
        team: &str,
    ) -> ImportValidationError {
        let queue = Arc::clone(&self.pending_team_injections);
        let name = team.to_string();
        let apply = ApplySuggestion::new(move || {
            if let Ok(mut q) = queue.lock() {
                q.push(name.clone());
            }
        });
        ImportValidationError::new(ErrorKind::UNKNOWN_REFERENCE, info)
            .with_field(field)
            .with_message(format!("reference to unknown team {:?}", team))
            .with_suggestion(
                format!("inject team {:?} if it already exists on the target server", team),
                similar_keys(&self.teams, team),
                Some(apply),
            )
    }

    pub fn schemes(&self) -> Vec<String> {
        sorted_keys(self.schemes.keys())
    }

    /// Every team in the index, injected ones included.
    pub fn teams(&self) -> Vec<String> {
        sorted_keys(self.teams.keys())
    }

    pub fn injected_teams(&self) -> Vec<String> {
        sorted_keys(
            self.teams
                .iter()
                .filter(|(_, info)| info.is_injected())
                .map(|(name, _)| name),
        )
    }

    pub fn channels(&self) -> Vec<String> {
        sorted_keys(self.channels.keys())
    }

    pub fn users(&self) -> Vec<String> {
        sorted_keys(self.users.keys())
    }

    pub fn emojis(&self) -> Vec<String> {
        sorted_keys(self.emojis.keys())
    }

    pub fn post_count(&self) -> u64 {
        self.posts
    }

    pub fn direct_channel_count(&self) -> u64 {
        self.direct_channels
    }

    /// Manifest line count from the first pass; 0 before `validate` runs.
    pub fn total_lines(&self) -> u64 {
        self.total_lines
    }

    pub fn attachments(&self) -> Vec<String> {
        self.attachments.used()
    }

    pub fn unused_attachments(&self) -> Vec<String> {
        self.attachments.unused()
    }
}

fn missing_payload(info: &ImportFileInfo, tag: &str) -> ImportValidationError {
    ImportValidationError::new(ErrorKind::MISSING_PAYLOAD, info)
        .with_field(tag)
        .with_message(format!("missing {} data", tag))
}

fn field_error(info: &ImportFileInfo, tag: &str, e: FieldError) -> ImportValidationError {
    ImportValidationError::new(ErrorKind::FIELD_VALIDATION, info)
        .with_field(tag)
        .with_cause(e)
}

fn duplicate(info: &ImportFileInfo, tag: &str, prev: &ImportFileInfo) -> ImportValidationError {
    ImportValidationError::new(ErrorKind::DUPLICATE_ENTITY, info)
        .with_field(tag)
        .with_message(format!(
            "duplicate entry, previous was in line: {}",
            prev.line_number
        ))
}

fn unknown_reference(
    info: &ImportFileInfo,
    field: &str,
    kind: &str,
    key: &str,
    index: &HashMap<String, ImportFileInfo>,
) -> ImportValidationError {
    let err = ImportValidationError::new(ErrorKind::UNKNOWN_REFERENCE, info)
        .with_field(field)
        .with_message(format!("reference to unknown {} {:?}", kind, key));
    let similar = similar_keys(index, key);
    if similar.is_empty() {
        return err;
    }
    err.with_suggestion(format!("did you mean {:?}?", similar[0]), similar, None)
}

fn line_count_message(total: u64) -> String {
    format!("The .jsonl file has {} lines", total)
}

/// The progress line due after `line`, if any. An interval of 0 disables it.
fn progress_message(line: u64, total: u64, every: u64) -> Option<String> {
    if every == 0 || total == 0 || line % every != 0 {
        return None;
    }
    Some(format!(
        "Progress: {}/{} ({:.2}%)",
        line,
        total,
        line as f64 * 100.0 / total as f64
    ))
}

/// Empty or whitespace only, Unicode whitespace included. Invalid UTF-8 is
/// left to the JSON decoder.
fn is_blank(line: &[u8]) -> bool {
    std::str::from_utf8(line)
        .map(|s| s.trim().is_empty())
        .unwrap_or(false)
}

/// Known keys equal ignoring case, or sharing a prefix with `key`.
fn similar_keys(index: &HashMap<String, ImportFileInfo>, key: &str) -> Vec<String> {
    if key.is_empty() {
        return Vec::new();
    }
    let lower = key.to_lowercase();
    let mut out = sorted_keys(index.keys().filter(|k| {
        let k = k.to_lowercase();
        k == lower || k.starts_with(&lower) || lower.starts_with(&k)
    }));
    out.truncate(MAX_SUGGESTED_VALUES);
    out
}

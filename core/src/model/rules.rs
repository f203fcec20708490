//! Field-level rules for each record kind. Only syntactic checks live here;
//! uniqueness and references are resolved by the validator.

use super::{
    ChannelImportData, DirectChannelImportData, EmojiImportData, PostImportData,
    SchemeImportData, TeamImportData, UserImportData,
};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const SCHEME_NAME_MAX_CHARS: usize = 64;
pub const SCHEME_DISPLAY_NAME_MAX_CHARS: usize = 128;
pub const SCHEME_DESCRIPTION_MAX_CHARS: usize = 1024;
pub const TEAM_NAME_MIN_CHARS: usize = 2;
pub const TEAM_NAME_MAX_CHARS: usize = 64;
pub const TEAM_DISPLAY_NAME_MAX_CHARS: usize = 64;
pub const TEAM_DESCRIPTION_MAX_CHARS: usize = 255;
pub const CHANNEL_NAME_MAX_CHARS: usize = 64;
pub const CHANNEL_DISPLAY_NAME_MAX_CHARS: usize = 64;
pub const CHANNEL_HEADER_MAX_CHARS: usize = 1024;
pub const CHANNEL_PURPOSE_MAX_CHARS: usize = 250;
pub const USERNAME_MAX_CHARS: usize = 64;
pub const USER_EMAIL_MAX_CHARS: usize = 128;
pub const USER_NAME_MAX_CHARS: usize = 64;
pub const USER_POSITION_MAX_CHARS: usize = 128;
pub const POST_MESSAGE_MAX_CHARS: usize = 16383;
pub const DIRECT_CHANNEL_MIN_MEMBERS: usize = 2;
pub const DIRECT_CHANNEL_MAX_MEMBERS: usize = 8;
pub const EMOJI_NAME_MAX_CHARS: usize = 64;

const RESERVED_TEAM_NAMES: &[&str] = &[
    "admin", "api", "channel", "claim", "error", "files", "help", "landing", "login", "mfa",
    "oauth", "plug", "plugins", "post", "signup", "static",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

type RuleResult = Result<(), FieldError>;

fn pattern(cell: &'static OnceLock<Regex>, src: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(src).expect("static pattern compiles"))
}

fn scheme_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^[a-z0-9_]+$")
}

fn team_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^[a-z0-9][a-z0-9-]*$")
}

fn channel_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^[a-z0-9_-]*[a-z0-9][a-z0-9_-]*$")
}

fn username_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^[a-z][a-z0-9._-]*$")
}

fn emoji_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    pattern(&RE, r"^[A-Za-z0-9_+-]+$")
}

fn required<'a>(field: &str, value: &'a Option<String>) -> Result<&'a str, FieldError> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(FieldError::new(field, "is required")),
    }
}

fn char_range(field: &str, value: &str, min: usize, max: usize) -> RuleResult {
    let n = value.chars().count();
    if n < min || n > max {
        if min == 0 {
            return Err(FieldError::new(
                field,
                format!("must be at most {} characters", max),
            ));
        }
        return Err(FieldError::new(
            field,
            format!("must be between {} and {} characters", min, max),
        ));
    }
    Ok(())
}

fn optional_range(field: &str, value: &Option<String>, min: usize, max: usize) -> RuleResult {
    match value.as_deref() {
        Some(v) => char_range(field, v, min, max),
        None => Ok(()),
    }
}

fn matches(field: &str, value: &str, re: &Regex) -> RuleResult {
    if re.is_match(value) {
        Ok(())
    } else {
        Err(FieldError::new(field, "contains invalid characters"))
    }
}

fn one_of(field: &str, value: &Option<String>, allowed: &[&str]) -> RuleResult {
    match value.as_deref() {
        Some(v) if !allowed.contains(&v) => Err(FieldError::new(
            field,
            format!("must be one of {}", allowed.join(", ")),
        )),
        _ => Ok(()),
    }
}

fn scheme_name(field: &str, name: &str) -> RuleResult {
    char_range(field, name, 2, SCHEME_NAME_MAX_CHARS)?;
    matches(field, name, scheme_name_re())
}

pub fn validate_scheme(data: &SchemeImportData) -> RuleResult {
    let name = required("name", &data.name)?;
    scheme_name("name", name)?;
    optional_range("display_name", &data.display_name, 1, SCHEME_DISPLAY_NAME_MAX_CHARS)?;
    optional_range("description", &data.description, 0, SCHEME_DESCRIPTION_MAX_CHARS)?;
    one_of("scope", &data.scope, &["team", "channel"])
}

pub fn validate_team(data: &TeamImportData) -> RuleResult {
    let name = required("name", &data.name)?;
    char_range("name", name, TEAM_NAME_MIN_CHARS, TEAM_NAME_MAX_CHARS)?;
    matches("name", name, team_name_re())?;
    if RESERVED_TEAM_NAMES.contains(&name) {
        return Err(FieldError::new("name", "is a reserved name"));
    }
    optional_range("display_name", &data.display_name, 1, TEAM_DISPLAY_NAME_MAX_CHARS)?;
    one_of("type", &data.team_type, &["O", "I"])?;
    optional_range("description", &data.description, 0, TEAM_DESCRIPTION_MAX_CHARS)?;
    if let Some(scheme) = data.scheme.as_deref() {
        scheme_name("scheme", scheme)?;
    }
    Ok(())
}

pub fn validate_channel(data: &ChannelImportData) -> RuleResult {
    let name = required("name", &data.name)?;
    char_range("name", name, 1, CHANNEL_NAME_MAX_CHARS)?;
    matches("name", name, channel_name_re())?;
    if let Some(team) = data.team.as_deref() {
        if team.is_empty() {
            return Err(FieldError::new("team", "must not be empty"));
        }
    }
    optional_range("display_name", &data.display_name, 1, CHANNEL_DISPLAY_NAME_MAX_CHARS)?;
    one_of("type", &data.channel_type, &["O", "P"])?;
    optional_range("header", &data.header, 0, CHANNEL_HEADER_MAX_CHARS)?;
    optional_range("purpose", &data.purpose, 0, CHANNEL_PURPOSE_MAX_CHARS)?;
    if let Some(scheme) = data.scheme.as_deref() {
        scheme_name("scheme", scheme)?;
    }
    Ok(())
}

pub fn validate_user(data: &UserImportData) -> RuleResult {
    let username = required("username", &data.username)?;
    char_range("username", username, 1, USERNAME_MAX_CHARS)?;
    matches("username", username, username_re())?;
    if let Some(email) = data.email.as_deref() {
        char_range("email", email, 1, USER_EMAIL_MAX_CHARS)?;
        let valid = matches!(
            email.split_once('@'),
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        );
        if !valid {
            return Err(FieldError::new("email", "is not a valid email address"));
        }
    }
    optional_range("nickname", &data.nickname, 0, USER_NAME_MAX_CHARS)?;
    optional_range("first_name", &data.first_name, 0, USER_NAME_MAX_CHARS)?;
    optional_range("last_name", &data.last_name, 0, USER_NAME_MAX_CHARS)?;
    optional_range("position", &data.position, 0, USER_POSITION_MAX_CHARS)?;

    for (i, team) in data.teams.iter().flatten().enumerate() {
        required(&format!("teams[{}].name", i), &team.name)?;
        for (j, channel) in team.channels.iter().flatten().enumerate() {
            required(&format!("teams[{}].channels[{}].name", i, j), &channel.name)?;
        }
    }
    Ok(())
}

pub fn validate_post(data: &PostImportData) -> RuleResult {
    required("team", &data.team)?;
    required("channel", &data.channel)?;
    required("user", &data.user)?;
    optional_range("message", &data.message, 0, POST_MESSAGE_MAX_CHARS)?;
    if let Some(create_at) = data.create_at {
        if create_at <= 0 {
            return Err(FieldError::new("create_at", "must be greater than 0"));
        }
    }
    for (i, attachment) in data.attachments.iter().flatten().enumerate() {
        required(&format!("attachments[{}].path", i), &attachment.path)?;
    }
    Ok(())
}

pub fn validate_direct_channel(data: &DirectChannelImportData) -> RuleResult {
    if let Some(members) = data.members.as_ref() {
        let n = members.len();
        if !(DIRECT_CHANNEL_MIN_MEMBERS..=DIRECT_CHANNEL_MAX_MEMBERS).contains(&n) {
            return Err(FieldError::new(
                "members",
                format!(
                    "must have between {} and {} entries",
                    DIRECT_CHANNEL_MIN_MEMBERS, DIRECT_CHANNEL_MAX_MEMBERS
                ),
            ));
        }
        for (i, user) in data.favorited_by.iter().flatten().enumerate() {
            if !members.contains(user) {
                return Err(FieldError::new(
                    format!("favorited_by[{}]", i),
                    "must be one of the channel members",
                ));
            }
        }
    }
    optional_range("header", &data.header, 0, CHANNEL_HEADER_MAX_CHARS)
}

pub fn validate_emoji(data: &EmojiImportData) -> RuleResult {
    let name = required("name", &data.name)?;
    char_range("name", name, 1, EMOJI_NAME_MAX_CHARS)?;
    matches("name", name, emoji_name_re())?;
    required("image", &data.image)?;
    Ok(())
}

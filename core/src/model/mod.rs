//! Manifest records. Each line is `{"type": T, T: payload}`; decoding reads
//! the `type` discriminator first and then only the payload it names.

pub mod rules;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemeImportData {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamImportData {
    pub name: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub team_type: Option<String>,
    pub description: Option<String>,
    pub allow_open_invite: Option<bool>,
    pub scheme: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelImportData {
    pub team: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub channel_type: Option<String>,
    pub header: Option<String>,
    pub purpose: Option<String>,
    pub scheme: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserImportData {
    pub username: Option<String>,
    pub email: Option<String>,
    pub auth_service: Option<String>,
    pub nickname: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub roles: Option<String>,
    pub locale: Option<String>,
    pub teams: Option<Vec<UserTeamImportData>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserTeamImportData {
    pub name: Option<String>,
    pub roles: Option<String>,
    pub channels: Option<Vec<UserChannelImportData>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserChannelImportData {
    pub name: Option<String>,
    pub roles: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostImportData {
    pub team: Option<String>,
    pub channel: Option<String>,
    pub user: Option<String>,
    pub message: Option<String>,
    pub create_at: Option<i64>,
    pub attachments: Option<Vec<AttachmentImportData>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentImportData {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectChannelImportData {
    pub members: Option<Vec<String>>,
    pub favorited_by: Option<Vec<String>>,
    pub header: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmojiImportData {
    pub name: Option<String>,
    pub image: Option<String>,
}

/// One decoded manifest line. A `None` payload means the field named by the
/// tag was absent or null.
#[derive(Debug, Clone, PartialEq)]
pub enum LineImportData {
    Version(Option<i64>),
    Scheme(Option<SchemeImportData>),
    Team(Option<TeamImportData>),
    Channel(Option<ChannelImportData>),
    User(Option<UserImportData>),
    Post(Option<PostImportData>),
    DirectChannel(Option<DirectChannelImportData>),
    Emoji(Option<EmojiImportData>),
    Unknown(String),
}

impl LineImportData {
    /// The zero-valued record used after a decode failure.
    pub fn empty() -> Self {
        LineImportData::Unknown(String::new())
    }

    pub fn type_tag(&self) -> &str {
        match self {
            LineImportData::Version(_) => "version",
            LineImportData::Scheme(_) => "scheme",
            LineImportData::Team(_) => "team",
            LineImportData::Channel(_) => "channel",
            LineImportData::User(_) => "user",
            LineImportData::Post(_) => "post",
            LineImportData::DirectChannel(_) => "direct_channel",
            LineImportData::Emoji(_) => "emoji",
            LineImportData::Unknown(tag) => tag,
        }
    }
}

pub fn decode_line(line: &[u8]) -> Result<LineImportData, serde_json::Error> {
    let mut obj: Map<String, Value> = serde_json::from_slice(line)?;
    let tag = match obj.get("type") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(<serde_json::Error as serde::de::Error>::custom(format!(
                "invalid type: {}, expected a string for \"type\"",
                other
            )))
        }
    };

    let record = match tag.as_str() {
        "version" => LineImportData::Version(payload(&mut obj, "version")?),
        "scheme" => LineImportData::Scheme(payload(&mut obj, "scheme")?),
        "team" => LineImportData::Team(payload(&mut obj, "team")?),
        "channel" => LineImportData::Channel(payload(&mut obj, "channel")?),
        "user" => LineImportData::User(payload(&mut obj, "user")?),
        "post" => LineImportData::Post(payload(&mut obj, "post")?),
        "direct_channel" => LineImportData::DirectChannel(payload(&mut obj, "direct_channel")?),
        "emoji" => LineImportData::Emoji(payload(&mut obj, "emoji")?),
        _ => LineImportData::Unknown(tag),
    };
    Ok(record)
}

fn payload<T: DeserializeOwned>(
    obj: &mut Map<String, Value>,
    key: &str,
) -> Result<Option<T>, serde_json::Error> {
    match obj.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value(v).map(Some),
    }
}

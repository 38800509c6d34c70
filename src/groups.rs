use crate::logging::BotLog;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum GroupsError {
    #[error("channel groups file `{path}` is not valid JSON: {source}")]
    InvalidJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("channel groups file `{path}` must map group names to channel lists")]
    NotAnObject { path: String },
    #[error("channel group `{name}` has no channel entries")]
    EmptyGroup { name: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// One configured channel group. The map key is the lowercased name;
/// `display_name` preserves the configured casing for `list` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelGroup {
    pub display_name: String,
    pub channels: Vec<String>,
    pub description: Option<String>,
}

fn channel_entries(raw: &[Value]) -> Vec<String> {
    raw.iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads the group mapping from disk. A missing file means "no groups"; a
/// group that is present but resolves to zero channel entries fails the
/// whole load rather than silently shrinking the configuration.
pub fn load_channel_groups(
    path: &Path,
    log: &BotLog,
) -> Result<BTreeMap<String, ChannelGroup>, GroupsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            log.info(
                "groups",
                &format!(
                    "channel groups file `{}` not found; proceeding without groups",
                    path.display()
                ),
            );
            return Ok(BTreeMap::new());
        }
        Err(err) => {
            return Err(GroupsError::Io {
                path: path.display().to_string(),
                source: err,
            })
        }
    };

    let data: Value = serde_json::from_str(&raw).map_err(|source| GroupsError::InvalidJson {
        path: path.display().to_string(),
        source,
    })?;
    let Value::Object(entries) = data else {
        return Err(GroupsError::NotAnObject {
            path: path.display().to_string(),
        });
    };

    let mut groups = BTreeMap::new();
    for (name, raw_group) in entries {
        let (channels, description) = match &raw_group {
            Value::Array(items) => (channel_entries(items), None),
            Value::Object(fields) => {
                let Some(Value::Array(items)) = fields.get("channels") else {
                    log.warn(
                        "groups",
                        &format!(
                            "channel group `{name}` ignored because `channels` is missing or not a list"
                        ),
                    );
                    continue;
                };
                let description = fields
                    .get("description")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
                (channel_entries(items), description)
            }
            _ => {
                log.warn(
                    "groups",
                    &format!("ignoring channel group `{name}` because value must be an object or list"),
                );
                continue;
            }
        };

        if channels.is_empty() {
            return Err(GroupsError::EmptyGroup { name });
        }

        groups.insert(
            name.to_lowercase(),
            ChannelGroup {
                display_name: name,
                channels,
                description,
            },
        );
    }

    Ok(groups)
}

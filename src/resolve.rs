use crate::logging::BotLog;
use crate::slack::{SlackDirectory, SlackError};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Shortest channel ID Slack issues; C/G-prefixed tokens below this length
/// are rejected rather than passed through as malformed IDs.
pub const CHANNEL_ID_MIN_LEN: usize = 9;

fn has_channel_prefix(value: &str) -> bool {
    value.starts_with('C') || value.starts_with('G')
}

/// Extracts the canonical ID from a `<#C123ABC45>` or `<#C123ABC45|name>`
/// mention. The label after `|` is ignored.
pub fn channel_id_from_mention(token: &str) -> Option<String> {
    let body = token.trim().strip_prefix("<#")?.strip_suffix('>')?;
    let id = body.split('|').next().unwrap_or(body);
    let upper = id.to_ascii_uppercase();
    if has_channel_prefix(&upper) {
        Some(upper)
    } else {
        None
    }
}

/// Resolves the invite target: a `<@U123>` / `<@U123|name>` mention or a
/// raw U-prefixed ID.
pub fn resolve_user_identifier(token: &str) -> Option<String> {
    let token = token.trim();
    if let Some(body) = token.strip_prefix("<@").and_then(|rest| rest.strip_suffix('>')) {
        let id = body.split('|').next().unwrap_or(body);
        let upper = id.to_ascii_uppercase();
        if upper.starts_with('U')
            && upper.len() > 1
            && upper.chars().all(|ch| ch.is_ascii_alphanumeric())
        {
            return Some(upper);
        }
        return None;
    }
    let upper = token.to_ascii_uppercase();
    if upper.starts_with('U') {
        return Some(upper);
    }
    None
}

/// Turns a single channel reference token into a canonical channel ID.
/// Owns the process-lifetime name cache; entries are populated by paging
/// the full channel listing and never expire.
#[derive(Debug, Default)]
pub struct ChannelResolver {
    names: Mutex<BTreeMap<String, String>>,
}

impl ChannelResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolution order: bracket mention, raw ID heuristic, then name
    /// lookup. Returns `None` when no rule matches; callers aggregate.
    pub fn resolve(&self, api: &dyn SlackDirectory, log: &BotLog, token: &str) -> Option<String> {
        let token = token.trim();

        if let Some(id) = channel_id_from_mention(token) {
            return Some(id);
        }

        let upper = token.to_ascii_uppercase();
        if has_channel_prefix(&upper) {
            if upper.len() >= CHANNEL_ID_MIN_LEN {
                return Some(upper);
            }
            return None;
        }

        let name = token.trim_start_matches('#').to_lowercase();
        if name.is_empty() {
            return None;
        }
        self.name_to_id(api, log, &name)
    }

    fn name_to_id(&self, api: &dyn SlackDirectory, log: &BotLog, name: &str) -> Option<String> {
        if let Some(hit) = self.cached(name) {
            return Some(hit);
        }

        let mut seen = BTreeMap::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = match api.list_channels_page(cursor.as_deref()) {
                Ok(page) => page,
                Err(err) => {
                    log.error(
                        "channel_lookup",
                        &format!("failed to look up channel `{name}`: {err}"),
                    );
                    return None;
                }
            };
            for channel in page.channels {
                seen.insert(channel.name.to_lowercase(), channel.id.to_ascii_uppercase());
            }
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        let Ok(mut cache) = self.names.lock() else {
            return seen.get(name).cloned();
        };
        cache.extend(seen);
        cache.get(name).cloned()
    }

    fn cached(&self, name: &str) -> Option<String> {
        let Ok(cache) = self.names.lock() else {
            return None;
        };
        cache.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracket_mentions_resolve_regardless_of_label() {
        assert_eq!(
            channel_id_from_mention("<#C123ABC45>").as_deref(),
            Some("C123ABC45")
        );
        assert_eq!(
            channel_id_from_mention("<#c123abc45|general>").as_deref(),
            Some("C123ABC45")
        );
        assert_eq!(
            channel_id_from_mention("<#G987ZYX65|priv | ate>").as_deref(),
            Some("G987ZYX65")
        );
        assert_eq!(channel_id_from_mention("<#U123ABC45>"), None);
        assert_eq!(channel_id_from_mention("#general"), None);
    }

    #[test]
    fn user_mentions_and_raw_ids_resolve() {
        assert_eq!(
            resolve_user_identifier("<@U0ABC123>").as_deref(),
            Some("U0ABC123")
        );
        assert_eq!(
            resolve_user_identifier("<@u0abc123|botname>").as_deref(),
            Some("U0ABC123")
        );
        assert_eq!(resolve_user_identifier("u0abc123").as_deref(), Some("U0ABC123"));
        assert_eq!(resolve_user_identifier("<@C0ABC123>"), None);
        assert_eq!(resolve_user_identifier("#general"), None);
    }
}

use crate::groups::ChannelGroup;
use crate::logging::BotLog;
use crate::resolve::ChannelResolver;
use crate::slack::SlackDirectory;
use std::collections::{BTreeMap, BTreeSet};

pub const EMPTY_SELECTION_MESSAGE: &str = "Please name channel group(s) and/or channel names.";

/// Classification of one input token against the group mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenResolution {
    Channels(Vec<String>),
    Unknown(String),
    EmptyGroup(String),
}

/// The aggregate of a full token list: resolved channel IDs in first-seen
/// order plus the three error categories, each deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedChannelSet {
    pub channel_ids: Vec<String>,
    pub unknown_tokens: Vec<String>,
    pub empty_groups: Vec<String>,
    pub missing_in_groups: Vec<String>,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ResolutionFailure(pub String);

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

fn expand_group(
    api: &dyn SlackDirectory,
    resolver: &ChannelResolver,
    log: &BotLog,
    group: &ChannelGroup,
) -> (Vec<String>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut missing = Vec::new();
    for entry in &group.channels {
        match resolver.resolve(api, log, entry) {
            Some(id) => resolved.push(id),
            None => missing.push(entry.clone()),
        }
    }
    (
        dedup_preserving_order(resolved),
        dedup_preserving_order(missing),
    )
}

/// Expands tokens against the group mapping. Each distinct group name is
/// expanded at most once no matter how often it appears; members that fail
/// to resolve are recorded without discarding the group's other members.
pub fn expand_channel_tokens(
    api: &dyn SlackDirectory,
    resolver: &ChannelResolver,
    log: &BotLog,
    tokens: &[String],
    groups: &BTreeMap<String, ChannelGroup>,
) -> ResolvedChannelSet {
    let mut set = ResolvedChannelSet::default();
    let mut expanded_groups = BTreeSet::new();

    for token in tokens {
        let lower = token.to_lowercase();
        let resolution = if let Some(group) = groups.get(&lower) {
            if !expanded_groups.insert(lower) {
                continue;
            }
            let (resolved, missing) = expand_group(api, resolver, log, group);
            if !missing.is_empty() {
                set.missing_in_groups
                    .push(format!("{token} -> {}", missing.join(", ")));
            }
            if resolved.is_empty() {
                TokenResolution::EmptyGroup(token.clone())
            } else {
                TokenResolution::Channels(resolved)
            }
        } else {
            match resolver.resolve(api, log, token) {
                Some(id) => TokenResolution::Channels(vec![id]),
                None => TokenResolution::Unknown(token.clone()),
            }
        };

        match resolution {
            TokenResolution::Channels(ids) => set.channel_ids.extend(ids),
            TokenResolution::Unknown(token) => set.unknown_tokens.push(token),
            TokenResolution::EmptyGroup(token) => set.empty_groups.push(token),
        }
    }

    set.channel_ids = dedup_preserving_order(set.channel_ids);
    set.unknown_tokens = dedup_preserving_order(set.unknown_tokens);
    set.empty_groups = dedup_preserving_order(set.empty_groups);
    set.missing_in_groups = dedup_preserving_order(set.missing_in_groups);
    set
}

impl ResolvedChannelSet {
    /// Collapses the three error categories into one aggregated message.
    /// Any unresolved token, empty group, or missing in-group member fails
    /// the whole selection rather than inviting to a silent subset.
    pub fn into_channel_ids(self) -> Result<Vec<String>, ResolutionFailure> {
        let mut errors = Vec::new();
        if !self.unknown_tokens.is_empty() {
            let mut tokens = self.unknown_tokens;
            tokens.sort();
            errors.push(format!(
                "Unknown channel or channel group: {}",
                tokens.join(", ")
            ));
        }
        if !self.empty_groups.is_empty() {
            let mut groups = self.empty_groups;
            groups.sort();
            errors.push(format!(
                "Channel groups without any valid channels: {}",
                groups.join(", ")
            ));
        }
        if !self.missing_in_groups.is_empty() {
            let mut details = self.missing_in_groups;
            details.sort();
            errors.push(format!(
                "Could not resolve channels within groups: {}",
                details.join(", ")
            ));
        }
        if !errors.is_empty() {
            return Err(ResolutionFailure(errors.join("\n")));
        }
        if self.channel_ids.is_empty() {
            return Err(ResolutionFailure(EMPTY_SELECTION_MESSAGE.to_string()));
        }
        Ok(self.channel_ids)
    }
}

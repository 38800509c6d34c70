use crate::authz::AuthorizationGate;
use crate::expand::{expand_channel_tokens, EMPTY_SELECTION_MESSAGE};
use crate::groups::{load_channel_groups, ChannelGroup};
use crate::invite::invite_to_channels;
use crate::logging::BotLog;
use crate::reply::batch_reply_lines;
use crate::resolve::{resolve_user_identifier, ChannelResolver};
use crate::slack::SlackDirectory;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const USAGE_HELP: &str = "Usage: `@inviteclaw add @bot_to_invite customers <#channel-one> team-support`\n\
    Use `@inviteclaw list` to view available channel groups.\n\
    Channel groups come from channel_groups.json; the `default` group applies when no channels are provided.";

const DEFAULT_GROUP: &str = "default";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("No command found after mention")]
    EmptyCommand,
}

/// One incoming `app_mention` event, as delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionEvent {
    pub text: String,
    pub user_id: String,
    pub channel_id: String,
    pub thread_ts: String,
}

/// Strips exactly one leading self-mention, then splits into a lowercased
/// command keyword and argument tokens in original case and order.
pub fn parse_command_text(
    text: &str,
    bot_user_id: &str,
) -> Result<(String, Vec<String>), CommandParseError> {
    let mention = format!("<@{bot_user_id}>");
    let cleaned = text.replacen(&mention, "", 1);
    let mut parts = cleaned.split_whitespace();
    let Some(command) = parts.next() else {
        return Err(CommandParseError::EmptyCommand);
    };
    Ok((
        command.to_lowercase(),
        parts.map(str::to_string).collect(),
    ))
}

/// Handles one mention to completion: authorization, parsing, dispatch,
/// and reply batching. Every path resolves to reply batches (possibly
/// none); nothing propagates out of the event handler.
pub struct MentionHandler<D> {
    pub api: D,
    pub bot_user_id: String,
    pub groups_path: PathBuf,
    pub resolver: ChannelResolver,
    pub gate: AuthorizationGate,
    pub log: BotLog,
}

impl<D: SlackDirectory> MentionHandler<D> {
    pub fn handle(&self, event: &MentionEvent) -> Vec<String> {
        if event.user_id.trim().is_empty() || event.channel_id.trim().is_empty() {
            return batch_reply_lines(&[
                "Unable to process request: missing user or channel info.".to_string()
            ]);
        }

        if let Err(denial) =
            self.gate
                .authorize(&self.api, &self.log, &event.user_id, &event.channel_id)
        {
            return batch_reply_lines(&[denial.reply().to_string()]);
        }

        let (command, args) = match parse_command_text(&event.text, &self.bot_user_id) {
            Ok(parsed) => parsed,
            Err(err) => {
                return batch_reply_lines(&[format!("{err}\n{USAGE_HELP}")]);
            }
        };

        match command.as_str() {
            "help" => batch_reply_lines(&[USAGE_HELP.to_string()]),
            "list" => self.handle_list(&args),
            "add" => self.handle_add(&args),
            other => batch_reply_lines(&[format!("Unknown command '{other}'.\n{USAGE_HELP}")]),
        }
    }

    fn load_groups(&self) -> Result<BTreeMap<String, ChannelGroup>, String> {
        load_channel_groups(&self.groups_path, &self.log).map_err(|err| err.to_string())
    }

    fn handle_list(&self, args: &[String]) -> Vec<String> {
        let groups = match self.load_groups() {
            Ok(groups) => groups,
            Err(message) => return batch_reply_lines(&[message]),
        };

        if !args.is_empty() {
            return batch_reply_lines(&[
                "The `list` command does not take any additional arguments.".to_string(),
            ]);
        }
        if groups.is_empty() {
            return batch_reply_lines(&[format!(
                "No channel groups defined in {}.",
                self.groups_path.display()
            )]);
        }

        let lines: Vec<String> = groups
            .values()
            .map(|group| {
                let description = group
                    .description
                    .as_deref()
                    .unwrap_or("(no description provided)");
                format!("*{}*: {description}", group.display_name)
            })
            .collect();
        batch_reply_lines(&lines)
    }

    fn handle_add(&self, args: &[String]) -> Vec<String> {
        let groups = match self.load_groups() {
            Ok(groups) => groups,
            Err(message) => return batch_reply_lines(&[message]),
        };

        let Some(target_token) = args.first() else {
            return batch_reply_lines(&[format!("Missing bot user ID to invite\n{USAGE_HELP}")]);
        };
        let Some(target_user) = resolve_user_identifier(target_token) else {
            return batch_reply_lines(&[format!(
                "Couldn't understand which bot to invite. Mention it or provide the user ID.\n{USAGE_HELP}"
            )]);
        };

        let mut tokens: Vec<String> = args[1..].to_vec();
        if tokens.is_empty() {
            if groups.contains_key(DEFAULT_GROUP) {
                tokens = vec![DEFAULT_GROUP.to_string()];
            } else {
                return batch_reply_lines(&[format!("{EMPTY_SELECTION_MESSAGE}\n{USAGE_HELP}")]);
            }
        }

        let resolved = expand_channel_tokens(&self.api, &self.resolver, &self.log, &tokens, &groups);
        let channel_ids = match resolved.into_channel_ids() {
            Ok(channel_ids) => channel_ids,
            Err(failure) => {
                return batch_reply_lines(&[format!("{failure}\n{USAGE_HELP}")]);
            }
        };

        let lines: Vec<String> = invite_to_channels(&self.api, &target_user, &channel_ids)
            .into_iter()
            .map(|outcome| outcome.line)
            .collect();
        batch_reply_lines(&lines)
    }
}

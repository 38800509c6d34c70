use crate::slack::{with_rate_limit_retry, SlackDirectory, SlackError};

const NON_FATAL_JOIN_ERRORS: [&str; 2] = ["already_in_channel", "method_not_supported_for_channel_type"];
const STRUCTURAL_JOIN_ERRORS: [&str; 2] = ["method_not_supported_for_channel_type", "not_in_channel"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Invited,
    AlreadyMember,
    Failed,
}

/// One line of user-facing feedback per target channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvitationOutcome {
    pub channel_id: String,
    pub kind: OutcomeKind,
    pub line: String,
}

impl InvitationOutcome {
    fn invited(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            kind: OutcomeKind::Invited,
            line: format!("✅ Invited to <#{channel_id}>"),
        }
    }

    fn already_member(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            kind: OutcomeKind::AlreadyMember,
            line: format!("⚠️ Already in <#{channel_id}>"),
        }
    }

    fn failed(channel_id: &str, detail: String) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            kind: OutcomeKind::Failed,
            line: format!("❌ <#{channel_id}>: {detail}"),
        }
    }
}

fn join_failed_structurally(join_error: Option<&str>) -> bool {
    join_error
        .map(|code| STRUCTURAL_JOIN_ERRORS.contains(&code))
        .unwrap_or(false)
}

fn invite_to_channel(
    api: &dyn SlackDirectory,
    target_user: &str,
    channel_id: &str,
) -> InvitationOutcome {
    // Join first so public channels work unattended. "Already a member" and
    // "join unsupported for this channel type" are remembered, not fatal.
    let mut join_error: Option<String> = None;
    match with_rate_limit_retry(|| api.join_channel(channel_id)) {
        Ok(()) => {}
        Err(SlackError::ApiResponse(code)) if NON_FATAL_JOIN_ERRORS.contains(&code.as_str()) => {
            join_error = Some(code);
        }
        Err(err) => {
            return InvitationOutcome::failed(
                channel_id,
                format!("failed to join channel ({})", err.code()),
            );
        }
    }

    match with_rate_limit_retry(|| api.invite_user(channel_id, target_user)) {
        Ok(()) => InvitationOutcome::invited(channel_id),
        Err(err) => {
            let code = err.code();
            if code == "already_in_channel" {
                InvitationOutcome::already_member(channel_id)
            } else if code == "cant_invite" && join_failed_structurally(join_error.as_deref()) {
                InvitationOutcome::failed(
                    channel_id,
                    "can't invite. Add InviteClaw to the channel first \
                     (private channels require a manual invite)."
                        .to_string(),
                )
            } else {
                InvitationOutcome::failed(channel_id, code)
            }
        }
    }
}

/// Join-then-invite for each channel, in order. Channels are processed
/// independently: one channel's failure never aborts the rest.
pub fn invite_to_channels(
    api: &dyn SlackDirectory,
    target_user: &str,
    channel_ids: &[String],
) -> Vec<InvitationOutcome> {
    channel_ids
        .iter()
        .map(|channel_id| invite_to_channel(api, target_user, channel_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_join_failures_are_recognized() {
        assert!(join_failed_structurally(Some(
            "method_not_supported_for_channel_type"
        )));
        assert!(join_failed_structurally(Some("not_in_channel")));
        assert!(!join_failed_structurally(Some("already_in_channel")));
        assert!(!join_failed_structurally(None));
    }
}

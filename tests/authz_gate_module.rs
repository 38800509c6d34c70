use inviteclaw::authz::{AuthorizationGate, Denial};
use inviteclaw::logging::BotLog;
use inviteclaw::slack::{
    ChannelFlags, ChannelListPage, SlackDirectory, SlackError, UserFlags,
};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use tempfile::tempdir;

struct FakeDirectory {
    users: BTreeMap<String, UserFlags>,
    channels: BTreeMap<String, ChannelFlags>,
    user_error: Option<&'static str>,
    channel_error: Option<&'static str>,
    user_info_calls: RefCell<usize>,
}

impl FakeDirectory {
    fn new() -> Self {
        Self {
            users: BTreeMap::new(),
            channels: BTreeMap::new(),
            user_error: None,
            channel_error: None,
            user_info_calls: RefCell::new(0),
        }
    }
}

impl SlackDirectory for FakeDirectory {
    fn user_info(&self, user_id: &str) -> Result<UserFlags, SlackError> {
        *self.user_info_calls.borrow_mut() += 1;
        if let Some(code) = self.user_error {
            return Err(SlackError::ApiResponse(code.to_string()));
        }
        Ok(self.users.get(user_id).copied().unwrap_or_default())
    }

    fn channel_info(&self, channel_id: &str) -> Result<ChannelFlags, SlackError> {
        if let Some(code) = self.channel_error {
            return Err(SlackError::ApiResponse(code.to_string()));
        }
        Ok(self.channels.get(channel_id).copied().unwrap_or_default())
    }

    fn list_channels_page(&self, _cursor: Option<&str>) -> Result<ChannelListPage, SlackError> {
        Ok(ChannelListPage::default())
    }

    fn join_channel(&self, _channel_id: &str) -> Result<(), SlackError> {
        Ok(())
    }

    fn invite_user(&self, _channel_id: &str, _user_id: &str) -> Result<(), SlackError> {
        Ok(())
    }
}

fn test_log() -> (tempfile::TempDir, BotLog) {
    let temp = tempdir().expect("tempdir");
    let log = BotLog::new(temp.path());
    (temp, log)
}

#[test]
fn users_outside_the_allowlist_are_rejected() {
    let (_temp, log) = test_log();
    let api = FakeDirectory::new();
    let allowed: BTreeSet<String> = ["U0ALLOWED1".to_string()].into_iter().collect();
    let gate = AuthorizationGate::new(Some(allowed));

    let denial = gate
        .authorize(&api, &log, "U0OTHER001", "C0GENERAL1")
        .expect_err("denied");
    assert_eq!(denial, Denial::NotAuthorized);

    // Allow-list comparison is case-normalized.
    assert!(gate.authorize(&api, &log, "u0allowed1", "C0GENERAL1").is_ok());
}

#[test]
fn guest_accounts_are_rejected_and_flags_are_cached() {
    let (_temp, log) = test_log();
    let mut api = FakeDirectory::new();
    api.users.insert(
        "U0GUEST001".to_string(),
        UserFlags {
            is_ultra_restricted: true,
            ..UserFlags::default()
        },
    );
    let gate = AuthorizationGate::new(None);

    for _ in 0..2 {
        let denial = gate
            .authorize(&api, &log, "U0GUEST001", "C0GENERAL1")
            .expect_err("denied");
        assert!(matches!(denial, Denial::GuestNotPermitted { reply }
            if reply.contains("full workspace members")));
    }
    assert_eq!(*api.user_info_calls.borrow(), 1);
}

#[test]
fn missing_users_read_scope_surfaces_the_reinstall_message() {
    let (_temp, log) = test_log();
    let mut api = FakeDirectory::new();
    api.user_error = Some("missing_scope");
    let gate = AuthorizationGate::new(None);

    let denial = gate
        .authorize(&api, &log, "U0MEMBER01", "C0GENERAL1")
        .expect_err("denied");
    assert!(matches!(denial, Denial::GuestNotPermitted { reply }
        if reply.contains("users:read scope")));
}

#[test]
fn user_lookup_failures_fail_closed_with_a_generic_message() {
    let (_temp, log) = test_log();
    let mut api = FakeDirectory::new();
    api.user_error = Some("internal_error");
    let gate = AuthorizationGate::new(None);

    let denial = gate
        .authorize(&api, &log, "U0MEMBER01", "C0GENERAL1")
        .expect_err("denied");
    assert!(matches!(denial, Denial::GuestNotPermitted { reply }
        if reply == "Couldn't verify your account status."));
}

#[test]
fn direct_message_channels_are_rejected_without_any_lookup() {
    let (_temp, log) = test_log();
    let mut api = FakeDirectory::new();
    api.channel_error = Some("internal_error");
    let gate = AuthorizationGate::new(None);

    let denial = gate
        .authorize(&api, &log, "U0MEMBER01", "D0DIRECT01")
        .expect_err("denied");
    assert!(matches!(denial, Denial::ExternalChannelNotPermitted { reply }
        if reply.contains("shared or external channels")));
}

#[test]
fn shared_channels_are_rejected() {
    let (_temp, log) = test_log();
    let mut api = FakeDirectory::new();
    api.channels.insert(
        "C0SHARED01".to_string(),
        ChannelFlags {
            is_ext_shared: true,
            ..ChannelFlags::default()
        },
    );
    let gate = AuthorizationGate::new(None);

    let denial = gate
        .authorize(&api, &log, "U0MEMBER01", "C0SHARED01")
        .expect_err("denied");
    assert!(matches!(denial, Denial::ExternalChannelNotPermitted { reply }
        if reply.contains("shared or external channels")));
}

#[test]
fn channel_lookup_failures_fail_closed() {
    let (_temp, log) = test_log();
    let mut api = FakeDirectory::new();
    api.channel_error = Some("channel_not_found");
    let gate = AuthorizationGate::new(None);

    let denial = gate
        .authorize(&api, &log, "U0MEMBER01", "C0GENERAL1")
        .expect_err("denied");
    assert!(matches!(denial, Denial::ExternalChannelNotPermitted { reply }
        if reply == "Couldn't verify this channel."));
}

#[test]
fn missing_channels_read_scope_surfaces_the_reinstall_message() {
    let (_temp, log) = test_log();
    let mut api = FakeDirectory::new();
    api.channel_error = Some("missing_scope");
    let gate = AuthorizationGate::new(None);

    let denial = gate
        .authorize(&api, &log, "U0MEMBER01", "C0GENERAL1")
        .expect_err("denied");
    assert!(matches!(denial, Denial::ExternalChannelNotPermitted { reply }
        if reply.contains("channel read permissions")));
}

#[test]
fn regular_members_in_regular_channels_pass() {
    let (_temp, log) = test_log();
    let api = FakeDirectory::new();
    let gate = AuthorizationGate::new(None);

    assert!(gate.authorize(&api, &log, "U0MEMBER01", "C0GENERAL1").is_ok());
}

use crate::logging::BotLog;
use crate::slack::{with_rate_limit_retry, ChannelFlags, SlackDirectory, UserFlags};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

const NOT_AUTHORIZED_REPLY: &str = "Sorry, you're not authorized to use InviteClaw.";
const GUEST_REPLY: &str = "Sorry, InviteClaw can only be used by full workspace members.";
const GUEST_SCOPE_REPLY: &str = "InviteClaw is missing the users:read scope. \
                                 An admin needs to reinstall the app with the latest manifest.";
const GUEST_VERIFY_REPLY: &str = "Couldn't verify your account status.";
const EXTERNAL_REPLY: &str = "Sorry, InviteClaw cannot be used in shared or external channels.";
const EXTERNAL_SCOPE_REPLY: &str = "InviteClaw is missing channel read permissions. \
                                    Ask an admin to reinstall with the latest manifest.";
const EXTERNAL_VERIFY_REPLY: &str = "Couldn't verify this channel.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    NotAuthorized,
    GuestNotPermitted { reply: String },
    ExternalChannelNotPermitted { reply: String },
}

impl Denial {
    pub fn reply(&self) -> &str {
        match self {
            Denial::NotAuthorized => NOT_AUTHORIZED_REPLY,
            Denial::GuestNotPermitted { reply } => reply,
            Denial::ExternalChannelNotPermitted { reply } => reply,
        }
    }
}

/// Per-request authorization, terminal at the first rejection. Remote flag
/// lookups are cached for the process lifetime and treated as ground truth
/// once seen; lookup failures fail closed.
#[derive(Debug, Default)]
pub struct AuthorizationGate {
    allowed_users: Option<BTreeSet<String>>,
    user_flags: Mutex<BTreeMap<String, UserFlags>>,
    channel_flags: Mutex<BTreeMap<String, ChannelFlags>>,
}

impl AuthorizationGate {
    pub fn new(allowed_users: Option<BTreeSet<String>>) -> Self {
        Self {
            allowed_users,
            ..Self::default()
        }
    }

    pub fn authorize(
        &self,
        api: &dyn SlackDirectory,
        log: &BotLog,
        user_id: &str,
        channel_id: &str,
    ) -> Result<(), Denial> {
        if let Some(allowed) = &self.allowed_users {
            if !allowed.contains(&user_id.to_ascii_uppercase()) {
                return Err(Denial::NotAuthorized);
            }
        }
        self.check_guest(api, log, user_id)?;
        self.check_external_channel(api, log, channel_id)
    }

    fn check_guest(
        &self,
        api: &dyn SlackDirectory,
        log: &BotLog,
        user_id: &str,
    ) -> Result<(), Denial> {
        let flags = match self.cached_user_flags(user_id) {
            Some(flags) => flags,
            None => match with_rate_limit_retry(|| api.user_info(user_id)) {
                Ok(flags) => {
                    if let Ok(mut cache) = self.user_flags.lock() {
                        cache.insert(user_id.to_string(), flags);
                    }
                    flags
                }
                Err(err) if err.is_missing_scope() => {
                    log.error(
                        "authorization",
                        "users:read scope missing; reinstall InviteClaw with the updated manifest",
                    );
                    return Err(Denial::GuestNotPermitted {
                        reply: GUEST_SCOPE_REPLY.to_string(),
                    });
                }
                Err(err) => {
                    log.error(
                        "authorization",
                        &format!("unable to fetch user info for {user_id}: {err}"),
                    );
                    return Err(Denial::GuestNotPermitted {
                        reply: GUEST_VERIFY_REPLY.to_string(),
                    });
                }
            },
        };

        if flags.is_guest() {
            return Err(Denial::GuestNotPermitted {
                reply: GUEST_REPLY.to_string(),
            });
        }
        Ok(())
    }

    fn check_external_channel(
        &self,
        api: &dyn SlackDirectory,
        log: &BotLog,
        channel_id: &str,
    ) -> Result<(), Denial> {
        // Direct-message channels are never a valid command surface.
        if channel_id.starts_with('D') {
            return Err(Denial::ExternalChannelNotPermitted {
                reply: EXTERNAL_REPLY.to_string(),
            });
        }

        let flags = match self.cached_channel_flags(channel_id) {
            Some(flags) => flags,
            None => match with_rate_limit_retry(|| api.channel_info(channel_id)) {
                Ok(flags) => {
                    if let Ok(mut cache) = self.channel_flags.lock() {
                        cache.insert(channel_id.to_string(), flags);
                    }
                    flags
                }
                Err(err) if err.is_missing_scope() => {
                    log.error(
                        "authorization",
                        "channels:read scope missing; reinstall InviteClaw with the updated manifest",
                    );
                    return Err(Denial::ExternalChannelNotPermitted {
                        reply: EXTERNAL_SCOPE_REPLY.to_string(),
                    });
                }
                Err(err) => {
                    log.error(
                        "authorization",
                        &format!("unable to fetch channel info for {channel_id}: {err}"),
                    );
                    return Err(Denial::ExternalChannelNotPermitted {
                        reply: EXTERNAL_VERIFY_REPLY.to_string(),
                    });
                }
            },
        };

        if flags.is_external() {
            return Err(Denial::ExternalChannelNotPermitted {
                reply: EXTERNAL_REPLY.to_string(),
            });
        }
        Ok(())
    }

    fn cached_user_flags(&self, user_id: &str) -> Option<UserFlags> {
        let Ok(cache) = self.user_flags.lock() else {
            return None;
        };
        cache.get(user_id).copied()
    }

    fn cached_channel_flags(&self, channel_id: &str) -> Option<ChannelFlags> {
        let Ok(cache) = self.channel_flags.lock() else {
            return None;
        };
        cache.get(channel_id).copied()
    }
}

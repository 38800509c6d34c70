use crate::slack::api::AuthTestData;
use std::collections::BTreeSet;
use std::path::PathBuf;

const DEFAULT_GROUPS_FILE: &str = "channel_groups.json";
const DEFAULT_STATE_ROOT: &str = ".inviteclaw";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var `{0}`")]
    MissingEnvVar(String),
    #[error(
        "ALLOWED_USERS must be set (comma-separated user IDs) when running as an org-level app"
    )]
    AllowlistRequiredForOrgApp,
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub bot_token: String,
    pub app_token: String,
    pub allowed_users: Option<BTreeSet<String>>,
    pub groups_path: PathBuf,
    pub state_root: PathBuf,
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_allowlist(value: Option<String>) -> BTreeSet<String> {
    let mut result = BTreeSet::new();
    if let Some(value) = value {
        for part in value.split(',') {
            let trimmed = part.trim();
            if !trimmed.is_empty() {
                result.insert(trimmed.to_ascii_uppercase());
            }
        }
    }
    result
}

pub fn load_env_config() -> Result<EnvConfig, ConfigError> {
    let bot_token = non_empty_env("SLACK_BOT_TOKEN")
        .ok_or_else(|| ConfigError::MissingEnvVar("SLACK_BOT_TOKEN".to_string()))?;
    let app_token = non_empty_env("SLACK_APP_TOKEN")
        .ok_or_else(|| ConfigError::MissingEnvVar("SLACK_APP_TOKEN".to_string()))?;

    let allowlist = parse_allowlist(non_empty_env("ALLOWED_USERS"));
    let allowed_users = if allowlist.is_empty() {
        None
    } else {
        Some(allowlist)
    };

    let groups_path = non_empty_env("CHANNEL_GROUPS_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_GROUPS_FILE));
    let state_root = non_empty_env("INVITECLAW_STATE_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_ROOT));

    Ok(EnvConfig {
        bot_token,
        app_token,
        allowed_users,
        groups_path,
        state_root,
    })
}

/// An org-level install (enterprise set, no workspace team) serves every
/// workspace in the org, so an explicit allow-list is required up front.
pub fn ensure_org_level_allowlist(
    config: &EnvConfig,
    auth: &AuthTestData,
) -> Result<(), ConfigError> {
    if auth.enterprise_id.is_some() && auth.team_id.is_none() && config.allowed_users.is_none() {
        return Err(ConfigError::AllowlistRequiredForOrgApp);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowlist_entries_are_trimmed_and_uppercased() {
        let parsed = parse_allowlist(Some(" u123 ,U456,, ".to_string()));
        assert_eq!(
            parsed.into_iter().collect::<Vec<_>>(),
            vec!["U123".to_string(), "U456".to_string()]
        );
    }

    #[test]
    fn org_level_install_requires_an_allowlist() {
        let config = EnvConfig {
            bot_token: "xoxb".to_string(),
            app_token: "xapp".to_string(),
            allowed_users: None,
            groups_path: PathBuf::from(DEFAULT_GROUPS_FILE),
            state_root: PathBuf::from(DEFAULT_STATE_ROOT),
        };
        let org_auth = AuthTestData {
            user_id: "UBOT".to_string(),
            team_id: None,
            enterprise_id: Some("E001".to_string()),
        };
        assert!(matches!(
            ensure_org_level_allowlist(&config, &org_auth),
            Err(ConfigError::AllowlistRequiredForOrgApp)
        ));

        let workspace_auth = AuthTestData {
            user_id: "UBOT".to_string(),
            team_id: Some("T001".to_string()),
            enterprise_id: None,
        };
        assert!(ensure_org_level_allowlist(&config, &workspace_auth).is_ok());
    }
}

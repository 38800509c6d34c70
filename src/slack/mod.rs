use serde::Deserialize;

pub mod api;
pub mod retry;
pub mod socket;

pub use api::SlackApiClient;
pub use retry::with_rate_limit_retry;

#[derive(Debug, thiserror::Error)]
pub enum SlackError {
    #[error("slack api request failed: {0}")]
    ApiRequest(String),
    #[error("slack api responded with error `{0}`")]
    ApiResponse(String),
    #[error("slack api rate limited; retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl SlackError {
    /// The remote error code for reply lines; transport failures keep their
    /// full description.
    pub fn code(&self) -> String {
        match self {
            SlackError::ApiResponse(code) => code.clone(),
            SlackError::RateLimited { .. } => "ratelimited".to_string(),
            SlackError::ApiRequest(detail) => detail.clone(),
        }
    }

    pub fn is_missing_scope(&self) -> bool {
        matches!(self, SlackError::ApiResponse(code) if code == "missing_scope")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct UserFlags {
    #[serde(default)]
    pub is_restricted: bool,
    #[serde(default)]
    pub is_ultra_restricted: bool,
    #[serde(default)]
    pub is_stranger: bool,
}

impl UserFlags {
    pub fn is_guest(&self) -> bool {
        self.is_restricted || self.is_ultra_restricted || self.is_stranger
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelFlags {
    #[serde(default)]
    pub is_shared: bool,
    #[serde(default)]
    pub is_ext_shared: bool,
    #[serde(default)]
    pub is_org_shared: bool,
}

impl ChannelFlags {
    pub fn is_external(&self) -> bool {
        self.is_shared || self.is_ext_shared || self.is_org_shared
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChannelListPage {
    pub channels: Vec<ChannelSummary>,
    pub next_cursor: Option<String>,
}

/// The directory/membership surface the resolution and invitation engine
/// consumes. `SlackApiClient` is the production implementation; tests
/// substitute scripted fakes.
pub trait SlackDirectory {
    fn user_info(&self, user_id: &str) -> Result<UserFlags, SlackError>;
    fn channel_info(&self, channel_id: &str) -> Result<ChannelFlags, SlackError>;
    fn list_channels_page(&self, cursor: Option<&str>) -> Result<ChannelListPage, SlackError>;
    fn join_channel(&self, channel_id: &str) -> Result<(), SlackError>;
    fn invite_user(&self, channel_id: &str, user_id: &str) -> Result<(), SlackError>;
}

use super::{
    ChannelFlags, ChannelListPage, ChannelSummary, SlackDirectory, SlackError, UserFlags,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";
const LIST_PAGE_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct SlackApiClient {
    api_base: String,
    bot_token: String,
    app_token: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    data: T,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct EmptyData {}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthTestData {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub enterprise_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenConnectionData {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ConversationsListData {
    #[serde(default)]
    channels: Vec<ChannelSummary>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[derive(Debug, Clone, Deserialize)]
struct UsersInfoData {
    #[serde(default)]
    user: UserFlags,
}

#[derive(Debug, Clone, Deserialize)]
struct ConversationsInfoData {
    #[serde(default)]
    channel: ChannelFlags,
}

fn parse_retry_after_secs(raw: &str) -> u64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value.max(1.0) as u64)
        .unwrap_or(1)
}

fn rate_limited_from(response: ureq::Response) -> SlackError {
    let retry_after_secs = response
        .header("Retry-After")
        .map(parse_retry_after_secs)
        .unwrap_or(1);
    SlackError::RateLimited { retry_after_secs }
}

fn request_error(err: ureq::Error) -> SlackError {
    match err {
        ureq::Error::Status(429, response) => rate_limited_from(response),
        other => SlackError::ApiRequest(other.to_string()),
    }
}

fn check_envelope(ok: bool, error: Option<String>, fallback: &str) -> Result<(), SlackError> {
    if ok {
        return Ok(());
    }
    let code = error.unwrap_or_else(|| fallback.to_string());
    if code == "ratelimited" {
        return Err(SlackError::RateLimited {
            retry_after_secs: 1,
        });
    }
    Err(SlackError::ApiResponse(code))
}

impl SlackApiClient {
    pub fn new(bot_token: String, app_token: String) -> Self {
        let api_base = std::env::var("INVITECLAW_SLACK_API_BASE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string());
        Self {
            api_base,
            bot_token,
            app_token,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), path)
    }

    fn get_with_token<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<T, SlackError> {
        let mut url = self.endpoint(path);
        if !query.is_empty() {
            let encoded = query
                .iter()
                .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url = format!("{url}?{encoded}");
        }

        let response = ureq::get(&url)
            .set("Authorization", &format!("Bearer {token}"))
            .call()
            .map_err(request_error)?;

        response
            .into_json::<T>()
            .map_err(|e| SlackError::ApiRequest(e.to_string()))
    }

    fn post_json_with_token<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
        token: &str,
    ) -> Result<T, SlackError> {
        let url = self.endpoint(path);
        let response = ureq::post(&url)
            .set("Authorization", &format!("Bearer {token}"))
            .send_json(
                serde_json::to_value(body).map_err(|e| SlackError::ApiRequest(e.to_string()))?,
            )
            .map_err(request_error)?;

        response
            .into_json::<T>()
            .map_err(|e| SlackError::ApiRequest(e.to_string()))
    }

    pub fn auth_test(&self) -> Result<AuthTestData, SlackError> {
        let envelope: SlackEnvelope<AuthTestData> =
            self.get_with_token("auth.test", &[], &self.bot_token)?;
        check_envelope(envelope.ok, envelope.error, "auth.test failed")?;
        Ok(envelope.data)
    }

    pub fn open_socket_connection_url(&self) -> Result<String, SlackError> {
        let envelope: SlackEnvelope<OpenConnectionData> =
            self.post_json_with_token("apps.connections.open", &json!({}), &self.app_token)?;
        check_envelope(envelope.ok, envelope.error, "apps.connections.open failed")?;
        Ok(envelope.data.url)
    }

    pub fn post_message(
        &self,
        channel_id: &str,
        thread_ts: Option<&str>,
        message: &str,
    ) -> Result<(), SlackError> {
        let mut body = json!({
            "channel": channel_id,
            "text": message,
        });
        if let Some(thread_ts) = thread_ts.filter(|v| !v.trim().is_empty()) {
            body["thread_ts"] = json!(thread_ts);
        }
        let envelope: SlackEnvelope<EmptyData> =
            self.post_json_with_token("chat.postMessage", &body, &self.bot_token)?;
        check_envelope(envelope.ok, envelope.error, "chat.postMessage failed")
    }
}

impl SlackDirectory for SlackApiClient {
    fn user_info(&self, user_id: &str) -> Result<UserFlags, SlackError> {
        let query = vec![("user", user_id.to_string())];
        let envelope: SlackEnvelope<UsersInfoData> =
            self.get_with_token("users.info", &query, &self.bot_token)?;
        check_envelope(envelope.ok, envelope.error, "users.info failed")?;
        Ok(envelope.data.user)
    }

    fn channel_info(&self, channel_id: &str) -> Result<ChannelFlags, SlackError> {
        let query = vec![("channel", channel_id.to_string())];
        let envelope: SlackEnvelope<ConversationsInfoData> =
            self.get_with_token("conversations.info", &query, &self.bot_token)?;
        check_envelope(envelope.ok, envelope.error, "conversations.info failed")?;
        Ok(envelope.data.channel)
    }

    fn list_channels_page(&self, cursor: Option<&str>) -> Result<ChannelListPage, SlackError> {
        let mut query = vec![
            ("types", "public_channel,private_channel".to_string()),
            ("limit", LIST_PAGE_LIMIT.to_string()),
        ];
        if let Some(cursor) = cursor.filter(|v| !v.trim().is_empty()) {
            query.push(("cursor", cursor.to_string()));
        }

        let envelope: SlackEnvelope<ConversationsListData> =
            self.get_with_token("conversations.list", &query, &self.bot_token)?;
        check_envelope(envelope.ok, envelope.error, "conversations.list failed")?;
        let data = envelope.data;
        let next_cursor = Some(data.response_metadata.next_cursor)
            .filter(|cursor| !cursor.trim().is_empty());
        Ok(ChannelListPage {
            channels: data.channels,
            next_cursor,
        })
    }

    fn join_channel(&self, channel_id: &str) -> Result<(), SlackError> {
        let body = json!({ "channel": channel_id });
        let envelope: SlackEnvelope<EmptyData> =
            self.post_json_with_token("conversations.join", &body, &self.bot_token)?;
        check_envelope(envelope.ok, envelope.error, "conversations.join failed")
    }

    fn invite_user(&self, channel_id: &str, user_id: &str) -> Result<(), SlackError> {
        let body = json!({ "channel": channel_id, "users": user_id });
        let envelope: SlackEnvelope<EmptyData> =
            self.post_json_with_token("conversations.invite", &body, &self.bot_token)?;
        check_envelope(envelope.ok, envelope.error, "conversations.invite failed")
    }
}

use super::{with_rate_limit_retry, SlackApiClient, SlackError};
use crate::handler::{MentionEvent, MentionHandler};
use serde::Deserialize;
use serde_json::json;
use std::net::TcpStream;
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{connect, Message, WebSocket};

pub const DEFAULT_RECONNECT_BACKOFF_MS: u64 = 3_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryClass {
    Retryable,
    NonRetryable,
}

#[derive(Debug, Deserialize)]
struct SocketEnvelope {
    #[serde(default)]
    envelope_id: Option<String>,
    #[serde(default)]
    payload: Option<SocketPayload>,
}

#[derive(Debug, Deserialize)]
struct SocketPayload {
    #[serde(default)]
    event: Option<SocketEvent>,
}

#[derive(Debug, Deserialize)]
struct SocketEvent {
    #[serde(default)]
    r#type: String,
    #[serde(default)]
    channel: String,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    ts: String,
    #[serde(default)]
    thread_ts: Option<String>,
}

fn classify_socket_failure(message: &str) -> RetryClass {
    let lower = message.to_ascii_lowercase();
    if [
        "invalid_auth",
        "not_authed",
        "token_revoked",
        "account_inactive",
        "missing_scope",
        "403",
        "401",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
    {
        RetryClass::NonRetryable
    } else {
        RetryClass::Retryable
    }
}

fn format_socket_error(context: &str, detail: &str, class: RetryClass) -> String {
    let class = match class {
        RetryClass::Retryable => "retryable",
        RetryClass::NonRetryable => "non_retryable",
    };
    format!("{context} ({class}): {detail}")
}

fn reconnect_jitter(backoff: Duration) -> Duration {
    let ceiling = backoff.min(Duration::from_millis(500)).as_millis() as u64;
    if ceiling == 0 {
        return Duration::ZERO;
    }
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|value| value.as_nanos() as u64)
        .unwrap_or(0);
    Duration::from_millis(seed % (ceiling + 1))
}

fn sleep_reconnect(backoff: Duration) {
    thread::sleep(backoff + reconnect_jitter(backoff));
}

fn mention_event_from_socket(event: SocketEvent) -> Option<MentionEvent> {
    if event.r#type != "app_mention" {
        return None;
    }
    if event.channel.trim().is_empty() || event.ts.trim().is_empty() {
        return None;
    }
    let user_id = event.user.filter(|v| !v.trim().is_empty())?;
    if event.bot_id.is_some() {
        return None;
    }
    let thread_ts = event.thread_ts.unwrap_or_else(|| event.ts.clone());
    Some(MentionEvent {
        text: event.text.unwrap_or_default(),
        user_id,
        channel_id: event.channel,
        thread_ts,
    })
}

/// Connects to Slack Socket Mode and handles mentions until a
/// non-retryable failure. Each mention is processed to completion before
/// the next frame is read.
pub fn run_socket_loop(
    handler: &MentionHandler<SlackApiClient>,
    reconnect_backoff_ms: u64,
) -> Result<(), SlackError> {
    let reconnect_backoff = Duration::from_millis(reconnect_backoff_ms.max(1));

    loop {
        let url = match handler.api.open_socket_connection_url() {
            Ok(url) => url,
            Err(err) => {
                let class = classify_socket_failure(&err.to_string());
                let message = format_socket_error("socket url open failed", &err.to_string(), class);
                handler.log.error("socket", &message);
                if class == RetryClass::NonRetryable {
                    return Err(SlackError::ApiRequest(message));
                }
                sleep_reconnect(reconnect_backoff);
                continue;
            }
        };

        let mut socket = match connect(url.as_str()) {
            Ok((socket, _)) => socket,
            Err(err) => {
                let class = classify_socket_failure(&err.to_string());
                let message = format_socket_error("socket connect failed", &err.to_string(), class);
                handler.log.error("socket", &message);
                if class == RetryClass::NonRetryable {
                    return Err(SlackError::ApiRequest(message));
                }
                sleep_reconnect(reconnect_backoff);
                continue;
            }
        };
        handler.log.info("socket", "socket mode connected");

        process_connection(handler, &mut socket)?;
        sleep_reconnect(reconnect_backoff);
    }
}

fn process_connection(
    handler: &MentionHandler<SlackApiClient>,
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
) -> Result<(), SlackError> {
    loop {
        match socket.read() {
            Ok(Message::Text(text)) => {
                handle_socket_text(handler, socket, text.as_str());
            }
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload));
            }
            Ok(Message::Pong(_)) | Ok(Message::Binary(_)) | Ok(Message::Frame(_)) => {}
            Ok(Message::Close(_)) | Err(tungstenite::Error::ConnectionClosed) => {
                let _ = socket.close(None);
                return Ok(());
            }
            Err(err) => {
                let class = classify_socket_failure(&err.to_string());
                let message = format_socket_error("socket read failed", &err.to_string(), class);
                handler.log.error("socket", &message);
                let _ = socket.close(None);
                if class == RetryClass::NonRetryable {
                    return Err(SlackError::ApiRequest(message));
                }
                return Ok(());
            }
        }
    }
}

fn handle_socket_text(
    handler: &MentionHandler<SlackApiClient>,
    socket: &mut WebSocket<MaybeTlsStream<TcpStream>>,
    text: &str,
) {
    let Ok(envelope) = serde_json::from_str::<SocketEnvelope>(text) else {
        return;
    };

    if let Some(envelope_id) = envelope.envelope_id {
        let ack = json!({ "envelope_id": envelope_id }).to_string();
        let _ = socket.send(Message::Text(ack));
    }

    let Some(event) = envelope.payload.and_then(|payload| payload.event) else {
        return;
    };
    let Some(mention) = mention_event_from_socket(event) else {
        return;
    };

    let channel_id = mention.channel_id.clone();
    let thread_ts = mention.thread_ts.clone();
    for batch in handler.handle(&mention) {
        let delivery = with_rate_limit_retry(|| {
            handler
                .api
                .post_message(&channel_id, Some(&thread_ts), &batch)
        });
        if let Err(err) = delivery {
            handler.log.error(
                "reply_delivery",
                &format!("failed to deliver reply to {channel_id}: {err}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_event() -> SocketEvent {
        SocketEvent {
            r#type: "app_mention".to_string(),
            channel: "C001".to_string(),
            user: Some("U123".to_string()),
            bot_id: None,
            text: Some("<@UBOT> list".to_string()),
            ts: "200.0".to_string(),
            thread_ts: None,
        }
    }

    #[test]
    fn app_mentions_become_mention_events() {
        let mention = mention_event_from_socket(base_event()).expect("mention");
        assert_eq!(mention.channel_id, "C001");
        assert_eq!(mention.user_id, "U123");
        assert_eq!(mention.thread_ts, "200.0");
    }

    #[test]
    fn thread_replies_keep_their_thread() {
        let mut event = base_event();
        event.thread_ts = Some("100.0".to_string());
        let mention = mention_event_from_socket(event).expect("mention");
        assert_eq!(mention.thread_ts, "100.0");
    }

    #[test]
    fn non_mention_and_bot_events_are_ignored() {
        let mut message_event = base_event();
        message_event.r#type = "message".to_string();
        assert!(mention_event_from_socket(message_event).is_none());

        let mut bot_event = base_event();
        bot_event.bot_id = Some("B001".to_string());
        assert!(mention_event_from_socket(bot_event).is_none());

        let mut anonymous_event = base_event();
        anonymous_event.user = None;
        assert!(mention_event_from_socket(anonymous_event).is_none());
    }

    #[test]
    fn socket_error_classification_marks_auth_errors_non_retryable() {
        assert_eq!(
            classify_socket_failure("invalid_auth while opening socket"),
            RetryClass::NonRetryable
        );
        assert_eq!(
            classify_socket_failure("temporary dns resolution failure"),
            RetryClass::Retryable
        );
    }

    #[test]
    fn socket_error_message_includes_details_and_classification() {
        let message = format_socket_error(
            "socket connect failed",
            "tls handshake eof",
            RetryClass::Retryable,
        );
        assert!(message.contains("socket connect failed"));
        assert!(message.contains("tls handshake eof"));
        assert!(message.contains("retryable"));
    }
}

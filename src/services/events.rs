//! Test event publishing through Soketi's HTTP events API.
//!
//! Requests are signed with the target app's own key and secret using the
//! Pusher REST authentication scheme, so a successful publish also proves
//! the credentials are live on the server.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{debug, info};

use crate::config::SoketiSettings;
use crate::error::{ManagerError, Result};

const MAX_NAME_LENGTH: usize = 200;

/// Body of `POST /api/send-event`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEventRequest {
    pub app_id: Option<String>,
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    pub channel: Option<String>,
    pub event: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// A request with every required field present
#[derive(Debug, Clone)]
pub struct TestEvent {
    pub app_id: String,
    pub app_key: String,
    pub app_secret: String,
    pub channel: String,
    pub event: String,
    pub data: Value,
}

impl TryFrom<TestEventRequest> for TestEvent {
    type Error = ManagerError;

    fn try_from(request: TestEventRequest) -> Result<Self> {
        let present = |value: Option<String>| value.filter(|v| !v.is_empty());
        let event = match (
            present(request.app_id),
            present(request.app_key),
            present(request.app_secret),
            present(request.channel),
            present(request.event),
        ) {
            (Some(app_id), Some(app_key), Some(app_secret), Some(channel), Some(event)) => TestEvent {
                app_id,
                app_key,
                app_secret,
                channel,
                event,
                data: request.data,
            },
            _ => {
                return Err(ManagerError::validation(
                    "Missing required fields: appId, appKey, appSecret, channel, event",
                ))
            }
        };

        // Both travel unencoded in the signed URL.
        for (field, value) in [("appId", &event.app_id), ("appKey", &event.app_key)] {
            if !is_url_safe(value) {
                return Err(ManagerError::validation(format!(
                    "Invalid {} '{}'",
                    field, value
                )));
            }
        }
        if !is_valid_channel(&event.channel) {
            return Err(ManagerError::validation(format!(
                "Invalid channel name '{}'",
                event.channel
            )));
        }
        if event.event.len() > MAX_NAME_LENGTH {
            return Err(ManagerError::validation(format!(
                "Event name longer than {} characters",
                MAX_NAME_LENGTH
            )));
        }

        Ok(event)
    }
}

fn is_valid_channel(channel: &str) -> bool {
    channel.len() <= MAX_NAME_LENGTH
        && channel
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-=@,.;".contains(c))
}

fn is_url_safe(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_-.".contains(c))
}

/// Client for Soketi's `/apps/{id}/events` endpoint
#[derive(Debug, Clone)]
pub struct EventPublisher {
    client: reqwest::Client,
    base_url: String,
}

impl EventPublisher {
    pub fn new(settings: &SoketiSettings) -> Self {
        Self::with_base_url(format!("http://{}:{}", settings.host, settings.port))
    }

    pub fn with_base_url<S: Into<String>>(base_url: S) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Publish one event; returns the confirmation message
    pub async fn publish(&self, event: &TestEvent) -> Result<String> {
        let body = json!({
            "name": event.event,
            "channels": [event.channel],
            "data": encode_data(&event.data),
        })
        .to_string();

        let path = format!("/apps/{}/events", event.app_id);
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let query = signed_query(&event.app_key, &event.app_secret, &path, &body, &timestamp)?;
        let url = format!("{}{}?{}", self.base_url, path, query);

        debug!("Publishing '{}' on '{}' via {}", event.event, event.channel, path);
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ManagerError::Internal(anyhow::anyhow!(
                "Soketi rejected the event ({}): {}",
                status,
                detail.trim()
            )));
        }

        info!("📨 Sent test event '{}' to channel '{}'", event.event, event.channel);
        Ok(format!(
            "Event \"{}\" sent to channel \"{}\"",
            event.event, event.channel
        ))
    }
}

/// Event payloads travel as strings; non-string data is JSON-encoded
fn encode_data(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Query string with auth parameters and the trailing `auth_signature`
pub fn signed_query(key: &str, secret: &str, path: &str, body: &str, timestamp: &str) -> Result<String> {
    let mut params = BTreeMap::new();
    params.insert("auth_key", key.to_string());
    params.insert("auth_timestamp", timestamp.to_string());
    params.insert("auth_version", "1.0".to_string());
    params.insert("body_md5", format!("{:x}", md5::compute(body)));

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let signature = sign(secret, &format!("POST\n{}\n{}", path, query))?;
    Ok(format!("{}&auth_signature={}", query, signature))
}

fn sign(secret: &str, payload: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| ManagerError::Internal(anyhow::anyhow!("Invalid signing key: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

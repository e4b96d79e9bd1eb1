use serde::Deserialize;

/// Error body returned by the REST layer on non-2xx responses.
#[derive(Clone, Debug, Default, Deserialize)]
pub(in crate::gateway) struct RemoteErrorBody {
    #[serde(default)]
    pub(in crate::gateway) message: Option<String>,
    #[serde(default)]
    pub(in crate::gateway) code: Option<String>,
    #[serde(default)]
    pub(in crate::gateway) details: Option<String>,
    #[serde(default)]
    pub(in crate::gateway) hint: Option<String>,
    // Some gateways in front of the REST layer answer with {"error": "..."}.
    #[serde(default)]
    pub(in crate::gateway) error: Option<String>,
}

pub(in crate::gateway) fn parse_error_body(raw: &str) -> RemoteErrorBody {
    serde_json::from_str::<RemoteErrorBody>(raw).unwrap_or_default()
}

/// Picks the message shown to the user: the service's own message when it
/// sent one, the raw body when it is short plain text, otherwise the HTTP
/// reason phrase.
pub(in crate::gateway) fn remote_message(body: &RemoteErrorBody, raw: &str, status: u16) -> String {
    if let Some(msg) = body.message.as_deref().filter(|m| !m.trim().is_empty()) {
        return msg.to_string();
    }
    if let Some(msg) = body.error.as_deref().filter(|m| !m.trim().is_empty()) {
        return msg.to_string();
    }
    let raw = raw.trim();
    if !raw.is_empty() && raw.len() <= 200 && !raw.starts_with('{') && !raw.starts_with('<') {
        return raw.to_string();
    }
    let reason = reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("request failed");
    format!("{status} {reason}")
}

/// Total row count from a `Content-Range` header such as `0-24/57` or `*/0`.
pub(in crate::gateway) fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}

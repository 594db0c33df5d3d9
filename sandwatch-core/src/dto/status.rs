//! Status DTOs returned by `GET /status/{id}`

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One status report for a job
///
/// `status` is the backend's raw vocabulary
/// (`pending|running|starting|completed|failed|error`). Interactive sessions
/// also report where their display can be reached; the older `novnc_port`,
/// `vnc_port` and `vnc_password` names are accepted as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, alias = "novnc_port", skip_serializing_if = "Option::is_none")]
    pub display_port: Option<u16>,
    #[serde(default, alias = "vnc_port", skip_serializing_if = "Option::is_none")]
    pub direct_port: Option<u16>,
    #[serde(default, alias = "vnc_password", skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Any other fields the backend attached
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl StatusPayload {
    /// Payload carrying only a status string
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            message: None,
            host: None,
            display_port: None,
            direct_port: None,
            auth_token: None,
            extra: HashMap::new(),
        }
    }

    /// Names of the connection fields that are absent or empty
    pub fn missing_connection_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.host.as_deref().is_none_or(str::is_empty) {
            missing.push("host");
        }
        if self.display_port.is_none() {
            missing.push("displayPort");
        }
        if self.direct_port.is_none() {
            missing.push("directPort");
        }
        if self.auth_token.as_deref().is_none_or(str::is_empty) {
            missing.push("authToken");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_interactive_payload() {
        let payload: StatusPayload = serde_json::from_str(
            r#"{"status":"running","host":"10.0.0.5","displayPort":6080,"directPort":5900,"authToken":"tok","container":"c1"}"#,
        )
        .unwrap();

        assert_eq!(payload.status, "running");
        assert_eq!(payload.host.as_deref(), Some("10.0.0.5"));
        assert_eq!(payload.display_port, Some(6080));
        assert_eq!(payload.direct_port, Some(5900));
        assert_eq!(payload.auth_token.as_deref(), Some("tok"));
        assert_eq!(payload.extra.get("container"), Some(&serde_json::json!("c1")));
        assert!(payload.missing_connection_fields().is_empty());
    }

    #[test]
    fn test_parse_legacy_vnc_names() {
        let payload: StatusPayload = serde_json::from_str(
            r#"{"status":"running","host":"h","novnc_port":6080,"vnc_port":5900,"vnc_password":"pw"}"#,
        )
        .unwrap();

        assert_eq!(payload.display_port, Some(6080));
        assert_eq!(payload.direct_port, Some(5900));
        assert_eq!(payload.auth_token.as_deref(), Some("pw"));
    }

    #[test]
    fn test_status_is_required() {
        assert!(serde_json::from_str::<StatusPayload>(r#"{"message":"hi"}"#).is_err());
    }

    #[test]
    fn test_missing_connection_fields() {
        let mut payload = StatusPayload::with_status("running");
        payload.host = Some(String::new());
        payload.display_port = Some(6080);

        assert_eq!(
            payload.missing_connection_fields(),
            vec!["host", "directPort", "authToken"]
        );
    }
}

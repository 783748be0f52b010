//! Probe results as stored, served and persisted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Synthetic code recorded when the request could not be sent or answered.
pub const TRANSPORT_ERROR_CODE: u16 = 999;

/// Synthetic code recorded when the response body could not be read.
pub const BODY_READ_ERROR_CODE: u16 = 998;

/// Verdict for one endpoint.
///
/// The aliases accept the colour names older cache files were written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    #[serde(alias = "green")]
    Healthy,
    #[serde(alias = "yellow")]
    Degraded,
    #[serde(alias = "red")]
    Down,
    #[serde(alias = "grey")]
    Inactive,
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultStatus::Healthy => write!(f, "healthy"),
            ResultStatus::Degraded => write!(f, "degraded"),
            ResultStatus::Down => write!(f, "down"),
            ResultStatus::Inactive => write!(f, "inactive"),
        }
    }
}

/// Latest probe outcome for one resolved endpoint URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointResult {
    pub status: ResultStatus,
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub content_type: String,
    #[serde(default, with = "base64_bytes")]
    pub body: Vec<u8>,
    #[serde(rename = "request_duration", default)]
    pub request_duration_seconds: f64,
    pub updated: DateTime<Utc>,
}

impl EndpointResult {
    pub fn inactive(at: DateTime<Utc>) -> Self {
        Self {
            status: ResultStatus::Inactive,
            code: 0,
            content_type: String::new(),
            body: Vec::new(),
            request_duration_seconds: 0.0,
            updated: at,
        }
    }
}

/// Bodies travel as base64 strings; `null` decodes to an empty body.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        assert_eq!(ResultStatus::Healthy.to_string(), "healthy");
        assert_eq!(ResultStatus::Degraded.to_string(), "degraded");
        assert_eq!(ResultStatus::Down.to_string(), "down");
        assert_eq!(ResultStatus::Inactive.to_string(), "inactive");
    }

    #[test]
    fn test_legacy_colour_names_are_accepted() {
        let status: ResultStatus = serde_json::from_str("\"green\"").unwrap();
        assert_eq!(status, ResultStatus::Healthy);
        let status: ResultStatus = serde_json::from_str("\"red\"").unwrap();
        assert_eq!(status, ResultStatus::Down);
        let status: ResultStatus = serde_json::from_str("\"grey\"").unwrap();
        assert_eq!(status, ResultStatus::Inactive);
    }

    #[test]
    fn test_body_is_base64_encoded() {
        let mut result = EndpointResult::inactive(Utc::now());
        result.body = b"OK".to_vec();

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["body"], "T0s=");
        assert_eq!(value["status"], "inactive");
        assert!(value.get("request_duration").is_some());
    }

    #[test]
    fn test_null_body_decodes_to_empty() {
        let json = r#"{
            "status": "red",
            "code": 999,
            "content_type": "",
            "body": null,
            "request_duration": 0.5,
            "updated": "2024-03-01T10:00:00Z"
        }"#;

        let result: EndpointResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.status, ResultStatus::Down);
        assert_eq!(result.code, TRANSPORT_ERROR_CODE);
        assert!(result.body.is_empty());
    }
}

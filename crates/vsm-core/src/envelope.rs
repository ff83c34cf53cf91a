//! The wire envelope every broker message carries.
//!
//! Required headers: `type`, `id`, `ts`. Correlation messages add
//! `correlation_id` / `reply_to`. The body itself is UTF-8 JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub message_type: String,
    pub id: Uuid,
    pub ts: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub reply_to: Option<String>,
    pub body: T,
}

impl<T> Envelope<T> {
    pub fn new(message_type: impl Into<String>, body: T) -> Self {
        Self {
            message_type: message_type.into(),
            id: Uuid::new_v4(),
            ts: Utc::now(),
            correlation_id: None,
            reply_to: None,
            body,
        }
    }

    pub fn with_correlation(mut self, correlation_id: Uuid, reply_to: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id);
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error>
    where
        T: Serialize,
    {
        serde_json::to_vec(self)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error>
    where
        T: for<'de> Deserialize<'de>,
    {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let env = Envelope::new("command", serde_json::json!({"k": "v"}));
        let bytes = env.to_json_bytes().unwrap();
        let back: Envelope<serde_json::Value> = Envelope::from_json_bytes(&bytes).unwrap();
        assert_eq!(back.message_type, "command");
        assert_eq!(back.body, serde_json::json!({"k": "v"}));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved event names understood by the push engine and its clients.
pub mod names {
    /// Synthetic keep-alive event. Distinguishable from domain events by name only.
    pub const HEARTBEAT: &str = "heartbeat";
    /// First frame written to every new stream.
    pub const CONNECTION_ESTABLISHED: &str = "connection.established";
    /// Allow-list marker meaning "every event".
    pub const WILDCARD: &str = "*";
}

/// Error severity carried by error-condition events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Annotations attached to an event.
///
/// The correlation fields are the ones structured filters target, so they
/// are typed. Anything else rides along in `extra` and is never inspected
/// by the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventMetadata {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.account_id.is_none()
            && self.campaign_id.is_none()
            && self.job_type.is_none()
            && self.severity.is_none()
            && self.extra.is_empty()
    }
}

/// One unit pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Echoed on the wire so clients can send it back as a resume hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Empty only for synthetic events that get stamped per connection.
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Reconnection backoff hint for the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_ms: Option<u64>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

impl Event {
    pub fn new(name: impl Into<String>, tenant_id: impl Into<String>, payload: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            payload,
            timestamp: Utc::now(),
            tenant_id: tenant_id.into(),
            user_id: None,
            retry_ms: None,
            metadata: EventMetadata::default(),
        }
    }

    /// Heartbeat with no tenant; the engine stamps it for each connection.
    pub fn heartbeat() -> Self {
        Self::new(names::HEARTBEAT, "", Value::Object(Map::new()))
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_retry_ms(mut self, retry_ms: u64) -> Self {
        self.retry_ms = Some(retry_ms);
        self
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_heartbeat(&self) -> bool {
        self.name == names::HEARTBEAT
    }

    /// Copy of this event scoped to the given connection identity.
    pub fn stamped(&self, tenant_id: &str, user_id: Option<&str>) -> Self {
        let mut stamped = self.clone();
        stamped.tenant_id = tenant_id.to_string();
        stamped.user_id = user_id.map(str::to_string);
        stamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_keeps_unknown_keys_in_extra() {
        let metadata: EventMetadata = serde_json::from_value(json!({
            "customerId": "c-1",
            "severity": "high",
            "source": "hubspot"
        }))
        .unwrap();

        assert_eq!(metadata.customer_id.as_deref(), Some("c-1"));
        assert_eq!(metadata.severity, Some(Severity::High));
        assert_eq!(metadata.extra.get("source"), Some(&json!("hubspot")));
        assert!(!metadata.extra.contains_key("customerId"));
    }

    #[test]
    fn test_empty_metadata_serializes_to_empty_object() {
        let metadata = EventMetadata::default();
        assert!(metadata.is_empty());
        assert_eq!(serde_json::to_value(&metadata).unwrap(), json!({}));
    }

    #[test]
    fn test_heartbeat_is_unscoped_and_recognized_by_name() {
        let heartbeat = Event::heartbeat();
        assert!(heartbeat.is_heartbeat());
        assert!(heartbeat.tenant_id.is_empty());
        assert!(!Event::new("customer.created", "t1", json!({})).is_heartbeat());
    }

    #[test]
    fn test_stamped_overrides_tenant_and_user() {
        let stamped = Event::heartbeat().stamped("t9", Some("u3"));
        assert_eq!(stamped.tenant_id, "t9");
        assert_eq!(stamped.user_id.as_deref(), Some("u3"));

        let anonymous = Event::new("x", "t1", json!({}))
            .for_user("u1")
            .stamped("t1", None);
        assert_eq!(anonymous.user_id, None);
    }

    #[test]
    fn test_event_deserializes_with_defaults() {
        let event: Event = serde_json::from_value(json!({
            "name": "campaign.updated",
            "tenantId": "t1",
            "payload": {"campaignId": "k1"}
        }))
        .unwrap();

        assert_eq!(event.name, "campaign.updated");
        assert_eq!(event.user_id, None);
        assert_eq!(event.retry_ms, None);
        assert!(event.metadata.is_empty());
    }
}

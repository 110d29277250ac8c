//! Delivery filters.
//!
//! Two independent layers decide whether an event reaches a connection:
//!
//! 1. The connection's own allow-list of event names ([`allows`]).
//! 2. A sender-supplied [`EventFilter`], only on the filtered send path.
//!
//! A connection's subscription preference and a sender's targeting never
//! interfere with each other; both must pass where both apply.

use events::{names, Event, Severity};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Connection allow-list check. An empty list subscribes to everything.
pub fn allows(event_filters: &[String], event_name: &str) -> bool {
    event_filters.is_empty()
        || event_filters
            .iter()
            .any(|filter| filter == event_name || filter == names::WILDCARD)
}

/// Parses a comma-separated allow-list as sent by clients at connect time.
pub fn parse_filter_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Sender-side targeting constraints.
///
/// Every constraint that is present and non-empty must match; anything
/// left empty is not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    #[serde(default)]
    pub event_names: Vec<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub job_types: Vec<String>,
    #[serde(default)]
    pub severities: Vec<Severity>,
}

impl EventFilter {
    /// Checks every constraint against the event.
    ///
    /// Correlation fields are read from the typed metadata first and fall
    /// back to the same camelCase key in the payload, so
    /// `{"customerId": "c-42"}` in the payload satisfies `customer_id`.
    pub fn matches(&self, event: &Event) -> bool {
        let metadata = &event.metadata;

        one_of(&self.event_names, Some(event.name.as_str()))
            && equals(
                &self.customer_id,
                correlation(event, &metadata.customer_id, "customerId"),
            )
            && equals(
                &self.account_id,
                correlation(event, &metadata.account_id, "accountId"),
            )
            && equals(
                &self.campaign_id,
                correlation(event, &metadata.campaign_id, "campaignId"),
            )
            && one_of(
                &self.job_types,
                correlation(event, &metadata.job_type, "jobType"),
            )
            && (self.severities.is_empty()
                || severity(event).is_some_and(|actual| self.severities.contains(&actual)))
    }
}

fn correlation<'a>(event: &'a Event, typed: &'a Option<String>, key: &str) -> Option<&'a str> {
    typed
        .as_deref()
        .or_else(|| event.payload.get(key).and_then(Value::as_str))
}

fn severity(event: &Event) -> Option<Severity> {
    event.metadata.severity.or_else(|| {
        event
            .payload
            .get("severity")
            .and_then(|value| Severity::deserialize(value).ok())
    })
}

fn equals(constraint: &Option<String>, actual: Option<&str>) -> bool {
    match constraint.as_deref() {
        None | Some("") => true,
        Some(expected) => actual == Some(expected),
    }
}

fn one_of(allowed: &[String], actual: Option<&str>) -> bool {
    allowed.is_empty() || actual.is_some_and(|value| allowed.iter().any(|a| a == value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::EventMetadata;
    use serde_json::json;

    fn filters(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    fn campaign_event() -> Event {
        Event::new("campaign.updated", "t1", json!({})).with_metadata(EventMetadata {
            campaign_id: Some("k-1".to_string()),
            customer_id: Some("c-1".to_string()),
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_allow_list_accepts_everything() {
        assert!(allows(&[], "customer.created"));
        assert!(allows(&[], names::HEARTBEAT));
    }

    #[test]
    fn test_allow_list_requires_exact_name() {
        let list = filters(&["campaign.updated"]);
        assert!(allows(&list, "campaign.updated"));
        assert!(!allows(&list, "campaign.updated.v2"));
        assert!(!allows(&list, "customer.created"));
    }

    #[test]
    fn test_heartbeats_are_not_exempt_from_allow_list() {
        assert!(!allows(&filters(&["campaign.updated"]), names::HEARTBEAT));
        assert!(allows(
            &filters(&["campaign.updated", names::HEARTBEAT]),
            names::HEARTBEAT
        ));
    }

    #[test]
    fn test_wildcard_accepts_everything() {
        assert!(allows(&filters(&["job.progress", "*"]), "anything.at.all"));
    }

    #[test]
    fn test_parse_filter_list_trims_and_drops_blanks() {
        assert_eq!(
            parse_filter_list(" customer.created, ,job.progress,"),
            filters(&["customer.created", "job.progress"])
        );
        assert!(parse_filter_list("").is_empty());
    }

    #[test]
    fn test_default_event_filter_matches_everything() {
        assert!(EventFilter::default().matches(&campaign_event()));
        assert!(EventFilter::default().matches(&Event::heartbeat()));
    }

    #[test]
    fn test_all_present_constraints_must_match() {
        let filter = EventFilter {
            event_names: filters(&["campaign.updated"]),
            campaign_id: Some("k-1".to_string()),
            customer_id: Some("c-1".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&campaign_event()));

        let other_customer = EventFilter {
            customer_id: Some("c-2".to_string()),
            ..filter.clone()
        };
        assert!(!other_customer.matches(&campaign_event()));
    }

    #[test]
    fn test_constraint_on_missing_field_does_not_match() {
        let filter = EventFilter {
            account_id: Some("a-1".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&campaign_event()));
    }

    #[test]
    fn test_empty_string_constraint_is_ignored() {
        let filter = EventFilter {
            account_id: Some(String::new()),
            ..Default::default()
        };
        assert!(filter.matches(&campaign_event()));
    }

    #[test]
    fn test_job_type_and_severity_sets() {
        let failed_import = Event::new("job.failed", "t1", json!({})).with_metadata(
            EventMetadata {
                job_type: Some("import".to_string()),
                severity: Some(Severity::High),
                ..Default::default()
            },
        );

        let filter = EventFilter {
            job_types: filters(&["import", "export"]),
            severities: vec![Severity::High, Severity::Critical],
            ..Default::default()
        };
        assert!(filter.matches(&failed_import));

        let low_only = EventFilter {
            severities: vec![Severity::Low],
            ..Default::default()
        };
        assert!(!low_only.matches(&failed_import));
    }

    #[test]
    fn test_correlation_fields_fall_back_to_the_payload() {
        let updated = Event::new(
            "customer.updated",
            "t1",
            json!({"customerId": "c-42", "jobType": "import", "severity": "high"}),
        );

        let filter = EventFilter {
            customer_id: Some("c-42".to_string()),
            job_types: filters(&["import"]),
            severities: vec![Severity::High],
            ..Default::default()
        };
        assert!(filter.matches(&updated));

        let other_customer = EventFilter {
            customer_id: Some("c-7".to_string()),
            ..Default::default()
        };
        assert!(!other_customer.matches(&updated));
    }

    #[test]
    fn test_typed_metadata_wins_over_payload() {
        let event = Event::new("customer.updated", "t1", json!({"customerId": "c-payload"}))
            .with_metadata(EventMetadata {
                customer_id: Some("c-typed".to_string()),
                ..Default::default()
            });

        let typed = EventFilter {
            customer_id: Some("c-typed".to_string()),
            ..Default::default()
        };
        let payload = EventFilter {
            customer_id: Some("c-payload".to_string()),
            ..Default::default()
        };
        assert!(typed.matches(&event));
        assert!(!payload.matches(&event));
    }

    #[test]
    fn test_unrecognised_payload_severity_does_not_match() {
        let event = Event::new("error.occurred", "t1", json!({"severity": "apocalyptic"}));
        let filter = EventFilter {
            severities: vec![Severity::Critical],
            ..Default::default()
        };
        assert!(!filter.matches(&event));
    }

    #[test]
    fn test_event_filter_deserializes_from_camel_case() {
        let filter: EventFilter = serde_json::from_value(json!({
            "eventNames": ["job.failed"],
            "severities": ["critical"]
        }))
        .unwrap();
        assert_eq!(filter.event_names, filters(&["job.failed"]));
        assert_eq!(filter.severities, vec![Severity::Critical]);
        assert_eq!(filter.customer_id, None);
    }
}

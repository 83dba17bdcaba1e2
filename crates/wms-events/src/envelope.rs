//! The closed realtime event-type set and envelope validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use wms_core::WmsError;

/// The closed set of realtime event types. The core
/// emits `TaskAssigned`, `TaskUpdated`, and `OperatorStatusUpdated`; the
/// remaining two are published by the out-of-scope presence/UI layer but
/// still validated and routed here since they share the same bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RealtimeEventType {
    #[serde(rename = "TASK_ASSIGNED")]
    TaskAssigned,
    #[serde(rename = "TASK_UPDATED")]
    TaskUpdated,
    #[serde(rename = "OPERATOR_STATUS_UPDATED")]
    OperatorStatusUpdated,
    #[serde(rename = "USER_PRESENCE_UPDATED")]
    UserPresenceUpdated,
    #[serde(rename = "USER_LIST_UPDATED")]
    UserListUpdated,
}

impl RealtimeEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            RealtimeEventType::TaskAssigned => "TASK_ASSIGNED",
            RealtimeEventType::TaskUpdated => "TASK_UPDATED",
            RealtimeEventType::OperatorStatusUpdated => "OPERATOR_STATUS_UPDATED",
            RealtimeEventType::UserPresenceUpdated => "USER_PRESENCE_UPDATED",
            RealtimeEventType::UserListUpdated => "USER_LIST_UPDATED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "TASK_ASSIGNED" => RealtimeEventType::TaskAssigned,
            "TASK_UPDATED" => RealtimeEventType::TaskUpdated,
            "OPERATOR_STATUS_UPDATED" => RealtimeEventType::OperatorStatusUpdated,
            "USER_PRESENCE_UPDATED" => RealtimeEventType::UserPresenceUpdated,
            "USER_LIST_UPDATED" => RealtimeEventType::UserListUpdated,
            _ => return None,
        })
    }

    /// Whether this event type can be routed to an operator's own room;
    /// presence/list events are always manager-only regardless of payload
    /// shape.
    pub fn is_operator_scopable(self) -> bool {
        !matches!(
            self,
            RealtimeEventType::UserPresenceUpdated | RealtimeEventType::UserListUpdated
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: RealtimeEventType,
    pub payload: Value,
    #[serde(rename = "occurredAt")]
    pub occurred_at: DateTime<Utc>,
}

/// Build a valid envelope directly (the path every core component uses
/// rather than round-tripping through raw JSON).
pub fn build_envelope(
    event_type: RealtimeEventType,
    payload: Value,
    occurred_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> EventEnvelope {
    EventEnvelope {
        event_type,
        payload,
        occurred_at: occurred_at.unwrap_or(now),
    }
}

/// Validate and stamp a raw `{type, payload, occurredAt?}` value: `type` must be in the closed set; `occurredAt` defaults to `now`
/// when absent.
pub fn parse_envelope(raw: &Value, now: DateTime<Utc>) -> Result<EventEnvelope, WmsError> {
    let raw_type = raw
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| WmsError::invalid("missing field: type"))?;
    let event_type = RealtimeEventType::parse(raw_type)
        .ok_or_else(|| WmsError::invalid(format!("unsupported realtime event type: {raw_type}")))?;

    let payload = raw.get("payload").cloned().unwrap_or(Value::Null);

    let occurred_at = match raw.get("occurredAt") {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map_err(|_| WmsError::invalid("occurredAt is not a valid instant"))?
            .with_timezone(&Utc),
        _ => now,
    };

    Ok(EventEnvelope {
        event_type,
        payload,
        occurred_at,
    })
}

/// Extract an operator id from any of the three aliases a
/// broadcast policy names (`operatorId`, `operator_id`,
/// `assignedOperatorId`).
pub fn operator_id_from_payload(payload: &Value) -> Option<String> {
    for key in ["operatorId", "operator_id", "assignedOperatorId"] {
        if let Some(v) = payload.get(key).and_then(Value::as_str) {
            return Some(v.to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn rejects_unknown_type() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let raw = json!({"type": "BOGUS", "payload": {}});
        assert!(parse_envelope(&raw, now).is_err());
    }

    #[test]
    fn stamps_occurred_at_when_missing() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let raw = json!({"type": "TASK_UPDATED", "payload": {"taskId": "t1"}});
        let env = parse_envelope(&raw, now).unwrap();
        assert_eq!(env.occurred_at, now);
    }

    #[test]
    fn honors_supplied_occurred_at() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let stamped = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        let raw = json!({
            "type": "TASK_ASSIGNED",
            "payload": {},
            "occurredAt": stamped.to_rfc3339(),
        });
        let env = parse_envelope(&raw, now).unwrap();
        assert_eq!(env.occurred_at, stamped);
    }

    #[test]
    fn extracts_operator_id_aliases() {
        assert_eq!(
            operator_id_from_payload(&json!({"operatorId": "a"})),
            Some("a".to_string())
        );
        assert_eq!(
            operator_id_from_payload(&json!({"operator_id": "b"})),
            Some("b".to_string())
        );
        assert_eq!(
            operator_id_from_payload(&json!({"assignedOperatorId": "c"})),
            Some("c".to_string())
        );
        assert_eq!(operator_id_from_payload(&json!({})), None);
    }
}

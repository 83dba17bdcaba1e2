//! Broadcast policy: which identities receive a given realtime event
//! broadcast room-routing policy.

use wms_events::envelope::operator_id_from_payload;
use wms_events::EventEnvelope;

use crate::auth::Identity;

/// Always deliver to managers. Deliver to an operator only when the
/// event's payload names that operator and the event type is not a
/// presence/list event (those stay manager-only regardless of payload
/// shape).
pub fn should_deliver(identity: &Identity, envelope: &EventEnvelope) -> bool {
    match identity {
        Identity::Manager { .. } => true,
        Identity::Operator { operator_id } => {
            if !envelope.event_type.is_operator_scopable() {
                return false;
            }
            operator_id_from_payload(&envelope.payload)
                .map(|id| &id == operator_id)
                .unwrap_or(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use wms_events::RealtimeEventType;

    fn envelope(event_type: RealtimeEventType, payload: serde_json::Value) -> EventEnvelope {
        EventEnvelope {
            event_type,
            payload,
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn manager_receives_everything() {
        let identity = Identity::Manager { subject: "u1".to_string() };
        assert!(should_deliver(
            &identity,
            &envelope(RealtimeEventType::UserListUpdated, json!({}))
        ));
        assert!(should_deliver(
            &identity,
            &envelope(RealtimeEventType::TaskUpdated, json!({"operatorId": "op-1"}))
        ));
    }

    #[test]
    fn operator_receives_only_own_scoped_events() {
        let identity = Identity::Operator { operator_id: "op-1".to_string() };
        assert!(should_deliver(
            &identity,
            &envelope(RealtimeEventType::TaskAssigned, json!({"operatorId": "op-1"}))
        ));
        assert!(!should_deliver(
            &identity,
            &envelope(RealtimeEventType::TaskAssigned, json!({"operatorId": "op-2"}))
        ));
        assert!(!should_deliver(
            &identity,
            &envelope(RealtimeEventType::TaskUpdated, json!({}))
        ));
    }

    #[test]
    fn presence_and_list_events_are_manager_only() {
        let identity = Identity::Operator { operator_id: "op-1".to_string() };
        assert!(!should_deliver(
            &identity,
            &envelope(RealtimeEventType::UserPresenceUpdated, json!({"operatorId": "op-1"}))
        ));
    }
}

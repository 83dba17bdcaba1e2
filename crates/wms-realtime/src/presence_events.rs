//! Builds the two presence-flavored realtime events. Presence is derived
//! from the in-memory `{userId -> active socket set}`. Both are manager-only per the broadcast policy.

use chrono::{DateTime, Utc};
use serde_json::json;
use wms_events::envelope::build_envelope;
use wms_events::{EventEnvelope, RealtimeEventType};

pub fn presence_changed_envelope(user_key: &str, online: bool, now: DateTime<Utc>) -> EventEnvelope {
    build_envelope(
        RealtimeEventType::UserPresenceUpdated,
        json!({ "userId": user_key, "online": online }),
        None,
        now,
    )
}

pub fn user_list_envelope(active_user_keys: Vec<String>, now: DateTime<Utc>) -> EventEnvelope {
    build_envelope(
        RealtimeEventType::UserListUpdated,
        json!({ "userIds": active_user_keys }),
        None,
        now,
    )
}

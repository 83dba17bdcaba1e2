//! Task generation logic. Pure: no IO, no clock reads beyond
//! the `now` the caller supplies, no randomness beyond event-key synthesis
//! for callers that don't provide one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::{TaskLineStatus, TaskType};
use crate::error::WmsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SalesOrderReadyForPick,
    PurchaseOrderReceived,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::SalesOrderReadyForPick => "sales_order_ready_for_pick",
            EventType::PurchaseOrderReceived => "purchase_order_received",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "sales_order_ready_for_pick" => Some(EventType::SalesOrderReadyForPick),
            "purchase_order_received" => Some(EventType::PurchaseOrderReceived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedLine {
    pub sku_id: i64,
    pub quantity: i64,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub event_type: EventType,
    pub event_key: String,
    pub source_document_id: String,
    pub ship_date: Option<DateTime<Utc>>,
    pub lines: Vec<NormalizedLine>,
}

/// Time constants used by [`estimate_seconds`] and task-spec assembly.
/// Defaults are owned by `wms-config` at runtime;
/// this struct just carries whatever values the caller resolved.
#[derive(Debug, Clone, Copy)]
pub struct GenerationDefaults {
    pub pick_base_seconds: i64,
    pub pick_per_unit_seconds: i64,
    pub putaway_base_seconds: i64,
    pub putaway_per_unit_seconds: i64,
    pub putaway_priority: i32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            pick_base_seconds: 90,
            pick_per_unit_seconds: 12,
            putaway_base_seconds: 75,
            putaway_per_unit_seconds: 10,
            putaway_priority: 60,
        }
    }
}

/// A location → zone lookup supplied by the caller (`wms-db` backs this
/// with a single batched query; tests can use a `HashMap`).
pub trait ZoneResolver {
    fn resolve(&self, location_id: i64) -> Option<i64>;
}

impl<F: Fn(i64) -> Option<i64>> ZoneResolver for F {
    fn resolve(&self, location_id: i64) -> Option<i64> {
        self(location_id)
    }
}

#[derive(Debug, Clone)]
pub struct TaskLineSpec {
    pub sku_id: i64,
    pub from_location_id: Option<i64>,
    pub to_location_id: Option<i64>,
    pub quantity: i64,
    pub status: TaskLineStatus,
}

#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub task_type: TaskType,
    pub priority: i32,
    pub zone_id: i64,
    pub source_document_id: String,
    pub estimated_duration_seconds: i64,
    pub lines: Vec<TaskLineSpec>,
}

/// `estimatedSeconds = base + totalUnits * perUnit`. Monotonic non-decreasing in `total_units`.
pub fn estimate_seconds(total_units: i64, base_seconds: i64, per_unit_seconds: i64) -> i64 {
    base_seconds + total_units * per_unit_seconds
}

/// Pick priority from whole days between `now` and `ship_date`.
/// Non-increasing as the gap widens.
pub fn pick_priority(ship_date: DateTime<Utc>, now: DateTime<Utc>) -> i32 {
    let days = (ship_date - now).num_days();
    if days <= 0 {
        100
    } else if days == 1 {
        90
    } else if days <= 3 {
        70
    } else {
        50
    }
}

fn require_str(payload: &Value, field: &str) -> Result<String, WmsError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| WmsError::invalid(format!("missing or empty field: {field}")))
}

fn require_positive_i64(payload: &Value, field: &str) -> Result<i64, WmsError> {
    let n = payload
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| WmsError::invalid(format!("missing or non-integer field: {field}")))?;
    if n <= 0 {
        return Err(WmsError::invalid(format!("field {field} must be positive")));
    }
    Ok(n)
}

fn optional_positive_i64(payload: &Value, field: &str) -> Result<Option<i64>, WmsError> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let n = v
                .as_i64()
                .ok_or_else(|| WmsError::invalid(format!("field {field} must be an integer")))?;
            if n <= 0 {
                return Err(WmsError::invalid(format!("field {field} must be positive")));
            }
            Ok(Some(n))
        }
    }
}

fn alias_positive_i64(payload: &Value, field: &str, alias: &str) -> Result<i64, WmsError> {
    if payload.get(field).is_some() {
        require_positive_i64(payload, field)
    } else {
        require_positive_i64(payload, alias)
    }
}

/// Validate and normalize a raw event payload. `now` is the
/// instant used to compute `occurredAt`-relative fields and, for sales
/// orders, the pick-priority clock.
pub fn normalize_event(payload: &Value, now: DateTime<Utc>) -> Result<NormalizedEvent, WmsError> {
    let raw_type = payload
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| WmsError::invalid("missing field: type"))?;
    let event_type = EventType::parse(raw_type)
        .ok_or_else(|| WmsError::invalid(format!("unsupported event type: {raw_type}")))?;

    let (source_document_id, ship_date, lines) = match event_type {
        EventType::SalesOrderReadyForPick => {
            let sales_order_id = require_str(payload, "salesOrderId")?;
            let ship_date_raw = payload
                .get("shipDate")
                .and_then(Value::as_str)
                .ok_or_else(|| WmsError::invalid("missing field: shipDate"))?;
            let ship_date = DateTime::parse_from_rfc3339(ship_date_raw)
                .map_err(|_| WmsError::invalid("shipDate is not a valid instant"))?
                .with_timezone(&Utc);

            let raw_lines = payload
                .get("lines")
                .and_then(Value::as_array)
                .filter(|l| !l.is_empty())
                .ok_or_else(|| WmsError::invalid("sales order requires at least one line"))?;

            let mut lines = Vec::with_capacity(raw_lines.len());
            for line in raw_lines {
                let sku_id = require_positive_i64(line, "skuId")?;
                let quantity = require_positive_i64(line, "quantity")?;
                let pick_location_id = alias_positive_i64(line, "pickLocationId", "fromLocationId")?;
                lines.push(NormalizedLine {
                    sku_id,
                    quantity,
                    from_location_id: Some(pick_location_id),
                    to_location_id: None,
                });
            }

            (format!("SO:{sales_order_id}"), Some(ship_date), lines)
        }
        EventType::PurchaseOrderReceived => {
            let purchase_order_id = require_str(payload, "purchaseOrderId")?;
            let raw_lines = payload
                .get("lines")
                .and_then(Value::as_array)
                .filter(|l| !l.is_empty())
                .ok_or_else(|| WmsError::invalid("purchase order requires at least one line"))?;

            let mut lines = Vec::with_capacity(raw_lines.len());
            for line in raw_lines {
                let sku_id = require_positive_i64(line, "skuId")?;
                let quantity = require_positive_i64(line, "quantity")?;
                let destination_location_id =
                    alias_positive_i64(line, "destinationLocationId", "toLocationId")?;
                let from_location_id = optional_positive_i64(line, "fromLocationId")?;
                lines.push(NormalizedLine {
                    sku_id,
                    quantity,
                    from_location_id,
                    to_location_id: Some(destination_location_id),
                });
            }

            (format!("PO:{purchase_order_id}"), None, lines)
        }
    };

    let event_key = match payload.get("eventKey").and_then(Value::as_str) {
        Some(key) if !key.is_empty() => key.to_owned(),
        _ => format!("{}:{}:{}", event_type.as_str(), source_document_id, Uuid::new_v4()),
    };

    Ok(NormalizedEvent {
        event_type,
        event_key,
        source_document_id,
        ship_date,
        lines,
    })
}

/// Bucket a normalized event's lines by zone and emit one task spec per
/// bucket. Bucket order follows first-seen zone to keep the
/// result deterministic for a given input ordering.
pub fn group_by_zone(
    event: &NormalizedEvent,
    resolver: &dyn ZoneResolver,
    now: DateTime<Utc>,
    defaults: GenerationDefaults,
) -> Result<Vec<TaskSpec>, WmsError> {
    let mut order: Vec<i64> = Vec::new();
    let mut buckets: std::collections::HashMap<i64, Vec<&NormalizedLine>> =
        std::collections::HashMap::new();

    for line in &event.lines {
        let location_id = match event.event_type {
            EventType::SalesOrderReadyForPick => line.from_location_id,
            EventType::PurchaseOrderReceived => line.to_location_id,
        }
        .expect("normalize_event always sets the routing location for its event type");

        let zone_id = resolver
            .resolve(location_id)
            .ok_or_else(|| WmsError::invalid(format!("no zone mapping for location {location_id}")))?;

        if !buckets.contains_key(&zone_id) {
            order.push(zone_id);
        }
        buckets.entry(zone_id).or_default().push(line);
    }

    let (task_type, base, per_unit, priority) = match event.event_type {
        EventType::SalesOrderReadyForPick => {
            let priority = pick_priority(
                event.ship_date.expect("sales orders always carry a shipDate"),
                now,
            );
            (
                TaskType::Pick,
                defaults.pick_base_seconds,
                defaults.pick_per_unit_seconds,
                priority,
            )
        }
        EventType::PurchaseOrderReceived => (
            TaskType::Putaway,
            defaults.putaway_base_seconds,
            defaults.putaway_per_unit_seconds,
            defaults.putaway_priority,
        ),
    };

    let specs = order
        .into_iter()
        .map(|zone_id| {
            let lines = &buckets[&zone_id];
            let total_units: i64 = lines.iter().map(|l| l.quantity).sum();
            let estimated_duration_seconds = estimate_seconds(total_units, base, per_unit);
            let line_specs = lines
                .iter()
                .map(|l| TaskLineSpec {
                    sku_id: l.sku_id,
                    from_location_id: l.from_location_id,
                    to_location_id: l.to_location_id,
                    quantity: l.quantity,
                    status: TaskLineStatus::Created,
                })
                .collect();

            TaskSpec {
                task_type,
                priority,
                zone_id,
                source_document_id: event.source_document_id.clone(),
                estimated_duration_seconds,
                lines: line_specs,
            }
        })
        .collect();

    Ok(specs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn dt(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn pick_priority_matches_scenario_1() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert_eq!(pick_priority(dt("2026-03-06T00:00:00Z"), now), 50);
        assert_eq!(pick_priority(dt("2026-03-03T00:00:00Z"), now), 70);
        assert_eq!(pick_priority(dt("2026-03-02T00:00:00Z"), now), 90);
        assert_eq!(pick_priority(dt("2026-03-01T00:00:00Z"), now), 100);
    }

    #[test]
    fn estimate_seconds_matches_scenario_2() {
        assert_eq!(estimate_seconds(5, 90, 12), 150);
    }

    #[test]
    fn zone_grouping_matches_scenario_3() {
        let payload = json!({
            "type": "sales_order_ready_for_pick",
            "salesOrderId": "SO-1",
            "shipDate": "2026-03-02T00:00:00Z",
            "lines": [
                {"skuId": 1, "quantity": 2, "pickLocationId": 10},
                {"skuId": 2, "quantity": 3, "pickLocationId": 11},
                {"skuId": 3, "quantity": 1, "pickLocationId": 12},
            ],
        });
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let event = normalize_event(&payload, now).unwrap();
        assert_eq!(event.source_document_id, "SO:SO-1");

        let resolver = |loc: i64| match loc {
            10 | 11 => Some(1),
            12 => Some(2),
            _ => None,
        };
        let defaults = GenerationDefaults {
            pick_base_seconds: 60,
            pick_per_unit_seconds: 5,
            ..Default::default()
        };
        let mut specs = group_by_zone(&event, &resolver, now, defaults).unwrap();
        specs.sort_by_key(|s| s.zone_id);

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].zone_id, 1);
        assert_eq!(specs[0].lines.len(), 2);
        assert_eq!(specs[0].estimated_duration_seconds, 85);
        assert_eq!(specs[0].priority, 90);
        assert_eq!(specs[1].zone_id, 2);
        assert_eq!(specs[1].lines.len(), 1);
        assert_eq!(specs[1].estimated_duration_seconds, 65);
    }

    #[test]
    fn rejects_unmapped_location() {
        let payload = json!({
            "type": "purchase_order_received",
            "purchaseOrderId": "PO-1",
            "lines": [{"skuId": 1, "quantity": 1, "destinationLocationId": 99}],
        });
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let event = normalize_event(&payload, now).unwrap();
        let resolver = |_: i64| None;
        let err = group_by_zone(&event, &resolver, now, GenerationDefaults::default()).unwrap_err();
        assert_eq!(err.class, crate::error::ErrorClass::Invalid);
    }

    #[test]
    fn rejects_unknown_event_type() {
        let payload = json!({"type": "bogus"});
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        assert!(normalize_event(&payload, now).is_err());
    }

    #[test]
    fn event_key_is_synthesized_when_absent() {
        let payload = json!({
            "type": "purchase_order_received",
            "purchaseOrderId": "PO-2",
            "lines": [{"skuId": 1, "quantity": 1, "destinationLocationId": 1}],
        });
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let event = normalize_event(&payload, now).unwrap();
        assert!(event.event_key.starts_with("purchase_order_received:PO:PO-2:"));
    }

    #[test]
    fn event_key_is_honored_when_supplied() {
        let payload = json!({
            "type": "purchase_order_received",
            "purchaseOrderId": "PO-3",
            "eventKey": "stable-key-1",
            "lines": [{"skuId": 1, "quantity": 1, "destinationLocationId": 1}],
        });
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let event = normalize_event(&payload, now).unwrap();
        assert_eq!(event.event_key, "stable-key-1");
    }
}

#[cfg(all(test, feature = "test-support"))]
mod props {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn estimation_law_is_monotonic(base in 0i64..1000, per_unit in 0i64..100, u1 in 1i64..10_000, delta in 0i64..10_000) {
            let u2 = u1 + delta;
            prop_assert!(estimate_seconds(u2, base, per_unit) >= estimate_seconds(u1, base, per_unit));
            prop_assert_eq!(estimate_seconds(u1, base, per_unit), base + u1 * per_unit);
        }

        #[test]
        fn priority_law_is_non_increasing_in_gap(now_offset_days in 0i64..30, gap_days in 0i64..30) {
            let now = Utc.timestamp_opt(1_700_000_000 + now_offset_days * 86_400, 0).unwrap();
            let ship_small = now + chrono::Duration::days(gap_days);
            let ship_large = now + chrono::Duration::days(gap_days + 1);
            prop_assert!(pick_priority(ship_small, now) >= pick_priority(ship_large, now));
        }
    }
}

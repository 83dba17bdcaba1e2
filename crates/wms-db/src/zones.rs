//! Location -> zone resolution backing `wms_core::generation::ZoneResolver`.

use std::collections::HashMap;

use wms_core::generation::ZoneResolver;
use wms_core::WmsError;

/// A batched location->zone mapping fetched in one query.
pub struct LocationZoneMap(HashMap<i64, i64>);

impl ZoneResolver for LocationZoneMap {
    fn resolve(&self, location_id: i64) -> Option<i64> {
        self.0.get(&location_id).copied()
    }
}

pub async fn load_zone_map<'e, E>(
    executor: E,
    location_ids: &[i64],
) -> Result<LocationZoneMap, WmsError>
where
    E: sqlx::PgExecutor<'e>,
{
    if location_ids.is_empty() {
        return Ok(LocationZoneMap(HashMap::new()));
    }

    let rows: Vec<(i64, Option<i64>)> = sqlx::query_as(
        r#"
        select id, zone_id
        from locations
        where id = any($1)
        "#,
    )
    .bind(location_ids)
    .fetch_all(executor)
    .await?;

    let map = rows
        .into_iter()
        .filter_map(|(location_id, zone_id)| zone_id.map(|z| (location_id, z)))
        .collect();

    Ok(LocationZoneMap(map))
}

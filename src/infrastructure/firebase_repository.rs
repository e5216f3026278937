// Firebase Realtime Database repository implementation
//
// Records live under `<path>/<YYYY-MM-DD>/<epoch-ms>` where the day key is
// computed in the configured display offset.
use crate::application::reading_store::{LatestUpdate, ReadingStore, StoreError, StoreResult};
use crate::domain::events::{format_duration, PumpAction, PumpActivation, RecordBoundary, RefillRecord};
use crate::domain::tank::LatestSnapshot;
use crate::domain::telemetry::{format_label, Reading};
use crate::infrastructure::config::FirebaseSettings;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone)]
pub struct FirebaseRepository {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    readings_path: String,
    refills_path: String,
    pumps_path: String,
    latest_path: String,
    offset: FixedOffset,
}

impl FirebaseRepository {
    pub fn new(settings: FirebaseSettings, offset: FixedOffset) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: settings.database_url.trim_end_matches('/').to_string(),
            auth_token: settings.auth_token,
            readings_path: settings.readings_path,
            refills_path: settings.refills_path,
            pumps_path: settings.pumps_path,
            latest_path: settings.latest_path,
            offset,
        }
    }

    fn build_url(&self, path: &str, start_day: Option<&str>) -> String {
        let mut params = Vec::new();
        if let Some(token) = &self.auth_token {
            params.push(format!("auth={}", urlencoding::encode(token)));
        }
        if let Some(day) = start_day {
            params.push(format!("orderBy={}", urlencoding::encode("\"$key\"")));
            params.push(format!("startAt={}", urlencoding::encode(&format!("\"{}\"", day))));
        }

        let mut url = format!("{}/{}.json", self.base_url, path);
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        url
    }

    fn day_key(&self, timestamp_ms: i64) -> String {
        match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
            Some(utc) => utc.with_timezone(&self.offset).format("%Y-%m-%d").to_string(),
            None => "1970-01-01".to_string(),
        }
    }

    fn record_path(&self, root: &str, timestamp_ms: i64) -> String {
        format!("{}/{}/{}", root, self.day_key(timestamp_ms), timestamp_ms)
    }

    async fn execute(&self, method: Method, url: String, body: Option<Value>) -> StoreResult<Value> {
        tracing::debug!("Firebase {} {}", method, url.split('?').next().unwrap_or_default());

        let mut request = self.client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("request to Firebase failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Unavailable(format!(
                "Firebase answered {}: {}",
                status, body
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| StoreError::Malformed(format!("failed to parse Firebase response: {}", e)))
    }

    async fn get_tree(&self, path: &str, start_ms: Option<i64>) -> StoreResult<Value> {
        let start_day = start_ms.map(|ms| self.day_key(ms));
        let url = self.build_url(path, start_day.as_deref());
        self.execute(Method::GET, url, None).await
    }

    async fn write(&self, method: Method, path: &str, body: Option<Value>) -> StoreResult<()> {
        let url = self.build_url(path, None);
        self.execute(method, url, body).await.map(|_| ())
    }
}

/// Walk a `day -> timestamp -> payload` tree, skipping unparseable keys.
fn day_entries(tree: &Value) -> impl Iterator<Item = (i64, &Value)> {
    tree.as_object()
        .into_iter()
        .flat_map(|days| days.values())
        .filter_map(Value::as_object)
        .flat_map(|entries| entries.iter())
        .filter_map(|(key, payload)| match key.parse::<i64>() {
            Ok(ts) if ts > 0 => Some((ts, payload)),
            _ => {
                tracing::warn!("Skipping record with invalid timestamp key: {}", key);
                None
            }
        })
}

/// Numbers may be stored as JSON numbers or numeric strings.
fn lenient_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn lenient_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

pub(crate) fn parse_readings(tree: &Value, start_ms: Option<i64>, end_ms: Option<i64>) -> Vec<Reading> {
    let mut readings: Vec<Reading> = day_entries(tree)
        .filter(|(ts, _)| start_ms.is_none_or(|start| *ts >= start))
        .filter(|(ts, _)| end_ms.is_none_or(|end| *ts <= end))
        .filter_map(|(ts, payload)| match payload.get("p").and_then(lenient_f64) {
            Some(level) => Some(Reading::new(ts, level)),
            None => {
                tracing::warn!("Skipping reading {} without a valid level", ts);
                None
            }
        })
        .collect();

    readings.sort_by_key(|r| r.timestamp_ms);
    readings.dedup_by_key(|r| r.timestamp_ms);
    readings
}

pub(crate) fn parse_refills(tree: &Value, start_ms: Option<i64>) -> Vec<RefillRecord> {
    let mut records: Vec<RefillRecord> = day_entries(tree)
        .filter(|(ts, _)| start_ms.is_none_or(|start| *ts >= start))
        .map(|(ts, payload)| RefillRecord {
            timestamp_ms: ts,
            previous_level: payload.get("previous_level").and_then(lenient_f64),
            new_level: payload.get("new_level").and_then(lenient_f64),
            boundary: RecordBoundary::from_water_ended(
                payload.get("water_ended").and_then(Value::as_bool),
            ),
        })
        .collect();

    records.sort_by_key(|r| r.timestamp_ms);
    records
}

pub(crate) fn parse_pumps(tree: &Value, start_ms: Option<i64>) -> Vec<PumpActivation> {
    let mut records: Vec<PumpActivation> = day_entries(tree)
        .filter(|(ts, _)| start_ms.is_none_or(|start| *ts >= start))
        .filter_map(|(ts, payload)| {
            let action = payload.get("action").and_then(Value::as_str).and_then(PumpAction::parse);
            let Some(action) = action else {
                tracing::warn!("Skipping pump record {} with unknown action", ts);
                return None;
            };
            Some(PumpActivation {
                timestamp_ms: ts,
                action,
                duration_ms: payload.get("duration").and_then(lenient_i64),
                deactivated_at_ms: payload.get("deactivated_at").and_then(lenient_i64),
            })
        })
        .collect();

    records.sort_by_key(|r| r.timestamp_ms);
    records
}

pub(crate) fn parse_latest(node: &Value) -> Option<LatestSnapshot> {
    let node = node.as_object()?;
    Some(LatestSnapshot {
        level_percent: node.get("percentage").and_then(lenient_f64),
        timestamp_ms: node
            .get("timestamp")
            .or_else(|| node.get("t"))
            .and_then(lenient_i64),
        last_refill_timestamp_ms: node.get("last_compesa_timestamp").and_then(lenient_i64),
        last_refill_level: node.get("last_compesa_level").and_then(lenient_f64),
        pump_is_on: node.get("pump_is_on").and_then(Value::as_bool).unwrap_or(false),
    })
}

#[async_trait]
impl ReadingStore for FirebaseRepository {
    async fn fetch_readings(&self, start_ms: Option<i64>, end_ms: Option<i64>) -> StoreResult<Vec<Reading>> {
        let tree = self.get_tree(&self.readings_path, start_ms).await?;
        let readings = parse_readings(&tree, start_ms, end_ms);
        tracing::debug!("Fetched {} readings", readings.len());
        Ok(readings)
    }

    async fn fetch_refill_records(&self, start_ms: Option<i64>) -> StoreResult<Vec<RefillRecord>> {
        let tree = self.get_tree(&self.refills_path, start_ms).await?;
        Ok(parse_refills(&tree, start_ms))
    }

    async fn fetch_pump_records(&self, start_ms: Option<i64>) -> StoreResult<Vec<PumpActivation>> {
        let tree = self.get_tree(&self.pumps_path, start_ms).await?;
        let records = parse_pumps(&tree, start_ms);
        tracing::debug!("Fetched {} pump records", records.len());
        Ok(records)
    }

    async fn fetch_latest(&self) -> StoreResult<Option<LatestSnapshot>> {
        let node = self.get_tree(&self.latest_path, None).await?;
        Ok(parse_latest(&node))
    }

    async fn put_refill_record(&self, record: &RefillRecord) -> StoreResult<()> {
        let mut body = Map::new();
        body.insert("timestamp".into(), json!(record.timestamp_ms));
        body.insert("datetime".into(), json!(format_label(record.timestamp_ms, &self.offset)));
        if let Some(previous) = record.previous_level {
            body.insert("previous_level".into(), json!(previous));
        }
        if let Some(new) = record.new_level {
            body.insert("new_level".into(), json!(new));
        }
        if let Some(increase) = record.increase() {
            body.insert("increase".into(), json!(increase));
        }
        if let Some(water_ended) = record.boundary.water_ended() {
            body.insert("water_ended".into(), json!(water_ended));
        }

        let path = self.record_path(&self.refills_path, record.timestamp_ms);
        self.write(Method::PUT, &path, Some(Value::Object(body))).await?;
        tracing::info!("Saved refill record {}", path);
        Ok(())
    }

    async fn delete_refill_record(&self, timestamp_ms: i64) -> StoreResult<()> {
        let path = self.record_path(&self.refills_path, timestamp_ms);
        let existing = self.execute(Method::GET, self.build_url(&path, None), None).await?;
        if existing.is_null() {
            return Err(StoreError::NotFound(path));
        }
        self.write(Method::DELETE, &path, None).await?;
        tracing::info!("Deleted refill record {}", path);
        Ok(())
    }

    async fn put_pump_record(&self, record: &PumpActivation) -> StoreResult<()> {
        let status = match record.action {
            PumpAction::Activated => "on",
            PumpAction::Deactivated => "off",
        };
        let body = json!({
            "timestamp": record.timestamp_ms,
            "date": format_label(record.timestamp_ms, &self.offset),
            "type": "manual_pump",
            "action": record.action.as_str(),
            "user_triggered": true,
            "status": status,
            "duration": record.duration_ms,
            "duration_string": record.duration_ms.map(format_duration),
        });

        let path = self.record_path(&self.pumps_path, record.timestamp_ms);
        self.write(Method::PUT, &path, Some(body)).await?;
        tracing::info!("Saved pump record {}", path);
        Ok(())
    }

    async fn close_pump_activation(
        &self,
        activation_ms: i64,
        deactivated_at_ms: i64,
        duration_ms: i64,
    ) -> StoreResult<()> {
        let body = json!({
            "deactivated_at": deactivated_at_ms,
            "deactivated_date": format_label(deactivated_at_ms, &self.offset),
            "duration": duration_ms,
            "duration_string": format_duration(duration_ms),
            "status": "off",
        });
        let path = self.record_path(&self.pumps_path, activation_ms);
        self.write(Method::PATCH, &path, Some(body)).await
    }

    async fn update_latest(&self, update: &LatestUpdate) -> StoreResult<()> {
        let body = match update {
            LatestUpdate::LastRefill { timestamp_ms, level } => json!({
                "last_compesa_timestamp": timestamp_ms,
                "last_compesa_level": level,
                "last_compesa_datetime": format_label(*timestamp_ms, &self.offset),
            }),
            LatestUpdate::ClearLastRefill => json!({
                "last_compesa_timestamp": null,
                "last_compesa_level": null,
                "last_compesa_datetime": null,
            }),
            LatestUpdate::Pump { is_on, changed_at_ms } => json!({
                "pump_is_on": is_on,
                "pump_last_activation": changed_at_ms,
                "pump_last_update": format_label(*changed_at_ms, &self.offset),
            }),
        };
        self.write(Method::PATCH, &self.latest_path, Some(body)).await
    }
}

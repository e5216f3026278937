// In-memory store used by service tests
use crate::application::reading_store::{LatestUpdate, ReadingStore, StoreError, StoreResult};
use crate::domain::events::{PumpActivation, RefillRecord};
use crate::domain::tank::LatestSnapshot;
use crate::domain::telemetry::Reading;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct InMemoryStore {
    readings: Mutex<Vec<Reading>>,
    refills: Mutex<Vec<RefillRecord>>,
    pumps: Mutex<Vec<PumpActivation>>,
    latest: Mutex<Option<LatestSnapshot>>,
    offline: AtomicBool,
    write_budget: Mutex<Option<usize>>,
}

impl InMemoryStore {
    pub fn push_reading(&self, reading: Reading) {
        let mut readings = self.readings.lock().unwrap();
        readings.push(reading);
        readings.sort_by_key(|r| r.timestamp_ms);
    }

    pub fn push_refill(&self, record: RefillRecord) {
        self.refills.lock().unwrap().push(record);
    }

    pub fn push_pump(&self, record: PumpActivation) {
        self.pumps.lock().unwrap().push(record);
    }

    pub fn set_latest(&self, latest: LatestSnapshot) {
        *self.latest.lock().unwrap() = Some(latest);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Let the next `writes` writes succeed and fail every one after them.
    pub fn fail_writes_after(&self, writes: usize) {
        *self.write_budget.lock().unwrap() = Some(writes);
    }

    pub fn refills(&self) -> Vec<RefillRecord> {
        self.refills.lock().unwrap().clone()
    }

    pub fn pumps(&self) -> Vec<PumpActivation> {
        self.pumps.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Option<LatestSnapshot> {
        self.latest.lock().unwrap().clone()
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self) -> StoreResult<()> {
        self.check_online()?;
        match self.write_budget.lock().unwrap().as_mut() {
            Some(0) => Err(StoreError::Unavailable("write rejected".to_string())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

fn after(start_ms: Option<i64>, timestamp_ms: i64) -> bool {
    start_ms.is_none_or(|start| timestamp_ms >= start)
}

#[async_trait]
impl ReadingStore for InMemoryStore {
    async fn fetch_readings(&self, start_ms: Option<i64>, end_ms: Option<i64>) -> StoreResult<Vec<Reading>> {
        self.check_online()?;
        Ok(self
            .readings
            .lock()
            .unwrap()
            .iter()
            .filter(|r| after(start_ms, r.timestamp_ms))
            .filter(|r| end_ms.is_none_or(|end| r.timestamp_ms <= end))
            .copied()
            .collect())
    }

    async fn fetch_refill_records(&self, start_ms: Option<i64>) -> StoreResult<Vec<RefillRecord>> {
        self.check_online()?;
        Ok(self
            .refills
            .lock()
            .unwrap()
            .iter()
            .filter(|r| after(start_ms, r.timestamp_ms))
            .cloned()
            .collect())
    }

    async fn fetch_pump_records(&self, start_ms: Option<i64>) -> StoreResult<Vec<PumpActivation>> {
        self.check_online()?;
        Ok(self
            .pumps
            .lock()
            .unwrap()
            .iter()
            .filter(|r| after(start_ms, r.timestamp_ms))
            .copied()
            .collect())
    }

    async fn fetch_latest(&self) -> StoreResult<Option<LatestSnapshot>> {
        self.check_online()?;
        Ok(self.latest())
    }

    async fn put_refill_record(&self, record: &RefillRecord) -> StoreResult<()> {
        self.check_writable()?;
        let mut refills = self.refills.lock().unwrap();
        refills.retain(|r| r.timestamp_ms != record.timestamp_ms);
        refills.push(record.clone());
        Ok(())
    }

    async fn delete_refill_record(&self, timestamp_ms: i64) -> StoreResult<()> {
        self.check_writable()?;
        let mut refills = self.refills.lock().unwrap();
        let before = refills.len();
        refills.retain(|r| r.timestamp_ms != timestamp_ms);
        if refills.len() == before {
            return Err(StoreError::NotFound(timestamp_ms.to_string()));
        }
        Ok(())
    }

    async fn put_pump_record(&self, record: &PumpActivation) -> StoreResult<()> {
        self.check_writable()?;
        let mut pumps = self.pumps.lock().unwrap();
        pumps.retain(|r| r.timestamp_ms != record.timestamp_ms);
        pumps.push(*record);
        Ok(())
    }

    async fn close_pump_activation(
        &self,
        activation_ms: i64,
        deactivated_at_ms: i64,
        duration_ms: i64,
    ) -> StoreResult<()> {
        self.check_writable()?;
        let mut pumps = self.pumps.lock().unwrap();
        let activation = pumps
            .iter_mut()
            .find(|r| r.timestamp_ms == activation_ms)
            .ok_or_else(|| StoreError::NotFound(activation_ms.to_string()))?;
        activation.deactivated_at_ms = Some(deactivated_at_ms);
        activation.duration_ms = Some(duration_ms);
        Ok(())
    }

    async fn update_latest(&self, update: &LatestUpdate) -> StoreResult<()> {
        self.check_writable()?;
        let mut latest = self.latest.lock().unwrap();
        let snapshot = latest.get_or_insert_with(LatestSnapshot::default);
        match update {
            LatestUpdate::LastRefill { timestamp_ms, level } => {
                snapshot.last_refill_timestamp_ms = Some(*timestamp_ms);
                snapshot.last_refill_level = *level;
            }
            LatestUpdate::ClearLastRefill => {
                snapshot.last_refill_timestamp_ms = None;
                snapshot.last_refill_level = None;
            }
            LatestUpdate::Pump { is_on, .. } => {
                snapshot.pump_is_on = *is_on;
            }
        }
        Ok(())
    }
}

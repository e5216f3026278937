// Control service - Manual refill marks and pump toggling
use crate::application::cached_store::CachedReadingStore;
use crate::application::reading_store::{LatestUpdate, StoreError};
use crate::domain::events::{format_duration, PumpActivation, RecordBoundary, RefillRecord};
use crate::engine::pair_pump_duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("pump has no open activation")]
    NoOpenActivation,
    #[error("deactivation at {deactivated_at_ms} does not follow activation at {activation_ms}")]
    InvalidDuration {
        activation_ms: i64,
        deactivated_at_ms: i64,
    },
}

/// A refill marked by hand from the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualRefill {
    pub timestamp_ms: i64,
    pub previous_level: Option<f64>,
    pub new_level: Option<f64>,
    /// Absent for a plain point mark.
    pub water_ended: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PumpToggle {
    pub timestamp_ms: i64,
    pub is_on: bool,
    pub duration_ms: Option<i64>,
    pub duration: Option<String>,
}

#[derive(Clone)]
pub struct ControlService {
    store: Arc<CachedReadingStore>,
}

impl ControlService {
    pub fn new(store: Arc<CachedReadingStore>) -> Self {
        Self { store }
    }

    pub async fn mark_refill(&self, refill: ManualRefill) -> Result<RefillRecord, ControlError> {
        let record = RefillRecord {
            timestamp_ms: refill.timestamp_ms,
            previous_level: refill.previous_level,
            new_level: refill.new_level,
            boundary: RecordBoundary::from_water_ended(refill.water_ended),
        };
        let store = self.store.store();
        store.put_refill_record(&record).await?;

        let advanced = async {
            let current_last = store
                .fetch_latest()
                .await?
                .and_then(|latest| latest.last_refill_timestamp_ms)
                .unwrap_or(0);
            if record.timestamp_ms > current_last {
                store
                    .update_latest(&LatestUpdate::LastRefill {
                        timestamp_ms: record.timestamp_ms,
                        level: record.new_level,
                    })
                    .await?;
            }
            Ok::<_, StoreError>(())
        }
        .await;

        // The record is stored even if the snapshot update failed.
        self.store.invalidate().await;
        advanced?;
        tracing::info!("Marked refill at {}", record.timestamp_ms);
        Ok(record)
    }

    /// Remove a recorded refill and point the snapshot at the newest one left.
    pub async fn delete_refill(&self, timestamp_ms: i64) -> Result<(), ControlError> {
        let store = self.store.store();
        store.delete_refill_record(timestamp_ms).await?;

        let repointed = async {
            let remaining = store.fetch_refill_records(None).await?;
            let update = match remaining.iter().max_by_key(|r| r.timestamp_ms) {
                Some(newest) => LatestUpdate::LastRefill {
                    timestamp_ms: newest.timestamp_ms,
                    level: newest.new_level,
                },
                None => LatestUpdate::ClearLastRefill,
            };
            store.update_latest(&update).await
        }
        .await;

        self.store.invalidate().await;
        repointed?;
        tracing::info!("Deleted refill at {}", timestamp_ms);
        Ok(())
    }

    pub async fn activate_pump(&self, now_ms: i64) -> Result<PumpToggle, ControlError> {
        let store = self.store.store();
        store.put_pump_record(&PumpActivation::activated(now_ms)).await?;
        let flagged = store
            .update_latest(&LatestUpdate::Pump {
                is_on: true,
                changed_at_ms: now_ms,
            })
            .await;

        self.store.invalidate().await;
        flagged?;
        tracing::info!("Pump activated at {}", now_ms);
        Ok(PumpToggle {
            timestamp_ms: now_ms,
            is_on: true,
            duration_ms: None,
            duration: None,
        })
    }

    /// Close the most recent open activation and record the deactivation.
    pub async fn deactivate_pump(&self, now_ms: i64) -> Result<PumpToggle, ControlError> {
        let store = self.store.store();
        let records = store.fetch_pump_records(None).await?;
        let activation = records
            .iter()
            .filter(|r| r.is_open())
            .max_by_key(|r| r.timestamp_ms)
            .copied()
            .ok_or(ControlError::NoOpenActivation)?;

        if now_ms <= activation.timestamp_ms {
            return Err(ControlError::InvalidDuration {
                activation_ms: activation.timestamp_ms,
                deactivated_at_ms: now_ms,
            });
        }

        let mut deactivation = PumpActivation::deactivated(now_ms, None);
        let duration_ms = pair_pump_duration(&activation, &deactivation);
        deactivation.duration_ms = Some(duration_ms);

        store
            .close_pump_activation(activation.timestamp_ms, now_ms, duration_ms)
            .await?;

        let recorded = async {
            store.put_pump_record(&deactivation).await?;
            store
                .update_latest(&LatestUpdate::Pump {
                    is_on: false,
                    changed_at_ms: now_ms,
                })
                .await
        }
        .await;

        self.store.invalidate().await;
        recorded?;
        let duration = format_duration(duration_ms);
        tracing::info!("Pump deactivated at {} after {}", now_ms, duration);
        Ok(PumpToggle {
            timestamp_ms: now_ms,
            is_on: false,
            duration_ms: Some(duration_ms),
            duration: Some(duration),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::InMemoryStore;
    use crate::domain::events::PumpAction;
    use crate::domain::tank::{LatestSnapshot, Period};
    use std::time::Duration;

    fn service(store: Arc<InMemoryStore>) -> ControlService {
        ControlService::new(Arc::new(CachedReadingStore::new(
            store,
            Duration::from_secs(60),
            Duration::from_secs(60),
        )))
    }

    fn manual(timestamp_ms: i64, water_ended: Option<bool>) -> ManualRefill {
        ManualRefill {
            timestamp_ms,
            previous_level: Some(20.0),
            new_level: Some(70.0),
            water_ended,
        }
    }

    #[tokio::test]
    async fn test_mark_refill_advances_latest() {
        let store = Arc::new(InMemoryStore::default());
        let control = service(store.clone());

        let record = control.mark_refill(manual(5_000, Some(false))).await.unwrap();
        assert_eq!(record.boundary, RecordBoundary::IntervalBoundary { is_end: false });
        assert_eq!(store.latest().unwrap().last_refill_timestamp_ms, Some(5_000));

        // An older mark does not move the snapshot backwards.
        control.mark_refill(manual(3_000, None)).await.unwrap();
        assert_eq!(store.latest().unwrap().last_refill_timestamp_ms, Some(5_000));
        assert_eq!(store.refills().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_refill_repoints_latest() {
        let store = Arc::new(InMemoryStore::default());
        let control = service(store.clone());
        control.mark_refill(manual(3_000, None)).await.unwrap();
        control.mark_refill(manual(5_000, None)).await.unwrap();

        control.delete_refill(5_000).await.unwrap();
        assert_eq!(store.latest().unwrap().last_refill_timestamp_ms, Some(3_000));

        control.delete_refill(3_000).await.unwrap();
        assert_eq!(store.latest().unwrap().last_refill_timestamp_ms, None);

        let missing = control.delete_refill(3_000).await;
        assert!(matches!(missing, Err(ControlError::Store(StoreError::NotFound(_)))));
    }

    #[tokio::test]
    async fn test_pump_cycle_records_duration() {
        let store = Arc::new(InMemoryStore::default());
        let control = service(store.clone());

        let on = control.activate_pump(10_000).await.unwrap();
        assert!(on.is_on);
        assert!(store.latest().unwrap().pump_is_on);

        let off = control.deactivate_pump(3_733_000).await.unwrap();
        assert_eq!(off.duration_ms, Some(3_723_000));
        assert_eq!(off.duration.as_deref(), Some("01:02:03"));
        assert!(!store.latest().unwrap().pump_is_on);

        let pumps = store.pumps();
        let activation = pumps.iter().find(|r| r.action == PumpAction::Activated).unwrap();
        assert_eq!(activation.deactivated_at_ms, Some(3_733_000));
        let deactivation = pumps.iter().find(|r| r.action == PumpAction::Deactivated).unwrap();
        assert_eq!(deactivation.duration_ms, Some(3_723_000));
    }

    #[tokio::test]
    async fn test_deactivate_without_open_activation() {
        let store = Arc::new(InMemoryStore::default());
        store.set_latest(LatestSnapshot::default());
        let control = service(store);
        assert!(matches!(
            control.deactivate_pump(1_000).await,
            Err(ControlError::NoOpenActivation)
        ));
    }

    #[tokio::test]
    async fn test_partial_refill_write_still_invalidates() {
        let store = Arc::new(InMemoryStore::default());
        let cached = Arc::new(CachedReadingStore::new(
            store.clone(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let control = ControlService::new(cached.clone());
        assert!(cached.refills_for(Period::All, 10_000).await.unwrap().is_empty());

        store.fail_writes_after(1);
        let result = control.mark_refill(manual(5_000, None)).await;
        assert!(matches!(result, Err(ControlError::Store(StoreError::Unavailable(_)))));

        let refills = cached.refills_for(Period::All, 10_000).await.unwrap();
        assert_eq!(refills.len(), 1);
        assert_eq!(refills[0].timestamp_ms, 5_000);
    }

    #[tokio::test]
    async fn test_partial_deactivation_still_invalidates() {
        let store = Arc::new(InMemoryStore::default());
        let cached = Arc::new(CachedReadingStore::new(
            store.clone(),
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let control = ControlService::new(cached.clone());
        control.activate_pump(10_000).await.unwrap();
        let before = cached.pumps_for(Period::All, 20_000).await.unwrap();
        assert!(before[0].is_open());

        // Closing the activation lands, recording the deactivation does not.
        store.fail_writes_after(1);
        let result = control.deactivate_pump(20_000).await;
        assert!(matches!(result, Err(ControlError::Store(StoreError::Unavailable(_)))));

        let after = cached.pumps_for(Period::All, 20_000).await.unwrap();
        assert_eq!(after.len(), 1);
        assert!(!after[0].is_open());
        assert_eq!(after[0].deactivated_at_ms, Some(20_000));
    }

    #[tokio::test]
    async fn test_deactivate_rejects_non_positive_duration() {
        let store = Arc::new(InMemoryStore::default());
        let control = service(store.clone());
        control.activate_pump(50_000).await.unwrap();

        let result = control.deactivate_pump(50_000).await;
        assert!(matches!(result, Err(ControlError::InvalidDuration { .. })));
        assert_eq!(store.pumps().len(), 1);
    }
}

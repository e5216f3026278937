// Streaming dashboard service - Progressive loading over chunked JSON
use crate::application::dashboard_service::{analyze_series, summarize, DashboardService};
use crate::domain::dashboard::{OverlaySet, StatsSummary};
use crate::domain::events::RefillEvent;
use crate::domain::tank::{LevelBand, Period};
use crate::domain::telemetry::{DisplayPoint, TrendLine};
use serde::Serialize;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StreamMessage {
    #[serde(rename_all = "camelCase")]
    Skeleton {
        period: Period,
        bucket_hours: f64,
        pump_is_on: bool,
        current_band: Option<LevelBand>,
    },
    Series { points: Vec<DisplayPoint> },
    Events { events: Vec<RefillEvent> },
    Trend { trend: Option<TrendLine> },
    #[serde(rename_all = "camelCase")]
    Stats { stats: StatsSummary, overdue: bool },
    Overlays { pump: OverlaySet, refill: OverlaySet },
    /// Delivery failed for the series pipeline; the client keeps whatever
    /// arrived and shows a banner.
    Unavailable { reason: String },
    #[serde(rename_all = "camelCase")]
    Complete { sections: usize, duration_ms: i64 },
}

#[derive(Clone)]
pub struct StreamingDashboardService {
    dashboard: DashboardService,
}

impl StreamingDashboardService {
    pub fn new(dashboard: DashboardService) -> Self {
        Self { dashboard }
    }

    pub async fn stream_dashboard(&self, period: Period, now_ms: i64) -> mpsc::Receiver<StreamMessage> {
        let (tx, rx) = mpsc::channel(16);
        let start_time = Instant::now();

        // 1. Skeleton from the latest snapshot so the client can lay out
        let latest = self.dashboard.fetch_latest().await;
        let skeleton = StreamMessage::Skeleton {
            period,
            bucket_hours: period.bucket_hours(),
            pump_is_on: latest.as_ref().is_some_and(|l| l.pump_is_on),
            current_band: latest
                .as_ref()
                .and_then(|l| l.level_percent)
                .map(|level| self.dashboard.band(level)),
        };
        let _ = tx.send(skeleton).await;

        let mut tasks: JoinSet<usize> = JoinSet::new();

        // 2. Series pipeline: points, events, trend, stats
        {
            let tx = tx.clone();
            let dashboard = self.dashboard.clone();
            tasks.spawn(async move {
                let readings = match dashboard.store().readings_for(period, now_ms).await {
                    Ok(readings) => readings,
                    Err(e) => {
                        tracing::error!("Error streaming readings for {}: {}", period.as_str(), e);
                        let _ = tx.send(StreamMessage::Unavailable { reason: e.to_string() }).await;
                        return 0;
                    }
                };

                let analysis = analyze_series(&readings, period, dashboard.engine(), dashboard.offset());
                let stats = summarize(&analysis, latest.as_ref(), dashboard.engine());
                let overdue = stats.is_overdue(now_ms);

                let messages = [
                    StreamMessage::Series { points: analysis.points },
                    StreamMessage::Events { events: analysis.events },
                    StreamMessage::Trend { trend: analysis.trend },
                    StreamMessage::Stats { stats, overdue },
                ];
                let mut sent = 0;
                for msg in messages {
                    if tx.send(msg).await.is_err() {
                        break;
                    }
                    sent += 1;
                }
                sent
            });
        }

        // 3. Overlay pipeline
        {
            let tx = tx.clone();
            let dashboard = self.dashboard.clone();
            tasks.spawn(async move {
                let (pump, refill) = tokio::join!(
                    dashboard.pump_overlay(period, now_ms),
                    dashboard.refill_overlay(period, now_ms)
                );
                match tx.send(StreamMessage::Overlays { pump, refill }).await {
                    Ok(()) => 1,
                    Err(_) => 0,
                }
            });
        }

        // 4. Completion once both pipelines have finished
        tokio::spawn(async move {
            let mut sections = 0;
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(sent) => sections += sent,
                    Err(e) => tracing::error!("Dashboard stream task failed: {}", e),
                }
            }

            let duration_ms = start_time.elapsed().as_millis() as i64;
            tracing::debug!("Streamed {} sections in {}ms", sections, duration_ms);
            let _ = tx
                .send(StreamMessage::Complete {
                    sections,
                    duration_ms,
                })
                .await;
        });

        rx
    }
}

//! ExpirySweep - periodic notifications for expiry boundaries.
//!
//! Each pass covers the window `(last_run, now]` and publishes one event
//! per License boundary crossed inside it:
//!
//! | Boundary | Event |
//! |----------|-------|
//! | `expires_at - N days` for each configured N | `license.expiring_soon.v1` |
//! | `expires_at` | `license.grace_started.v1` |
//! | `expires_at + grace` | `license.lapsed.v1` |
//!
//! The sweep never writes Licenses. `resolve` is computed from `now` on
//! every call, so a missed or delayed pass only delays notifications.
//! Passes are serialized, so an operator-triggered pass never overlaps
//! the background loop.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `interval` | 1h | Time between passes; also the first window's length |
//! | `warning_days` | 30, 14, 7 | Advance notices before expiry |

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time;
use tracing::{debug, info, warn};

use crate::domain::foundation::Timestamp;
use crate::domain::licensing::{GracePolicy, LicenseChange, LicensingError, LicensingEvent};
use crate::ports::{Clock, EventPublisher, LicenseStore};

#[derive(Debug, Clone)]
pub struct ExpirySweepConfig {
    pub interval: Duration,
    pub warning_days: Vec<u32>,
}

impl Default for ExpirySweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3600),
            warning_days: vec![30, 14, 7],
        }
    }
}

impl ExpirySweepConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_warning_days(mut self, warning_days: Vec<u32>) -> Self {
        self.warning_days = warning_days;
        self
    }
}

/// Counts for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub window_start: Option<Timestamp>,
    pub window_end: Option<Timestamp>,
    pub expiring_soon: usize,
    pub grace_started: usize,
    pub lapsed: usize,
    pub publish_failures: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.expiring_soon + self.grace_started + self.lapsed
    }
}

pub struct ExpirySweep {
    licenses: Arc<dyn LicenseStore>,
    event_publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    grace: GracePolicy,
    config: ExpirySweepConfig,
    last_run: Mutex<Option<Timestamp>>,
}

impl ExpirySweep {
    pub fn new(
        licenses: Arc<dyn LicenseStore>,
        event_publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        grace: GracePolicy,
    ) -> Self {
        Self::with_config(licenses, event_publisher, clock, grace, ExpirySweepConfig::default())
    }

    pub fn with_config(
        licenses: Arc<dyn LicenseStore>,
        event_publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        grace: GracePolicy,
        config: ExpirySweepConfig,
    ) -> Self {
        Self {
            licenses,
            event_publisher,
            clock,
            grace,
            config,
            last_run: Mutex::new(None),
        }
    }

    /// Run passes until the shutdown signal flips to `true`.
    ///
    /// A failed pass is logged and retried on the next tick with the same
    /// window start, so no boundary is skipped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.interval);
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Expiry sweep stopped");
                        return;
                    }
                }

                _ = interval.tick() => {
                    let now = self.clock.now();
                    if let Err(error) = self.run_once(now).await {
                        warn!(error = %error, "Expiry sweep pass failed");
                    }
                }
            }
        }
    }

    /// One pass over `(last_run, now]`. The first pass looks back one
    /// interval.
    pub async fn run_once(&self, now: Timestamp) -> Result<SweepReport, LicensingError> {
        let mut last_run = self.last_run.lock().await;
        let from = last_run.unwrap_or_else(|| now.minus(chrono_interval(self.config.interval)));
        if from >= now {
            return Ok(SweepReport::default());
        }

        let report = self.sweep(from, now).await?;
        *last_run = Some(now);

        if report.total() > 0 {
            info!(
                expiring_soon = report.expiring_soon,
                grace_started = report.grace_started,
                lapsed = report.lapsed,
                "Expiry sweep published notifications"
            );
        } else {
            debug!(window_start = %from, window_end = %now, "Expiry sweep found nothing");
        }
        Ok(report)
    }

    /// One pass ending at the clock's current instant.
    pub async fn run_now(&self) -> Result<SweepReport, LicensingError> {
        self.run_once(self.clock.now()).await
    }

    async fn sweep(&self, from: Timestamp, to: Timestamp) -> Result<SweepReport, LicensingError> {
        let mut events = Vec::new();
        let mut report = SweepReport {
            window_start: Some(from),
            window_end: Some(to),
            ..SweepReport::default()
        };

        for &days in &self.config.warning_days {
            let lead = chrono::Duration::days(i64::from(days));
            for license in self
                .licenses
                .list_expiring_between(from.saturating_plus(lead), to.saturating_plus(lead))
                .await?
            {
                if let Some(expires_at) = license.expires_at {
                    report.expiring_soon += 1;
                    events.push(LicensingEvent::for_key(
                        &license.key(),
                        None,
                        expires_at.minus(lead),
                        LicenseChange::ExpiringSoon {
                            expires_at,
                            days_remaining: days,
                        },
                    ));
                }
            }
        }

        for license in self.licenses.list_expiring_between(from, to).await? {
            if let Some(expires_at) = license.expires_at {
                report.grace_started += 1;
                events.push(LicensingEvent::for_key(
                    &license.key(),
                    None,
                    expires_at,
                    LicenseChange::GraceStarted {
                        expires_at,
                        grace_ends_at: self.grace.grace_ends(expires_at),
                    },
                ));
            }
        }

        let grace = self.grace.period();
        for license in self
            .licenses
            .list_expiring_between(from.minus(grace), to.minus(grace))
            .await?
        {
            if let Some(expires_at) = license.expires_at {
                report.lapsed += 1;
                events.push(LicensingEvent::for_key(
                    &license.key(),
                    None,
                    self.grace.grace_ends(expires_at),
                    LicenseChange::Lapsed { expires_at },
                ));
            }
        }

        for event in events {
            if let Err(error) = self.event_publisher.publish(event.to_envelope()).await {
                report.publish_failures += 1;
                warn!(
                    organization_id = %event.organization_id,
                    error = %error,
                    "Failed to publish expiry notification"
                );
            }
        }

        Ok(report)
    }
}

fn chrono_interval(interval: Duration) -> chrono::Duration {
    chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::hours(1))
}

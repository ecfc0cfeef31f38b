//! Time-driven pass transitions and cancellation.
//!
//! The sweeps are designed to be run from a scheduler at any cadence:
//! each row transitions through a conditional update, so overlapping runs
//! converge instead of double-applying, and one bad row is recorded and
//! skipped rather than aborting the batch.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::domain::facility::{Facility, SlotType};
use crate::domain::pass::{Pass, PassStatus};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::notify::Notification;
use crate::store::{CancelFailure, CapacityRestore, FacilityKey, PassKey, PoolKey, TransitionOutcome};

/// Outcome of one sweep run.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Passes whose status this run changed.
    pub transitioned: usize,
    /// Per-row failures, recorded and skipped.
    pub errors: Vec<String>,
}

impl Engine {
    /// Moves reserved passes whose window has opened to active.
    ///
    /// Past-dated reserved passes should not exist; when found they are
    /// healed straight to expired.
    pub async fn activation_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let today = self.local_date(now);
        let hour = self.local_hour(now);
        let is_am_period = hour < self.config().pm_opening_hour;

        let mut report = SweepReport::default();
        let mut facilities: HashMap<FacilityKey, Option<Facility>> = HashMap::new();

        for pass in self.store().passes_by_status(PassStatus::Reserved).await? {
            let target = if pass.date < today {
                Some(PassStatus::Expired)
            } else if pass.date == today {
                let activates = match pass.slot {
                    SlotType::Pm => !is_am_period,
                    SlotType::Am | SlotType::Day => {
                        is_am_period && hour >= self.opening_hour_of(&pass, &mut facilities).await
                    }
                };
                activates.then_some(PassStatus::Active)
            } else {
                None
            };

            let Some(target) = target else { continue };
            match self
                .store()
                .transition_pass(&PassKey::of(&pass), &[PassStatus::Reserved], target, "system", now)
                .await
            {
                Ok(TransitionOutcome::Applied(_)) => report.transitioned += 1,
                Ok(TransitionOutcome::Skipped) => {}
                Err(err) => {
                    warn!("Activation of pass {} failed: {err}", pass.registration_number);
                    report.errors.push(format!("{}: {err}", pass.registration_number));
                }
            }
        }

        info!("Activation sweep transitioned {} pass(es), {} error(s)", report.transitioned, report.errors.len());
        Ok(report)
    }

    /// Moves active passes whose window has closed to expired.
    pub async fn expiry_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let today = self.local_date(now);
        let hour = self.local_hour(now);

        let mut report = SweepReport::default();
        for pass in self.store().passes_by_status(PassStatus::Active).await? {
            let expired = pass.date < today
                || (pass.date == today && pass.slot == SlotType::Am && hour >= self.config().pm_opening_hour);
            if !expired {
                continue;
            }
            match self
                .store()
                .transition_pass(&PassKey::of(&pass), &[PassStatus::Active], PassStatus::Expired, "system", now)
                .await
            {
                Ok(TransitionOutcome::Applied(_)) => report.transitioned += 1,
                Ok(TransitionOutcome::Skipped) => {}
                Err(err) => {
                    warn!("Expiry of pass {} failed: {err}", pass.registration_number);
                    report.errors.push(format!("{}: {err}", pass.registration_number));
                }
            }
        }

        info!("Expiry sweep transitioned {} pass(es), {} error(s)", report.transitioned, report.errors.len());
        Ok(report)
    }

    /// Cancels a reserved or active pass.
    ///
    /// Unless the pass was overbooked its guests return to the pool in the
    /// same atomic update; an overbooked pass no longer counts against the
    /// pool, so restoring it would inflate availability.
    pub async fn cancel(&self, actor: &str, park: &str, registration_number: &str) -> Result<Pass> {
        let now = self.now();
        let key = PassKey::new(park, registration_number);
        let pass = self
            .store()
            .get_pass(&key)
            .await?
            .ok_or_else(|| Error::not_found(format!("Pass {registration_number}")))?;

        let restore = (!pass.is_overbooked).then(|| CapacityRestore {
            pool: PoolKey::new(&pass.park, &pass.facility_name, pass.date),
            slot: pass.slot,
            guests: pass.number_of_guests,
        });

        let cancelled = match self.store().cancel_pass(&key, restore, actor, now).await {
            Ok(pass) => pass,
            Err(CancelFailure::NotCancellable(status)) => {
                return Err(Error::validation(format!(
                    "Pass {registration_number} is {status} and cannot be cancelled"
                )));
            }
            Err(CancelFailure::MissingPass) => {
                return Err(Error::not_found(format!("Pass {registration_number}")));
            }
            Err(CancelFailure::Storage(message)) => return Err(Error::internal(message)),
        };

        info!("Cancelled pass {} at {}/{} (by {actor})", registration_number, park, cancelled.facility_name);
        if let Some(notification) = Notification::cancelled(&cancelled) {
            self.notifier.dispatch(notification);
        }
        Ok(cancelled)
    }

    /// Opening hour of the pass's facility, with the facility record
    /// cached across the sweep.
    async fn opening_hour_of(&self, pass: &Pass, cache: &mut HashMap<FacilityKey, Option<Facility>>) -> u32 {
        let key = FacilityKey::new(&pass.park, &pass.facility_name);
        if !cache.contains_key(&key) {
            let facility = self.store().get_facility(&key).await.ok().flatten();
            cache.insert(key.clone(), facility);
        }
        cache
            .get(&key)
            .and_then(|f| f.as_ref())
            .and_then(|f| f.booking_opening_hour)
            .unwrap_or(self.config().am_opening_hour)
    }
}

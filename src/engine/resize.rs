//! Administrative capacity edits and overbooking reconciliation.
//!
//! Capacity edits rewrite the nominal configuration on the facility and
//! then walk every present-or-future reservation pool, carrying the delta
//! into each pool's availability. When a reduction lands below the guests
//! already committed, the shortfall is absorbed by flagging whole passes
//! as overbooked, newest bookings first; a later increase reverses those
//! flags oldest first. The whole walk runs under the facility edit lock,
//! which is released on every exit path.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::{info, warn};

use crate::authz::Permissions;
use crate::domain::facility::{BookingDays, BookingTime, Facility, FacilityStatus, SlotType};
use crate::domain::pass::Pass;
use crate::domain::pool::{ReservationPool, SlotCapacity};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::notify::Notification;
use crate::store::{FacilityKey, PassKey, PoolKey};

/// An administrator's new configuration for a facility. Fields left as
/// `None` keep their current value; `booking_times` is always the full
/// replacement map, so a slot type absent from it is removed.
#[derive(Debug, Clone)]
pub struct FacilityEdit {
    pub booking_times: BTreeMap<SlotType, BookingTime>,
    pub status: FacilityStatus,
    pub visible: bool,
    pub booking_opening_hour: Option<u32>,
    pub booking_days_ahead: Option<u32>,
    pub booking_days: Option<BookingDays>,
    pub bookable_holidays: Option<Vec<NaiveDate>>,
}

impl Engine {
    /// Applies a facility edit and reconciles every present-or-future
    /// pool with the new slot configuration.
    pub async fn update_facility(&self, key: &FacilityKey, edit: FacilityEdit, permissions: &Permissions) -> Result<Facility> {
        if !permissions.can_manage(&key.park) {
            return Err(Error::validation(format!("Not authorized to manage park {}", key.park)));
        }

        let current = self.lock_facility(key).await?;
        let result = self.apply_facility_edit(key, current, edit).await;
        let released = self.release_facility(key).await;
        match result {
            Ok(facility) => released.map(|()| Facility { is_updating: false, ..facility }),
            Err(err) => Err(err),
        }
    }

    /// Sets the capacity modifier of one (date, slot) and reconciles that
    /// pool. The modifier is absolute, not a delta.
    pub async fn update_modifier(
        &self,
        pool_key: &PoolKey,
        slot: SlotType,
        modifier: i64,
        permissions: &Permissions,
    ) -> Result<SlotCapacity> {
        if !permissions.can_manage(&pool_key.park) {
            return Err(Error::validation(format!("Not authorized to manage park {}", pool_key.park)));
        }
        if pool_key.date < self.local_date(self.now()) {
            return Err(Error::validation("Cannot edit capacity for a past date"));
        }

        let facility_key = FacilityKey::new(&pool_key.park, &pool_key.facility_name);
        let facility = self.lock_facility(&facility_key).await?;
        let result = self.apply_modifier(pool_key, &facility, slot, modifier).await;
        let released = self.release_facility(&facility_key).await;
        match result {
            Ok(capacity) => released.map(|()| capacity),
            Err(err) => Err(err),
        }
    }

    async fn apply_facility_edit(&self, key: &FacilityKey, current: Facility, edit: FacilityEdit) -> Result<Facility> {
        let removed: Vec<SlotType> = current
            .booking_times
            .keys()
            .filter(|slot| !edit.booking_times.contains_key(slot))
            .copied()
            .collect();
        let changed: Vec<(SlotType, u32)> = edit
            .booking_times
            .iter()
            .map(|(slot, time)| (*slot, time.max))
            .collect();

        let updated = Facility {
            booking_times: edit.booking_times,
            status: edit.status,
            visible: edit.visible,
            booking_opening_hour: edit.booking_opening_hour.or(current.booking_opening_hour),
            booking_days_ahead: edit.booking_days_ahead.or(current.booking_days_ahead),
            booking_days: edit.booking_days.unwrap_or(current.booking_days),
            bookable_holidays: edit.bookable_holidays.unwrap_or(current.bookable_holidays),
            is_updating: true,
            ..current
        };
        self.store().update_facility(updated.clone()).await?;

        let today = self.local_date(self.now());
        let pools = self.store().pools_on_or_after(&key.park, &key.name, today).await?;
        info!(
            "Updating facility {}/{}: {} slot(s) resized, {} removed, {} pool(s) to reconcile",
            key.park,
            key.name,
            changed.len(),
            removed.len(),
            pools.len()
        );

        for pool in &pools {
            let pool_key = PoolKey::new(&pool.park, &pool.facility_name, pool.date);
            for slot in &removed {
                self.remove_slot(&pool_key, pool, *slot).await?;
            }
            for (slot, new_base) in &changed {
                let modifier = pool.capacities.get(slot).map_or(0, |c| c.capacity_modifier);
                self.reconcile_slot(&pool_key, pool, *slot, *new_base, modifier).await?;
            }
            self.store().set_pool_status(&pool_key, updated.status.state).await?;
        }

        Ok(updated)
    }

    async fn apply_modifier(&self, pool_key: &PoolKey, facility: &Facility, slot: SlotType, modifier: i64) -> Result<SlotCapacity> {
        if !facility.booking_times.contains_key(&slot) {
            return Err(Error::validation(format!(
                "Facility {} has no {} booking time",
                facility.name, slot
            )));
        }

        // The date may not have a pool yet; seed one so the modifier has
        // somewhere to live.
        self.store()
            .create_pool_if_absent(ReservationPool::seeded_from(facility, pool_key.date))
            .await?;
        let pool = self
            .store()
            .get_pool(pool_key)
            .await?
            .ok_or_else(|| Error::internal(format!("Pool for {} vanished after seeding", pool_key.date)))?;

        let base = pool.capacities.get(&slot).map_or_else(
            || facility.booking_times[&slot].max,
            |c| c.base_capacity,
        );
        self.reconcile_slot(pool_key, &pool, slot, base, modifier).await?;

        let pool = self
            .store()
            .get_pool(pool_key)
            .await?
            .ok_or_else(|| Error::internal(format!("Pool for {} vanished during reconciliation", pool_key.date)))?;
        Ok(pool.capacities[&slot])
    }

    /// Carries a capacity change into one pool slot.
    ///
    /// The projected availability is the current availability plus the
    /// change in total capacity. A negative projection triggers
    /// overbooking; a positive change triggers reversal of earlier
    /// overbooking. Availability as persisted never goes below zero.
    async fn reconcile_slot(
        &self,
        pool_key: &PoolKey,
        pool: &ReservationPool,
        slot: SlotType,
        new_base: u32,
        new_modifier: i64,
    ) -> Result<()> {
        if new_base as i64 + new_modifier < 0 {
            warn!(
                "Rejecting capacity edit on {}/{} {} {}: total would be negative ({} + {})",
                pool.park, pool.facility_name, pool.date, slot, new_base, new_modifier
            );
            return Ok(());
        }

        // A slot newly added to the facility starts from a zeroed triple,
        // so the whole new total arrives as surplus.
        let old = pool.capacities.get(&slot).copied().unwrap_or(SlotCapacity {
            base_capacity: 0,
            capacity_modifier: 0,
            available_passes: 0,
        });

        let delta = (new_base as i64 - old.base_capacity as i64) + (new_modifier - old.capacity_modifier);
        if delta == 0 {
            return Ok(());
        }
        let projected = old.available_passes + delta;

        let available = if projected < 0 {
            let committed: Vec<Pass> = self
                .store()
                .passes_for_slot(&pool.park, &pool.facility_name, pool.date, slot)
                .await?
                .into_iter()
                .filter(|p| p.is_committed() && !p.is_overbooked)
                .collect();
            let (to_flag, available) = select_for_overbooking(committed, -projected);
            warn!(
                "Capacity cut on {}/{} {} {} leaves a shortfall of {}; overbooking {} pass(es)",
                pool.park,
                pool.facility_name,
                pool.date,
                slot,
                -projected,
                to_flag.len()
            );
            for pass in &to_flag {
                let flagged = self.store().set_pass_overbooked(&PassKey::of(pass), true).await?;
                if let Some(notification) = Notification::overbooked(&flagged) {
                    self.notifier.dispatch(notification);
                }
            }
            available
        } else if delta > 0 {
            let overbooked: Vec<Pass> = self
                .store()
                .passes_for_slot(&pool.park, &pool.facility_name, pool.date, slot)
                .await?
                .into_iter()
                .filter(|p| p.is_committed() && p.is_overbooked)
                .collect();
            let (to_unflag, available) = select_for_reversal(overbooked, projected);
            if !to_unflag.is_empty() {
                info!(
                    "Capacity increase on {}/{} {} {} reinstates {} overbooked pass(es)",
                    pool.park,
                    pool.facility_name,
                    pool.date,
                    slot,
                    to_unflag.len()
                );
            }
            for pass in &to_unflag {
                self.store().set_pass_overbooked(&PassKey::of(pass), false).await?;
            }
            available
        } else {
            // A reduction the remaining headroom absorbs.
            projected
        };

        let capacity = SlotCapacity {
            base_capacity: new_base,
            capacity_modifier: new_modifier,
            available_passes: available,
        };
        self.store().set_pool_capacity(pool_key, slot, capacity).await
    }

    /// A slot type was deleted from the facility: every committed pass on
    /// it becomes overbooked and the slot's capacity triple is zeroed. The
    /// zeroed entry stays on the pool so reporting can still see the slot.
    async fn remove_slot(&self, pool_key: &PoolKey, pool: &ReservationPool, slot: SlotType) -> Result<()> {
        if !pool.capacities.contains_key(&slot) {
            return Ok(());
        }
        let committed: Vec<Pass> = self
            .store()
            .passes_for_slot(&pool.park, &pool.facility_name, pool.date, slot)
            .await?
            .into_iter()
            .filter(|p| p.is_committed() && !p.is_overbooked)
            .collect();
        warn!(
            "Removing {} from {}/{} {}; overbooking all {} committed pass(es)",
            slot,
            pool.park,
            pool.facility_name,
            pool.date,
            committed.len()
        );
        for pass in &committed {
            let flagged = self.store().set_pass_overbooked(&PassKey::of(pass), true).await?;
            if let Some(notification) = Notification::overbooked(&flagged) {
                self.notifier.dispatch(notification);
            }
        }
        let zeroed = SlotCapacity { base_capacity: 0, capacity_modifier: 0, available_passes: 0 };
        self.store().set_pool_capacity(pool_key, slot, zeroed).await
    }
}

/// Picks the passes to flag as overbooked to absorb a shortfall.
///
/// Selection is newest booking first and whole passes only, so the flagged
/// guest total can overshoot the shortfall; the overshoot becomes the new
/// availability.
pub(crate) fn select_for_overbooking(mut passes: Vec<Pass>, shortfall: i64) -> (Vec<Pass>, i64) {
    passes.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));

    let mut flagged_guests: i64 = 0;
    let mut selected = Vec::new();
    for pass in passes {
        if flagged_guests >= shortfall {
            break;
        }
        flagged_guests += pass.number_of_guests as i64;
        selected.push(pass);
    }
    (selected, (flagged_guests - shortfall).max(0))
}

/// Picks the overbooked passes a capacity increase can reinstate.
///
/// Oldest booking first; a pass whose guest count exceeds the remaining
/// budget is skipped, not split. The unspent budget becomes the new
/// availability.
pub(crate) fn select_for_reversal(mut passes: Vec<Pass>, budget: i64) -> (Vec<Pass>, i64) {
    passes.sort_by_key(|p| p.creation_date);

    let mut remaining = budget;
    let mut selected = Vec::new();
    for pass in passes {
        let guests = pass.number_of_guests as i64;
        if guests <= remaining {
            remaining -= guests;
            selected.push(pass);
        }
    }
    (selected, remaining)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};

    use super::*;
    use crate::domain::pass::{PassStatus, VisitorDetails};

    fn pass_created(minutes_ago: i64, guests: u32) -> Pass {
        let mut pass = Pass::new(
            "0363",
            "Cheakamus",
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            SlotType::Day,
            guests,
            PassStatus::Reserved,
            VisitorDetails::default(),
            Utc::now() - Duration::minutes(minutes_ago),
        );
        pass.registration_number = format!("{minutes_ago:010}");
        pass
    }

    #[test]
    fn overbooking_takes_newest_whole_passes_and_floors_availability() {
        // Oldest has 4 guests, newest has 1.
        let passes = vec![pass_created(30, 4), pass_created(20, 2), pass_created(10, 1)];

        let (flagged, available) = select_for_overbooking(passes, 2);
        let order: Vec<&str> = flagged.iter().map(|p| p.registration_number.as_str()).collect();
        // Newest first; the 1-guest pass is not enough, so the 2-guest
        // pass is flagged too and the overshoot of 1 is returned.
        assert_eq!(order, vec!["0000000010", "0000000020"]);
        assert_eq!(available, 1);
    }

    #[test]
    fn reversal_takes_oldest_and_skips_passes_too_big_for_the_budget() {
        let mut a = pass_created(30, 3);
        let mut b = pass_created(20, 2);
        let mut c = pass_created(10, 1);
        for p in [&mut a, &mut b, &mut c] {
            p.is_overbooked = true;
        }

        let (unflagged, remaining) = select_for_reversal(vec![c.clone(), a.clone(), b.clone()], 4);
        let order: Vec<&str> = unflagged.iter().map(|p| p.registration_number.as_str()).collect();
        // The oldest (3 guests) fits, the next (2) does not, the last (1)
        // does.
        assert_eq!(order, vec!["0000000030", "0000000010"]);
        assert_eq!(remaining, 0);
    }

    #[test]
    fn reversal_with_no_overbooked_passes_keeps_the_budget() {
        let (unflagged, remaining) = select_for_reversal(vec![], 5);
        assert!(unflagged.is_empty());
        assert_eq!(remaining, 5);
    }

    #[test]
    fn exact_shortfall_leaves_zero_availability() {
        let passes = vec![pass_created(10, 2)];
        let (flagged, available) = select_for_overbooking(passes, 2);
        assert_eq!(flagged.len(), 1);
        assert_eq!(available, 0);
    }
}

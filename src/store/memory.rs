//! In-memory [`Store`] implementation.
//!
//! Backs the demo binary and the test suites. A single `RwLock` over the
//! three tables gives every method the same atomicity a conditional-write
//! document store provides per item: the booking transaction and the
//! cancel-with-restore update each run under one write guard, so partial
//! effects are never observable.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::trace;

use crate::domain::facility::{Facility, FacilityState, SlotType};
use crate::domain::pass::{AuditEntry, Pass, PassStatus, VisitorDetails};
use crate::domain::pool::{ReservationPool, SlotCapacity};
use crate::error::{Error, Result};
use crate::store::{
    BookingFailure, BookingWrite, CancelFailure, CapacityRestore, FacilityKey, PassKey, PoolKey,
    Store, TransitionOutcome,
};

#[derive(Debug, Default)]
struct Inner {
    facilities: HashMap<FacilityKey, Facility>,
    pools: HashMap<PoolKey, ReservationPool>,
    passes: HashMap<PassKey, Pass>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Store for MemoryStore {
    //--------------------------
    // --- Facility Methods ---
    //--------------------------

    async fn get_facility(&self, key: &FacilityKey) -> Result<Option<Facility>> {
        Ok(self.read().facilities.get(key).cloned())
    }

    async fn create_facility(&self, facility: Facility) -> Result<bool> {
        let mut inner = self.write();
        let key = FacilityKey::new(&facility.park, &facility.name);
        if inner.facilities.contains_key(&key) {
            return Ok(false);
        }
        inner.facilities.insert(key, facility);
        Ok(true)
    }

    async fn update_facility(&self, facility: Facility) -> Result<()> {
        let mut inner = self.write();
        let key = FacilityKey::new(&facility.park, &facility.name);
        if !inner.facilities.contains_key(&key) {
            return Err(Error::not_found(format!("facility {}/{}", key.park, key.name)));
        }
        inner.facilities.insert(key, facility);
        Ok(())
    }

    async fn try_lock_facility(&self, key: &FacilityKey) -> Result<Option<Facility>> {
        let mut inner = self.write();
        let facility = inner
            .facilities
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("facility {}/{}", key.park, key.name)))?;
        if facility.is_updating {
            trace!("Lock on facility {}/{} already held", key.park, key.name);
            return Ok(None);
        }
        facility.is_updating = true;
        Ok(Some(facility.clone()))
    }

    async fn unlock_facility(&self, key: &FacilityKey) -> Result<()> {
        let mut inner = self.write();
        let facility = inner
            .facilities
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("facility {}/{}", key.park, key.name)))?;
        facility.is_updating = false;
        Ok(())
    }

    //----------------------
    // --- Pool Methods ---
    //----------------------

    async fn create_pool_if_absent(&self, pool: ReservationPool) -> Result<bool> {
        let mut inner = self.write();
        let key = PoolKey::new(&pool.park, &pool.facility_name, pool.date);
        if inner.pools.contains_key(&key) {
            return Ok(false);
        }
        inner.pools.insert(key, pool);
        Ok(true)
    }

    async fn get_pool(&self, key: &PoolKey) -> Result<Option<ReservationPool>> {
        Ok(self.read().pools.get(key).cloned())
    }

    async fn pools_on_or_after(&self, park: &str, facility_name: &str, date: NaiveDate) -> Result<Vec<ReservationPool>> {
        let mut pools: Vec<ReservationPool> = self
            .read()
            .pools
            .values()
            .filter(|p| p.park == park && p.facility_name == facility_name && p.date >= date)
            .cloned()
            .collect();
        pools.sort_by_key(|p| p.date);
        Ok(pools)
    }

    async fn set_pool_capacity(&self, key: &PoolKey, slot: SlotType, capacity: SlotCapacity) -> Result<()> {
        let mut inner = self.write();
        let pool = inner
            .pools
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("pool {}/{}/{}", key.park, key.facility_name, key.date)))?;
        pool.capacities.insert(slot, capacity);
        Ok(())
    }

    async fn set_pool_status(&self, key: &PoolKey, status: FacilityState) -> Result<()> {
        let mut inner = self.write();
        let pool = inner
            .pools
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("pool {}/{}/{}", key.park, key.facility_name, key.date)))?;
        pool.status = status;
        Ok(())
    }

    //----------------------
    // --- Pass Methods ---
    //----------------------

    async fn commit_booking(&self, write: BookingWrite) -> std::result::Result<(), BookingFailure> {
        let mut inner = self.write();

        // Part 1: the facility lock must not be held.
        let facility = inner
            .facilities
            .get(&write.facility)
            .ok_or_else(|| BookingFailure::MissingRecord(format!("facility {}/{}", write.facility.park, write.facility.name)))?;
        if facility.is_updating {
            return Err(BookingFailure::FacilityLocked);
        }

        // Part 3 checked before mutating so part 2 never half-applies.
        let pass_key = PassKey::of(&write.pass);
        if inner.passes.contains_key(&pass_key) {
            return Err(BookingFailure::DuplicatePass);
        }

        // Part 2: decrement conditioned on sufficient availability.
        let pool = inner
            .pools
            .get_mut(&write.pool)
            .ok_or_else(|| BookingFailure::MissingRecord(format!("pool {}/{}/{}", write.pool.park, write.pool.facility_name, write.pool.date)))?;
        let capacity = pool
            .capacities
            .get_mut(&write.slot)
            .ok_or_else(|| BookingFailure::MissingRecord(format!("slot {} of pool {}", write.slot, write.pool.date)))?;
        if capacity.available_passes < write.guests as i64 {
            return Err(BookingFailure::SoldOut);
        }
        capacity.available_passes -= write.guests as i64;

        inner.passes.insert(pass_key, write.pass);
        Ok(())
    }

    async fn get_pass(&self, key: &PassKey) -> Result<Option<Pass>> {
        Ok(self.read().passes.get(key).cloned())
    }

    async fn passes_for_date(&self, park: &str, facility_name: &str, date: NaiveDate) -> Result<Vec<Pass>> {
        let mut passes: Vec<Pass> = self
            .read()
            .passes
            .values()
            .filter(|p| p.park == park && p.facility_name == facility_name && p.date == date)
            .cloned()
            .collect();
        passes.sort_by_key(|p| p.creation_date);
        Ok(passes)
    }

    async fn passes_for_slot(&self, park: &str, facility_name: &str, date: NaiveDate, slot: SlotType) -> Result<Vec<Pass>> {
        let mut passes: Vec<Pass> = self
            .read()
            .passes
            .values()
            .filter(|p| p.park == park && p.facility_name == facility_name && p.date == date && p.slot == slot)
            .cloned()
            .collect();
        passes.sort_by_key(|p| p.creation_date);
        Ok(passes)
    }

    async fn passes_by_status(&self, status: PassStatus) -> Result<Vec<Pass>> {
        let mut passes: Vec<Pass> =
            self.read().passes.values().filter(|p| p.status == status).cloned().collect();
        passes.sort_by_key(|p| p.creation_date);
        Ok(passes)
    }

    async fn find_visitor_pass(
        &self,
        park: &str,
        facility_name: &str,
        date: NaiveDate,
        slot: SlotType,
        email: &str,
    ) -> Result<Option<Pass>> {
        Ok(self
            .read()
            .passes
            .values()
            .find(|p| {
                p.park == park
                    && p.facility_name == facility_name
                    && p.date == date
                    && p.slot == slot
                    && p.is_committed()
                    && p.visitor.email.as_deref() == Some(email)
            })
            .cloned())
    }

    async fn set_pass_overbooked(&self, key: &PassKey, overbooked: bool) -> Result<Pass> {
        let mut inner = self.write();
        let pass = inner
            .passes
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("pass {}", key.registration_number)))?;
        pass.is_overbooked = overbooked;
        Ok(pass.clone())
    }

    async fn transition_pass(
        &self,
        key: &PassKey,
        from: &[PassStatus],
        to: PassStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome> {
        let mut inner = self.write();
        let pass = inner
            .passes
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("pass {}", key.registration_number)))?;
        if !from.contains(&pass.status) {
            return Ok(TransitionOutcome::Skipped);
        }
        pass.status = to;
        pass.date_updated = now;
        pass.audit.push(AuditEntry { by: actor.to_string(), status: to, at: now });
        Ok(TransitionOutcome::Applied(Box::new(pass.clone())))
    }

    async fn promote_hold(
        &self,
        key: &PassKey,
        details: VisitorDetails,
        status: PassStatus,
        now: DateTime<Utc>,
    ) -> Result<Pass> {
        let mut inner = self.write();
        let pass = inner
            .passes
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("pass {}", key.registration_number)))?;
        if pass.status != PassStatus::Hold {
            return Err(Error::validation(format!(
                "Pass {} is not awaiting confirmation",
                key.registration_number
            )));
        }
        pass.status = status;
        pass.visitor = details;
        pass.date_updated = now;
        pass.audit.push(AuditEntry { by: "system".to_string(), status, at: now });
        Ok(pass.clone())
    }

    async fn cancel_pass(
        &self,
        key: &PassKey,
        restore: Option<CapacityRestore>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Pass, CancelFailure> {
        let mut inner = self.write();

        let status = match inner.passes.get(key) {
            Some(pass) => pass.status,
            None => return Err(CancelFailure::MissingPass),
        };
        if !matches!(status, PassStatus::Reserved | PassStatus::Active) {
            return Err(CancelFailure::NotCancellable(status));
        }

        if let Some(restore) = restore {
            let pool = inner
                .pools
                .get_mut(&restore.pool)
                .ok_or_else(|| CancelFailure::Storage(format!("pool for {} is missing", restore.pool.date)))?;
            let capacity = pool
                .capacities
                .get_mut(&restore.slot)
                .ok_or_else(|| CancelFailure::Storage(format!("slot {} is missing", restore.slot)))?;
            capacity.available_passes += restore.guests as i64;
        }

        let pass = inner.passes.get_mut(key).ok_or(CancelFailure::MissingPass)?;
        pass.status = PassStatus::Cancelled;
        pass.date_updated = now;
        pass.audit.push(AuditEntry { by: actor.to_string(), status: PassStatus::Cancelled, at: now });
        Ok(pass.clone())
    }

    async fn set_checked_in(&self, key: &PassKey, checked_in: bool, now: DateTime<Utc>) -> Result<Pass> {
        let mut inner = self.write();
        let pass = inner
            .passes
            .get_mut(key)
            .ok_or_else(|| Error::not_found(format!("pass {}", key.registration_number)))?;
        pass.checked_in = checked_in;
        pass.checked_in_time = if checked_in { Some(now) } else { None };
        pass.date_updated = now;
        Ok(pass.clone())
    }
}

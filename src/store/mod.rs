//! Storage contract of the engine.
//!
//! Every invocation of the engine is stateless; all coordination between
//! concurrent bookings, capacity edits and sweeps happens through the
//! conditional-write and transaction primitives defined here. The trait is
//! written against the semantics of a document store with a composite
//! primary key, per-item conditional updates and multi-item all-or-nothing
//! transactions whose per-item failure reasons are distinguishable.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::facility::{Facility, FacilityState, SlotType};
use crate::domain::pass::{Pass, PassStatus, VisitorDetails};
use crate::domain::pool::{ReservationPool, SlotCapacity};
use crate::error::Result;

/// Key of a facility record: park code + facility name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FacilityKey {
    pub park: String,
    pub name: String,
}

impl FacilityKey {
    pub fn new(park: &str, name: &str) -> FacilityKey {
        FacilityKey { park: park.to_string(), name: name.to_string() }
    }
}

/// Key of a reservation pool: facility + calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub park: String,
    pub facility_name: String,
    pub date: NaiveDate,
}

impl PoolKey {
    pub fn new(park: &str, facility_name: &str, date: NaiveDate) -> PoolKey {
        PoolKey { park: park.to_string(), facility_name: facility_name.to_string(), date }
    }
}

/// Key of a pass record: park code + registration number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PassKey {
    pub park: String,
    pub registration_number: String,
}

impl PassKey {
    pub fn new(park: &str, registration_number: &str) -> PassKey {
        PassKey { park: park.to_string(), registration_number: registration_number.to_string() }
    }

    pub fn of(pass: &Pass) -> PassKey {
        PassKey::new(&pass.park, &pass.registration_number)
    }
}

/// The three-part atomic booking transaction.
///
/// All parts commit or none do: (1) a condition-only check that the
/// facility lock is not held, (2) the pool decrement conditioned on
/// sufficient availability, (3) the pass insert conditioned on key
/// non-existence.
#[derive(Debug, Clone)]
pub struct BookingWrite {
    pub facility: FacilityKey,
    pub pool: PoolKey,
    pub slot: SlotType,
    pub guests: u32,
    pub pass: Pass,
}

/// Typed per-item failure of the booking transaction. Which condition
/// failed determines the user-facing outcome, so implementations must
/// never collapse these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingFailure {
    /// Part 1 failed: `is_updating` was true.
    FacilityLocked,
    /// Part 2 failed: `available_passes < guests`.
    SoldOut,
    /// Part 3 failed: a pass with this key already exists.
    DuplicatePass,
    /// The referenced facility or pool row is missing.
    MissingRecord(String),
    /// Any other storage failure.
    Storage(String),
}

/// Result of a conditional status transition.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The condition held and the row was updated.
    Applied(Box<Pass>),
    /// The row was no longer in a source state; nothing was written.
    /// Overlapping sweep runs land here instead of double-applying.
    Skipped,
}

/// Pool increment executed atomically with a cancellation.
#[derive(Debug, Clone)]
pub struct CapacityRestore {
    pub pool: PoolKey,
    pub slot: SlotType,
    pub guests: u32,
}

/// Typed failure of the cancellation update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelFailure {
    /// The pass was not in a cancellable state (already cancelled,
    /// expired, or still a hold).
    NotCancellable(PassStatus),
    /// The pass does not exist.
    MissingPass,
    Storage(String),
}

#[async_trait]
pub trait Store: std::fmt::Debug + Send + Sync {
    //--------------------------
    // --- Facility Methods ---
    //--------------------------

    async fn get_facility(&self, key: &FacilityKey) -> Result<Option<Facility>>;

    /// Create-if-absent; returns false when the facility already existed.
    async fn create_facility(&self, facility: Facility) -> Result<bool>;

    /// Unconditional field overwrite. Only used while holding the
    /// facility lock.
    async fn update_facility(&self, facility: Facility) -> Result<()>;

    /// Conditional `is_updating: false -> true`. Returns the locked
    /// snapshot, or `None` when the flag was already set.
    async fn try_lock_facility(&self, key: &FacilityKey) -> Result<Option<Facility>>;

    /// Unconditional reset of `is_updating` to false.
    async fn unlock_facility(&self, key: &FacilityKey) -> Result<()>;

    //----------------------
    // --- Pool Methods ---
    //----------------------

    /// Idempotent create-if-absent; returns false when the pool already
    /// existed (which is not an error).
    async fn create_pool_if_absent(&self, pool: ReservationPool) -> Result<bool>;

    async fn get_pool(&self, key: &PoolKey) -> Result<Option<ReservationPool>>;

    /// Range query: every pool of the facility dated on or after `date`,
    /// ascending.
    async fn pools_on_or_after(&self, park: &str, facility_name: &str, date: NaiveDate) -> Result<Vec<ReservationPool>>;

    /// Unconditional overwrite of one slot's capacity triple. Resizer
    /// only; the resizer computes the new `available_passes` itself.
    async fn set_pool_capacity(&self, key: &PoolKey, slot: SlotType, capacity: SlotCapacity) -> Result<()>;

    /// Stamps open/closed metadata on the pool, independent of the
    /// capacity math.
    async fn set_pool_status(&self, key: &PoolKey, status: FacilityState) -> Result<()>;

    //----------------------
    // --- Pass Methods ---
    //----------------------

    /// The atomic booking transaction (lock check + decrement + insert).
    async fn commit_booking(&self, write: BookingWrite) -> std::result::Result<(), BookingFailure>;

    async fn get_pass(&self, key: &PassKey) -> Result<Option<Pass>>;

    /// Every pass of the facility on the date, all slots.
    async fn passes_for_date(&self, park: &str, facility_name: &str, date: NaiveDate) -> Result<Vec<Pass>>;

    /// Every pass of the facility on (date, slot).
    async fn passes_for_slot(&self, park: &str, facility_name: &str, date: NaiveDate, slot: SlotType) -> Result<Vec<Pass>>;

    /// Status-index query across all facilities, used by the sweeps.
    async fn passes_by_status(&self, status: PassStatus) -> Result<Vec<Pass>>;

    /// Duplicate-booking guard lookup: a committed (reserved or active)
    /// pass for the same visitor email, facility, date and slot.
    async fn find_visitor_pass(
        &self,
        park: &str,
        facility_name: &str,
        date: NaiveDate,
        slot: SlotType,
        email: &str,
    ) -> Result<Option<Pass>>;

    /// Flag flip used by the capacity resizer.
    async fn set_pass_overbooked(&self, key: &PassKey, overbooked: bool) -> Result<Pass>;

    /// Conditional status transition: applied only while the pass is in
    /// one of `from`. Appends an audit entry on success.
    async fn transition_pass(
        &self,
        key: &PassKey,
        from: &[PassStatus],
        to: PassStatus,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome>;

    /// Promotes a hold pass to the given committed status, attaching the
    /// visitor's contact details and an audit entry.
    async fn promote_hold(
        &self,
        key: &PassKey,
        details: VisitorDetails,
        status: PassStatus,
        now: DateTime<Utc>,
    ) -> Result<Pass>;

    /// Cancellation conditioned on the pass still being reserved or
    /// active. When `restore` is given, the pool increment happens in the
    /// same atomic update as the status change.
    async fn cancel_pass(
        &self,
        key: &PassKey,
        restore: Option<CapacityRestore>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Pass, CancelFailure>;

    /// Check-in toggle, independent of pass status.
    async fn set_checked_in(&self, key: &PassKey, checked_in: bool, now: DateTime<Utc>) -> Result<Pass>;
}

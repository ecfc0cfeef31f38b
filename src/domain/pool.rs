use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::facility::{Facility, FacilityState, SlotType};

/// Per-slot capacity triple of a reservation pool.
///
/// `available_passes` is the remaining bookable count:
/// `base_capacity + capacity_modifier - committed guests`, adjusted by
/// overbooking reconciliation. The persisted value used for decrementing
/// stays >= 0; negative intermediates exist only inside a single resize
/// computation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotCapacity {
    /// Nominal slots configured on the facility when the pool was created
    /// or last resized.
    pub base_capacity: u32,

    /// Administrator-applied delta for this specific date. Can be
    /// negative.
    pub capacity_modifier: i64,

    /// Remaining bookable slots.
    pub available_passes: i64,
}

impl SlotCapacity {
    pub fn seeded(max: u32) -> SlotCapacity {
        SlotCapacity { base_capacity: max, capacity_modifier: 0, available_passes: max as i64 }
    }
}

/// The per-facility, per-date capacity record all bookings decrement.
///
/// Created lazily via create-if-absent on the first booking attempt or the
/// first administrative edit touching the date; after creation it is only
/// rewritten through the capacity resizer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReservationPool {
    pub park: String,
    pub facility_name: String,
    pub date: NaiveDate,
    pub capacities: BTreeMap<SlotType, SlotCapacity>,
    /// Facility open/closed state at last write; metadata for downstream
    /// reporting, not consulted by the capacity math.
    pub status: FacilityState,
}

impl ReservationPool {
    /// Seeds a fresh pool from the facility's current slot configuration:
    /// available = base = configured max, modifier = 0.
    pub fn seeded_from(facility: &Facility, date: NaiveDate) -> ReservationPool {
        let capacities = facility
            .booking_times
            .iter()
            .map(|(slot, time)| (*slot, SlotCapacity::seeded(time.max)))
            .collect();

        ReservationPool {
            park: facility.park.clone(),
            facility_name: facility.name.clone(),
            date,
            capacities,
            status: facility.status.state,
        }
    }
}

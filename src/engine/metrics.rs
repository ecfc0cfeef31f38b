//! Daily utilization snapshot for one (facility, date).

use std::collections::BTreeMap;

use chrono::{NaiveDate, Timelike};
use serde::Serialize;

use crate::domain::facility::SlotType;
use crate::domain::pass::PassStatus;
use crate::domain::pool::ReservationPool;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::store::{FacilityKey, PoolKey};

/// Capacity view of one slot within a metric.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SlotMetric {
    pub base_capacity: u32,
    pub capacity_modifier: i64,
    pub available_passes: i64,
    /// The slot still has passes or a pool entry but was removed from the
    /// facility's configuration.
    pub slot_deleted: bool,
}

/// Aggregated utilization of one facility on one date.
#[derive(Debug, Clone, Serialize)]
pub struct FacilityMetric {
    pub park: String,
    pub facility_name: String,
    pub date: NaiveDate,

    pub capacities: BTreeMap<SlotType, SlotMetric>,

    /// Guests per pass status.
    pub pass_statuses: BTreeMap<PassStatus, u32>,

    /// Committed or spent guests: reserved + active + expired.
    pub total_passes: u32,
    pub cancelled: u32,
    pub overbooked: u32,
    pub checked_in: u32,

    /// Whether the committed guests meet or exceed the configured total.
    pub fully_booked: bool,

    /// Check-ins per facility-local hour. Only populated for today and
    /// past dates; future dates have nothing to bucket.
    pub hourly_check_ins: Option<[u32; 24]>,
}

impl Engine {
    /// Builds the utilization snapshot of one (facility, date).
    pub async fn create_metric(&self, park: &str, facility_name: &str, date: NaiveDate) -> Result<FacilityMetric> {
        let facility_key = FacilityKey::new(park, facility_name);
        let facility = self
            .store()
            .get_facility(&facility_key)
            .await?
            .ok_or_else(|| Error::not_found(format!("Facility {facility_name}")))?;

        // Dates no booking or edit ever touched have no pool; report them
        // as if freshly seeded.
        let pool = match self.store().get_pool(&PoolKey::new(park, facility_name, date)).await? {
            Some(pool) => pool,
            None => ReservationPool::seeded_from(&facility, date),
        };
        let passes = self.store().passes_for_date(park, facility_name, date).await?;

        let mut capacities: BTreeMap<SlotType, SlotMetric> = pool
            .capacities
            .iter()
            .map(|(slot, capacity)| {
                (*slot, SlotMetric {
                    base_capacity: capacity.base_capacity,
                    capacity_modifier: capacity.capacity_modifier,
                    available_passes: capacity.available_passes,
                    slot_deleted: !facility.booking_times.contains_key(slot),
                })
            })
            .collect();

        let mut pass_statuses: BTreeMap<PassStatus, u32> = BTreeMap::new();
        let mut overbooked = 0;
        let mut checked_in = 0;
        let mut buckets = [0u32; 24];

        for pass in &passes {
            *pass_statuses.entry(pass.status).or_default() += pass.number_of_guests;

            // Passes stranded on a slot the facility no longer offers
            // show up as a deleted-slot entry and count as overbooked.
            let slot_deleted = capacities
                .entry(pass.slot)
                .or_insert(SlotMetric {
                    base_capacity: 0,
                    capacity_modifier: 0,
                    available_passes: 0,
                    slot_deleted: true,
                })
                .slot_deleted;

            if pass.is_committed() && (pass.is_overbooked || slot_deleted) {
                overbooked += pass.number_of_guests;
            }
            if pass.checked_in {
                checked_in += pass.number_of_guests;
                if let Some(at) = pass.checked_in_time {
                    let local = at.with_timezone(&self.config().local_offset());
                    buckets[local.hour() as usize] += pass.number_of_guests;
                }
            }
        }

        let total_passes = [PassStatus::Reserved, PassStatus::Active, PassStatus::Expired]
            .iter()
            .filter_map(|status| pass_statuses.get(status))
            .sum();
        let cancelled = pass_statuses.get(&PassStatus::Cancelled).copied().unwrap_or(0);

        let configured_total: i64 = capacities
            .values()
            .filter(|c| !c.slot_deleted)
            .map(|c| c.base_capacity as i64 + c.capacity_modifier)
            .sum();
        let fully_booked = total_passes as i64 >= configured_total;

        let hourly_check_ins = (date <= self.local_date(self.now())).then_some(buckets);

        Ok(FacilityMetric {
            park: park.to_string(),
            facility_name: facility_name.to_string(),
            date,
            capacities,
            pass_statuses,
            total_passes,
            cancelled,
            overbooked,
            checked_in,
            fully_booked,
            hourly_check_ins,
        })
    }
}

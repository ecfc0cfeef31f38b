use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::facility::{BookingDays, BookingTime, FacilityState, FacilityStatus, SlotType};
use crate::engine::resize::FacilityEdit;
use crate::store::PoolKey;

/// An administrator's facility edit as received from a client. The
/// `bookingTimes` map is the full replacement configuration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityUpdateDto {
    pub park_orcs: String,
    pub facility_name: String,
    pub booking_times: BTreeMap<SlotType, BookingTimeDto>,
    pub state: FacilityState,
    pub visible: bool,
    pub booking_opening_hour: Option<u32>,
    pub booking_days_ahead: Option<u32>,
    pub booking_days: Option<BookingDays>,
    pub bookable_holidays: Option<Vec<NaiveDate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingTimeDto {
    pub max: u32,
}

impl From<FacilityUpdateDto> for FacilityEdit {
    fn from(dto: FacilityUpdateDto) -> FacilityEdit {
        FacilityEdit {
            booking_times: dto
                .booking_times
                .into_iter()
                .map(|(slot, time)| (slot, BookingTime { max: time.max }))
                .collect(),
            status: FacilityStatus { state: dto.state },
            visible: dto.visible,
            booking_opening_hour: dto.booking_opening_hour,
            booking_days_ahead: dto.booking_days_ahead,
            booking_days: dto.booking_days,
            bookable_holidays: dto.bookable_holidays,
        }
    }
}

/// A per-date capacity modifier edit. The modifier is the absolute new
/// value for the (date, slot), not a delta.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifierUpdateDto {
    pub park_orcs: String,
    pub facility_name: String,
    pub date: NaiveDate,
    pub booking_time: SlotType,
    pub capacity_modifier: i64,
}

impl ModifierUpdateDto {
    pub fn pool_key(&self) -> PoolKey {
        PoolKey::new(&self.park_orcs, &self.facility_name, self.date)
    }
}

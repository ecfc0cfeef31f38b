use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// A named booking window within a facility's day. Each slot type carries
/// its own capacity and its own opening boundary: PM slots open at the
/// configured PM hour, AM and DAY slots at the facility's opening hour.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SlotType {
    /// Morning window. Closes when the PM window opens.
    #[serde(rename = "AM")]
    Am,
    /// Afternoon window.
    #[serde(rename = "PM")]
    Pm,
    /// All-day window.
    #[serde(rename = "DAY")]
    Day,
}

impl std::fmt::Display for SlotType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotType::Am => write!(f, "AM"),
            SlotType::Pm => write!(f, "PM"),
            SlotType::Day => write!(f, "DAY"),
        }
    }
}

/// The physical kind of a facility. Determines the per-pass guest limit.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilityType {
    /// One vehicle per pass; guest counts are coerced to 1.
    Parking,
    /// Up to four guests per pass.
    Trail,
}

/// Open/closed state of a facility (and, as metadata, of a pool).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FacilityState {
    Open,
    Closed,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FacilityStatus {
    pub state: FacilityState,
}

/// Nominal slot configuration on the facility record.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingTime {
    /// Nominal maximum guests for this slot type.
    pub max: u32,
}

/// Which weekdays accept bookings. Defaults to every day.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BookingDays {
    pub sunday: bool,
    pub monday: bool,
    pub tuesday: bool,
    pub wednesday: bool,
    pub thursday: bool,
    pub friday: bool,
    pub saturday: bool,
}

impl Default for BookingDays {
    fn default() -> Self {
        BookingDays {
            sunday: true,
            monday: true,
            tuesday: true,
            wednesday: true,
            thursday: true,
            friday: true,
            saturday: true,
        }
    }
}

impl BookingDays {
    pub fn allows(&self, weekday: Weekday) -> bool {
        match weekday {
            Weekday::Sun => self.sunday,
            Weekday::Mon => self.monday,
            Weekday::Tue => self.tuesday,
            Weekday::Wed => self.wednesday,
            Weekday::Thu => self.thursday,
            Weekday::Fri => self.friday,
            Weekday::Sat => self.saturday,
        }
    }
}

/// A bookable location within a park: a parking lot or a trailhead.
///
/// The facility record owns the nominal slot configuration and the
/// `is_updating` lock flag. It is mutated only through locked capacity
/// edits; bookings read the lock flag inside their transaction but never
/// set it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Facility {
    /// Owning park code.
    pub park: String,

    /// Facility name, unique within the park.
    pub name: String,

    pub facility_type: FacilityType,

    /// Slot type -> nominal maximum. Slot types absent from this map are
    /// not bookable.
    pub booking_times: BTreeMap<SlotType, BookingTime>,

    pub status: FacilityStatus,

    /// Hidden facilities reject public bookings.
    pub visible: bool,

    /// The facility lock flag. `true` while an administrative capacity
    /// edit is in progress; bookings are rejected for its duration.
    pub is_updating: bool,

    /// Facility override of the AM/DAY opening hour (24h local time).
    pub booking_opening_hour: Option<u32>,

    /// Facility override of the booking look-ahead window in days.
    pub booking_days_ahead: Option<u32>,

    /// Weekday bookability.
    pub booking_days: BookingDays,

    /// Dates bookable even when their weekday is closed.
    pub bookable_holidays: Vec<NaiveDate>,
}

impl Facility {
    /// Whether a date is bookable per weekday rules and holiday
    /// exceptions. Look-ahead windowing is checked separately.
    pub fn allows_date(&self, date: NaiveDate) -> bool {
        self.booking_days.allows(date.weekday()) || self.bookable_holidays.contains(&date)
    }

    /// Per-pass guest ceiling for this facility kind.
    pub fn max_guests(&self, trail_max: u32, parking_max: u32) -> u32 {
        match self.facility_type {
            FacilityType::Trail => trail_max,
            FacilityType::Parking => parking_max,
        }
    }
}

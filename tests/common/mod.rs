//! Shared harness for the integration suites: an engine over the
//! in-memory store with a settable clock and a capturing notifier.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use daypass_engine::authz::Permissions;
use daypass_engine::clock::MockClock;
use daypass_engine::config::EngineConfig;
use daypass_engine::domain::facility::{
    BookingDays, BookingTime, Facility, FacilityState, FacilityStatus, FacilityType, SlotType,
};
use daypass_engine::domain::pass::VisitorDetails;
use daypass_engine::engine::booking::BookingRequest;
use daypass_engine::engine::Engine;
use daypass_engine::notify::mock::MockNotifier;
use daypass_engine::store::memory::MemoryStore;
use daypass_engine::store::{PassKey, PoolKey, Store};

pub struct Harness {
    pub engine: Engine,
    pub store: Arc<MemoryStore>,
    pub clock: MockClock,
    pub notifier: MockNotifier,
}

/// UTC instant corresponding to a facility-local wall time (the default
/// configuration puts facilities at UTC-8).
pub fn utc_at(date: NaiveDate, local_hour: u32) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(local_hour, 0, 0).unwrap()) + Duration::hours(8)
}

/// 2024-07-01, a Monday; the harness clock starts at 09:00 local.
pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = MockClock::new(utc_at(start_date(), 9));
    let notifier = MockNotifier::default();
    let engine = Engine::new(
        store.clone(),
        Arc::new(clock.clone()),
        Arc::new(notifier.clone()),
        EngineConfig::default(),
    );
    Harness { engine, store, clock, notifier }
}

pub fn trail(name: &str, times: &[(SlotType, u32)]) -> Facility {
    Facility {
        park: "0363".to_string(),
        name: name.to_string(),
        facility_type: FacilityType::Trail,
        booking_times: times.iter().map(|(slot, max)| (*slot, BookingTime { max: *max })).collect::<BTreeMap<_, _>>(),
        status: FacilityStatus { state: FacilityState::Open },
        visible: true,
        is_updating: false,
        booking_opening_hour: None,
        booking_days_ahead: None,
        booking_days: BookingDays::default(),
        bookable_holidays: vec![],
    }
}

pub fn parking(name: &str, max: u32) -> Facility {
    Facility {
        facility_type: FacilityType::Parking,
        park: "0015".to_string(),
        ..trail(name, &[(SlotType::Day, max)])
    }
}

pub fn request(facility: &Facility, date: NaiveDate, slot: SlotType, guests: u32, email: &str) -> BookingRequest {
    BookingRequest {
        park: facility.park.clone(),
        facility_name: facility.name.clone(),
        date,
        slot,
        number_of_guests: guests,
        visitor: VisitorDetails { email: Some(email.to_string()), ..Default::default() },
        hold: false,
    }
}

pub fn public() -> Permissions {
    Permissions::public()
}

pub fn admin() -> Permissions {
    Permissions::sysadmin()
}

pub async fn available(store: &MemoryStore, facility: &Facility, date: NaiveDate, slot: SlotType) -> i64 {
    let key = PoolKey::new(&facility.park, &facility.name, date);
    store.get_pool(&key).await.unwrap().unwrap().capacities[&slot].available_passes
}

pub async fn pass_status(
    store: &MemoryStore,
    facility: &Facility,
    registration_number: &str,
) -> daypass_engine::domain::pass::PassStatus {
    let key = PassKey::new(&facility.park, registration_number);
    store.get_pass(&key).await.unwrap().unwrap().status
}

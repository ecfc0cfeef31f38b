mod common;

use std::collections::BTreeMap;

use chrono::Duration;

use daypass_engine::domain::facility::{BookingTime, FacilityState, FacilityStatus, SlotType};
use daypass_engine::domain::pass::{Pass, PassStatus};
use daypass_engine::engine::resize::FacilityEdit;
use daypass_engine::error::Error;
use daypass_engine::notify::Notification;
use daypass_engine::store::{FacilityKey, PassKey, PoolKey, Store};

use common::*;

fn edit(times: &[(SlotType, u32)]) -> FacilityEdit {
    FacilityEdit {
        booking_times: times.iter().map(|(slot, max)| (*slot, BookingTime { max: *max })).collect::<BTreeMap<_, _>>(),
        status: FacilityStatus { state: FacilityState::Open },
        visible: true,
        booking_opening_hour: None,
        booking_days_ahead: None,
        booking_days: None,
        bookable_holidays: None,
    }
}

async fn committed_guests(h: &Harness, park: &str, name: &str, date: chrono::NaiveDate, slot: SlotType) -> i64 {
    h.store
        .passes_for_slot(park, name, date, slot)
        .await
        .unwrap()
        .iter()
        .filter(|p| p.is_committed() && !p.is_overbooked)
        .map(|p| p.number_of_guests as i64)
        .sum()
}

/// Steady-state capacity invariant of one (facility, date, slot).
async fn assert_invariant(h: &Harness, facility: &daypass_engine::domain::facility::Facility, date: chrono::NaiveDate, slot: SlotType) {
    let pool = h.store.get_pool(&PoolKey::new(&facility.park, &facility.name, date)).await.unwrap().unwrap();
    let capacity = pool.capacities[&slot];
    let committed = committed_guests(h, &facility.park, &facility.name, date, slot).await;
    assert_eq!(
        capacity.available_passes,
        capacity.base_capacity as i64 + capacity.capacity_modifier - committed,
        "invariant violated for {slot} on {date}"
    );
}

/// Books three passes (2, 2, 1 guests) at one-minute intervals so their
/// creation order is unambiguous. Returns them oldest first.
async fn book_three(h: &Harness, facility: &daypass_engine::domain::facility::Facility, date: chrono::NaiveDate) -> Vec<Pass> {
    let mut passes = Vec::new();
    for (minutes, guests, email) in [(0, 2, "a@example.com"), (1, 2, "b@example.com"), (2, 1, "c@example.com")] {
        h.clock.set(utc_at(start_date(), 9) + Duration::minutes(minutes));
        passes.push(h.engine.book(request(facility, date, SlotType::Day, guests, email), &public()).await.unwrap());
    }
    passes
}

#[tokio::test]
async fn capacity_cut_overbooks_newest_bookings_first() {
    let h = harness();
    let facility = trail("Cheakamus", &[(SlotType::Day, 5)]);
    h.store.create_facility(facility.clone()).await.unwrap();
    let date = start_date() + Duration::days(1);
    let passes = book_three(&h, &facility, date).await;
    assert_eq!(available(&h.store, &facility, date, SlotType::Day).await, 0);

    let key = FacilityKey::new(&facility.park, &facility.name);
    h.engine.update_facility(&key, edit(&[(SlotType::Day, 2)]), &admin()).await.unwrap();

    // Shortfall of 3: the newest pass (1 guest) is not enough, the middle
    // one (2 guests) is flagged too. The oldest survives.
    let flags: Vec<bool> = {
        let mut flags = Vec::new();
        for pass in &passes {
            flags.push(h.store.get_pass(&PassKey::of(pass)).await.unwrap().unwrap().is_overbooked);
        }
        flags
    };
    assert_eq!(flags, vec![false, true, true]);
    assert_eq!(available(&h.store, &facility, date, SlotType::Day).await, 0);
    assert_invariant(&h, &facility, date, SlotType::Day).await;

    // Both flagged visitors were told.
    let overbooked_notices = h
        .notifier
        .sent
        .lock()
        .unwrap()
        .iter()
        .filter(|n| matches!(n, Notification::Overbooked { .. }))
        .count();
    assert_eq!(overbooked_notices, 2);
}

#[tokio::test]
async fn capacity_increase_reinstates_oldest_overbooked_first() {
    let h = harness();
    let facility = trail("Cheakamus", &[(SlotType::Day, 5)]);
    h.store.create_facility(facility.clone()).await.unwrap();
    let date = start_date() + Duration::days(1);
    let passes = book_three(&h, &facility, date).await;

    let key = FacilityKey::new(&facility.park, &facility.name);
    h.engine.update_facility(&key, edit(&[(SlotType::Day, 2)]), &admin()).await.unwrap();

    // +2: of the overbooked passes (2 and 1 guests), the older 2-guest
    // pass fits exactly; the 1-guest pass stays flagged.
    h.engine.update_facility(&key, edit(&[(SlotType::Day, 4)]), &admin()).await.unwrap();

    let middle = h.store.get_pass(&PassKey::of(&passes[1])).await.unwrap().unwrap();
    let newest = h.store.get_pass(&PassKey::of(&passes[2])).await.unwrap().unwrap();
    assert!(!middle.is_overbooked);
    assert!(newest.is_overbooked);
    assert_eq!(available(&h.store, &facility, date, SlotType::Day).await, 0);
    assert_invariant(&h, &facility, date, SlotType::Day).await;
}

#[tokio::test]
async fn reapplying_the_same_configuration_is_a_no_op() {
    let h = harness();
    let facility = trail("Cheakamus", &[(SlotType::Day, 5)]);
    h.store.create_facility(facility.clone()).await.unwrap();
    let date = start_date() + Duration::days(1);
    let passes = book_three(&h, &facility, date).await;

    let key = FacilityKey::new(&facility.park, &facility.name);
    h.engine.update_facility(&key, edit(&[(SlotType::Day, 2)]), &admin()).await.unwrap();
    let before = available(&h.store, &facility, date, SlotType::Day).await;

    h.engine.update_facility(&key, edit(&[(SlotType::Day, 2)]), &admin()).await.unwrap();

    assert_eq!(available(&h.store, &facility, date, SlotType::Day).await, before);
    for (pass, expected) in passes.iter().zip([false, true, true]) {
        let current = h.store.get_pass(&PassKey::of(pass)).await.unwrap().unwrap();
        assert_eq!(current.is_overbooked, expected);
    }
}

#[tokio::test]
async fn modifier_edit_adjusts_one_date_only() {
    let h = harness();
    let facility = trail("Cheakamus", &[(SlotType::Day, 5)]);
    h.store.create_facility(facility.clone()).await.unwrap();
    let date = start_date() + Duration::days(1);
    let other_date = start_date() + Duration::days(2);

    h.engine.book(request(&facility, date, SlotType::Day, 2, "a@example.com"), &public()).await.unwrap();
    h.engine.book(request(&facility, other_date, SlotType::Day, 2, "a@example.com"), &public()).await.unwrap();

    let pool_key = PoolKey::new(&facility.park, &facility.name, date);
    let capacity = h.engine.update_modifier(&pool_key, SlotType::Day, -2, &admin()).await.unwrap();

    assert_eq!(capacity.capacity_modifier, -2);
    assert_eq!(capacity.available_passes, 1);
    assert_invariant(&h, &facility, date, SlotType::Day).await;
    // The other date is untouched.
    assert_eq!(available(&h.store, &facility, other_date, SlotType::Day).await, 3);

    // A modifier cut below the committed guests overbooks.
    let capacity = h.engine.update_modifier(&pool_key, SlotType::Day, -4, &admin()).await.unwrap();
    assert_eq!(capacity.available_passes, 1);
    let passes = h.store.passes_for_slot(&facility.park, &facility.name, date, SlotType::Day).await.unwrap();
    assert!(passes[0].is_overbooked);
}

#[tokio::test]
async fn modifier_edits_reject_past_dates_and_negative_totals() {
    let h = harness();
    let facility = trail("Cheakamus", &[(SlotType::Day, 5)]);
    h.store.create_facility(facility.clone()).await.unwrap();

    let past = PoolKey::new(&facility.park, &facility.name, start_date() - Duration::days(1));
    let err = h.engine.update_modifier(&past, SlotType::Day, -1, &admin()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // A modifier that would push the total negative is skipped, leaving
    // the pool as it was.
    let pool_key = PoolKey::new(&facility.park, &facility.name, start_date() + Duration::days(1));
    let capacity = h.engine.update_modifier(&pool_key, SlotType::Day, -9, &admin()).await.unwrap();
    assert_eq!(capacity.capacity_modifier, 0);
    assert_eq!(capacity.available_passes, 5);
}

#[tokio::test]
async fn removing_a_slot_type_overbooks_all_its_passes() {
    let h = harness();
    let facility = trail("Cheakamus", &[(SlotType::Am, 10), (SlotType::Pm, 10)]);
    h.store.create_facility(facility.clone()).await.unwrap();
    let date = start_date() + Duration::days(1);

    let am = h.engine.book(request(&facility, date, SlotType::Am, 2, "a@example.com"), &public()).await.unwrap();
    let pm = h.engine.book(request(&facility, date, SlotType::Pm, 2, "b@example.com"), &public()).await.unwrap();

    let key = FacilityKey::new(&facility.park, &facility.name);
    h.engine.update_facility(&key, edit(&[(SlotType::Am, 10)]), &admin()).await.unwrap();

    let pm_pass = h.store.get_pass(&PassKey::of(&pm)).await.unwrap().unwrap();
    let am_pass = h.store.get_pass(&PassKey::of(&am)).await.unwrap().unwrap();
    assert!(pm_pass.is_overbooked);
    assert!(!am_pass.is_overbooked);

    let pool = h.store.get_pool(&PoolKey::new(&facility.park, &facility.name, date)).await.unwrap().unwrap();
    let removed = pool.capacities[&SlotType::Pm];
    assert_eq!((removed.base_capacity, removed.capacity_modifier, removed.available_passes), (0, 0, 0));
}

#[tokio::test]
async fn the_lock_is_released_after_an_edit() {
    let h = harness();
    let facility = trail("Cheakamus", &[(SlotType::Day, 5)]);
    h.store.create_facility(facility.clone()).await.unwrap();
    let date = start_date() + Duration::days(1);

    let key = FacilityKey::new(&facility.park, &facility.name);
    h.engine.update_facility(&key, edit(&[(SlotType::Day, 4)]), &admin()).await.unwrap();

    // Bookings work again immediately.
    h.engine.book(request(&facility, date, SlotType::Day, 1, "a@example.com"), &public()).await.unwrap();

    // And a second edit can take the lock.
    h.engine.update_facility(&key, edit(&[(SlotType::Day, 5)]), &admin()).await.unwrap();
}

#[tokio::test]
async fn edits_require_management_permission() {
    let h = harness();
    let facility = trail("Cheakamus", &[(SlotType::Day, 5)]);
    h.store.create_facility(facility.clone()).await.unwrap();

    let key = FacilityKey::new(&facility.park, &facility.name);
    let err = h.engine.update_facility(&key, edit(&[(SlotType::Day, 4)]), &public()).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    // The lock was never taken.
    let date = start_date() + Duration::days(1);
    h.engine.book(request(&facility, date, SlotType::Day, 1, "a@example.com"), &public()).await.unwrap();
}

#[tokio::test]
async fn metric_reports_overbooking_and_full_occupancy() {
    let h = harness();
    let facility = trail("Cheakamus", &[(SlotType::Day, 5)]);
    h.store.create_facility(facility.clone()).await.unwrap();
    let date = start_date() + Duration::days(1);

    for (i, email) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        h.clock.set(utc_at(start_date(), 9) + Duration::minutes(i as i64));
        h.engine
            .book(request(&facility, date, SlotType::Day, 1, &format!("{email}@example.com")), &public())
            .await
            .unwrap();
    }

    let key = FacilityKey::new(&facility.park, &facility.name);
    h.engine.update_facility(&key, edit(&[(SlotType::Day, 4)]), &admin()).await.unwrap();

    let metric = h.engine.create_metric(&facility.park, &facility.name, date).await.unwrap();
    assert_eq!(metric.total_passes, 5);
    assert_eq!(metric.overbooked, 1);
    assert_eq!(metric.cancelled, 0);
    assert!(metric.fully_booked);
    assert_eq!(metric.pass_statuses[&PassStatus::Reserved], 5);
    assert_eq!(metric.capacities[&SlotType::Day].base_capacity, 4);
    // Tomorrow has no check-ins to bucket yet.
    assert!(metric.hourly_check_ins.is_none());
}

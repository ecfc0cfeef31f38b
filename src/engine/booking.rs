//! Pass creation, hold confirmation and check-in.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{info, warn};

use crate::authz::Permissions;
use crate::domain::facility::{Facility, FacilityState, FacilityType, SlotType};
use crate::domain::pass::{Pass, PassStatus, VisitorDetails};
use crate::domain::pool::ReservationPool;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::notify::Notification;
use crate::store::{BookingFailure, BookingWrite, FacilityKey, PassKey, PoolKey};

/// A validated booking attempt against one (facility, date, slot).
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub park: String,
    pub facility_name: String,
    pub date: NaiveDate,
    pub slot: SlotType,
    pub number_of_guests: u32,
    pub visitor: VisitorDetails,
    /// When true the pass is created in the hold state and must be
    /// confirmed via [`Engine::confirm_hold`] before it counts as booked.
    pub hold: bool,
}

impl Engine {
    /// Books a pass.
    ///
    /// Validates the request against the facility's rules, lazily seeds
    /// the date's reservation pool, then runs the atomic booking
    /// transaction. A rejection because the facility lock was held is
    /// retried up to the configured number of times before surfacing as
    /// [`Error::Locked`].
    pub async fn book(&self, request: BookingRequest, permissions: &Permissions) -> Result<Pass> {
        let now = self.now();
        let facility_key = FacilityKey::new(&request.park, &request.facility_name);
        let facility = self
            .store()
            .get_facility(&facility_key)
            .await?
            .ok_or_else(|| Error::not_found(format!("Facility {}", request.facility_name)))?;

        let guests = self.validate(&request, &facility, permissions, now)?;

        if let Some(email) = request.visitor.email.as_deref() {
            if let Some(existing) = self
                .store()
                .find_visitor_pass(&request.park, &request.facility_name, request.date, request.slot, email)
                .await?
            {
                return Err(Error::Duplicate { registration_number: existing.registration_number });
            }
        }

        // Pools are created on first demand, seeded from the facility's
        // current slot configuration.
        let pool_key = PoolKey::new(&request.park, &request.facility_name, request.date);
        self.store().create_pool_if_absent(ReservationPool::seeded_from(&facility, request.date)).await?;

        let status = if request.hold {
            PassStatus::Hold
        } else {
            self.initial_status(&facility, request.date, request.slot, now)
        };

        let mut attempts = 0;
        let pass = loop {
            // Rebuilt each attempt so a registration number collision
            // gets a fresh number.
            let pass = Pass::new(
                &request.park,
                &request.facility_name,
                request.date,
                request.slot,
                guests,
                status,
                request.visitor.clone(),
                now,
            );
            let write = BookingWrite {
                facility: facility_key.clone(),
                pool: pool_key.clone(),
                slot: request.slot,
                guests,
                pass: pass.clone(),
            };

            match self.store().commit_booking(write).await {
                Ok(()) => break pass,
                Err(BookingFailure::FacilityLocked) => {
                    attempts += 1;
                    if attempts > self.config().transaction_retries {
                        return Err(Error::Locked);
                    }
                    warn!(
                        "Booking at {}/{} rejected by the facility lock, retry {attempts}",
                        request.park, request.facility_name
                    );
                }
                Err(BookingFailure::SoldOut) => return Err(Error::SoldOut),
                Err(BookingFailure::DuplicatePass) => {
                    attempts += 1;
                    if attempts > self.config().transaction_retries {
                        return Err(Error::internal("Could not allocate a unique registration number"));
                    }
                }
                Err(BookingFailure::MissingRecord(what)) => {
                    return Err(Error::internal(format!("Booking transaction referenced a missing record: {what}")));
                }
                Err(BookingFailure::Storage(message)) => return Err(Error::internal(message)),
            }
        };

        info!(
            "Booked pass {} at {}/{} for {} on {} ({} guest(s), {status})",
            pass.registration_number, pass.park, pass.facility_name, pass.slot, pass.date, guests
        );
        if !request.hold {
            if let Some(notification) = Notification::confirmed(&pass) {
                self.notifier.dispatch(notification);
            }
        }
        Ok(pass)
    }

    /// Confirms a held pass, attaching the visitor's contact details and
    /// moving it into the status its window currently dictates.
    pub async fn confirm_hold(&self, park: &str, registration_number: &str, details: VisitorDetails) -> Result<Pass> {
        let now = self.now();
        let key = PassKey::new(park, registration_number);
        let held = self
            .store()
            .get_pass(&key)
            .await?
            .ok_or_else(|| Error::not_found(format!("Pass {registration_number}")))?;

        let facility_key = FacilityKey::new(park, &held.facility_name);
        let facility = self
            .store()
            .get_facility(&facility_key)
            .await?
            .ok_or_else(|| Error::not_found(format!("Facility {}", held.facility_name)))?;

        // The duplicate guard runs again here: the visitor's email is only
        // known at confirmation time.
        if let Some(email) = details.email.as_deref() {
            if let Some(existing) = self
                .store()
                .find_visitor_pass(park, &held.facility_name, held.date, held.slot, email)
                .await?
            {
                return Err(Error::Duplicate { registration_number: existing.registration_number });
            }
        }

        let status = self.initial_status(&facility, held.date, held.slot, now);
        let pass = self.store().promote_hold(&key, details, status, now).await?;

        info!("Confirmed held pass {} at {}/{} ({status})", registration_number, park, pass.facility_name);
        if let Some(notification) = Notification::confirmed(&pass) {
            self.notifier.dispatch(notification);
        }
        Ok(pass)
    }

    /// Toggles the check-in flag at the gate. Independent of pass status.
    pub async fn check_in(&self, park: &str, registration_number: &str, checked_in: bool) -> Result<Pass> {
        let now = self.now();
        let key = PassKey::new(park, registration_number);
        if self.store().get_pass(&key).await?.is_none() {
            return Err(Error::not_found(format!("Pass {registration_number}")));
        }
        let pass = self.store().set_checked_in(&key, checked_in, now).await?;
        info!(
            "Pass {} at {} marked as {}",
            registration_number,
            park,
            if checked_in { "checked in" } else { "not checked in" }
        );
        Ok(pass)
    }

    /// Runs every pre-transaction validation and returns the effective
    /// guest count (parking bookings are coerced to the per-vehicle
    /// limit rather than rejected).
    fn validate(
        &self,
        request: &BookingRequest,
        facility: &Facility,
        permissions: &Permissions,
        now: DateTime<Utc>,
    ) -> Result<u32> {
        if !permissions.is_admin {
            if !facility.visible {
                return Err(Error::not_found(format!("Facility {}", facility.name)));
            }
            if facility.status.state == FacilityState::Closed {
                return Err(Error::validation(format!("Facility {} is closed", facility.name)));
            }
        }

        if !facility.booking_times.contains_key(&request.slot) {
            return Err(Error::validation(format!(
                "Facility {} has no {} booking time",
                facility.name, request.slot
            )));
        }

        if request.number_of_guests == 0 {
            return Err(Error::validation("A pass must cover at least one guest"));
        }
        let max = facility.max_guests(self.config().trail_max_guests, self.config().parking_max_guests);
        let guests = match facility.facility_type {
            FacilityType::Parking => request.number_of_guests.min(max),
            FacilityType::Trail => {
                if request.number_of_guests > max {
                    return Err(Error::validation(format!("A pass covers at most {max} guests")));
                }
                request.number_of_guests
            }
        };

        let today = self.local_date(now);
        if request.date < today {
            return Err(Error::validation("Booking date is in the past"));
        }
        if !facility.allows_date(request.date) {
            return Err(Error::validation(format!("Facility {} is not bookable on {}", facility.name, request.date)));
        }

        let days_ahead = facility.booking_days_ahead.unwrap_or(self.config().booking_days_ahead);
        let opening_hour = facility.booking_opening_hour.unwrap_or(self.config().am_opening_hour);
        let horizon = today + Duration::days(days_ahead as i64);
        if request.date > horizon {
            return Err(Error::validation(format!("Bookings open {days_ahead} day(s) in advance")));
        }
        // The furthest day of the window only opens once the facility's
        // opening hour has passed.
        if request.date == horizon && self.local_hour(now) < opening_hour {
            return Err(Error::validation(format!(
                "Bookings for {} open at {opening_hour}:00",
                request.date
            )));
        }

        Ok(guests)
    }

    /// Status a committed pass starts in: active when its window is
    /// already open on the booking day, reserved otherwise.
    pub(crate) fn initial_status(&self, facility: &Facility, date: NaiveDate, slot: SlotType, now: DateTime<Utc>) -> PassStatus {
        if date != self.local_date(now) {
            return PassStatus::Reserved;
        }
        let hour = self.local_hour(now);
        let open_at = match slot {
            SlotType::Pm => self.config().pm_opening_hour,
            SlotType::Am | SlotType::Day => facility.booking_opening_hour.unwrap_or(self.config().am_opening_hour),
        };
        if hour >= open_at {
            PassStatus::Active
        } else {
            PassStatus::Reserved
        }
    }
}

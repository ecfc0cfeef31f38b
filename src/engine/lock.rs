//! The facility edit lock.
//!
//! Administrative capacity edits run outside a single atomic write, so
//! they serialize against bookings through the `is_updating` flag on the
//! facility record. Acquisition is a conditional flip `false -> true`;
//! release is unconditional so a crashed edit can always be cleared.

use log::{error, info};

use crate::domain::facility::Facility;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::store::FacilityKey;

impl Engine {
    /// Acquires the edit lock on a facility and returns the locked
    /// snapshot. Fails with [`Error::Locked`] when another edit holds it.
    pub async fn lock_facility(&self, key: &FacilityKey) -> Result<Facility> {
        match self.store().try_lock_facility(key).await? {
            Some(facility) => {
                info!("Locked facility {}/{} for editing", key.park, key.name);
                Ok(facility)
            }
            None => Err(Error::Locked),
        }
    }

    /// Releases the edit lock. A failure here leaves the facility
    /// unbookable until an operator clears the flag, so it is logged at
    /// error level before being propagated.
    pub async fn release_facility(&self, key: &FacilityKey) -> Result<()> {
        match self.store().unlock_facility(key).await {
            Ok(()) => {
                info!("Released lock on facility {}/{}", key.park, key.name);
                Ok(())
            }
            Err(err) => {
                error!(
                    "FAILED to release lock on facility {}/{}: {err}. \
                     The facility stays locked and rejects all bookings until the flag is cleared manually.",
                    key.park, key.name
                );
                Err(Error::internal(format!("Could not release the lock on facility {}", key.name)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::clock::MockClock;
    use crate::config::EngineConfig;
    use crate::domain::facility::{
        BookingDays, BookingTime, FacilityState, FacilityStatus, FacilityType, SlotType,
    };
    use crate::notify::mock::MockNotifier;
    use crate::store::memory::MemoryStore;
    use crate::store::Store;

    async fn engine_with_facility() -> (Engine, FacilityKey) {
        let store = Arc::new(MemoryStore::new());
        let facility = Facility {
            park: "0363".to_string(),
            name: "Cheakamus".to_string(),
            facility_type: FacilityType::Trail,
            booking_times: BTreeMap::from([(SlotType::Day, BookingTime { max: 10 })]),
            status: FacilityStatus { state: FacilityState::Open },
            visible: true,
            is_updating: false,
            booking_opening_hour: None,
            booking_days_ahead: None,
            booking_days: BookingDays::default(),
            bookable_holidays: vec![],
        };
        store.create_facility(facility).await.unwrap();
        let engine = Engine::new(
            store,
            Arc::new(MockClock::new(Utc::now())),
            Arc::new(MockNotifier::default()),
            EngineConfig::default(),
        );
        (engine, FacilityKey::new("0363", "Cheakamus"))
    }

    #[tokio::test]
    async fn second_acquisition_is_rejected_until_release() {
        let (engine, key) = engine_with_facility().await;

        engine.lock_facility(&key).await.unwrap();
        assert!(matches!(engine.lock_facility(&key).await, Err(Error::Locked)));

        engine.release_facility(&key).await.unwrap();
        engine.lock_facility(&key).await.unwrap();
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (engine, key) = engine_with_facility().await;
        engine.release_facility(&key).await.unwrap();
        engine.release_facility(&key).await.unwrap();
    }
}

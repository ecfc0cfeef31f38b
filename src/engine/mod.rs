//! The engine facade and its operation modules.
//!
//! [`Engine`] wires the injected seams (store, clock, notifier, config)
//! together; the actual operations live in the submodules, each as an
//! `impl Engine` block:
//!
//! * [`booking`]   — pass creation, hold confirmation, check-in
//! * [`lock`]      — the facility edit lock
//! * [`resize`]    — capacity edits and overbooking reconciliation
//! * [`lifecycle`] — activation/expiry sweeps and cancellation
//! * [`metrics`]   — the daily utilization snapshot

pub mod booking;
pub mod lifecycle;
pub mod lock;
pub mod metrics;
pub mod resize;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Timelike, Utc};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::notify::Notifier;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct Engine {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Engine {
        Engine { store, clock, notifier, config }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// Today's date in facility-local wall time.
    pub(crate) fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.config.local_offset()).date_naive()
    }

    /// Current hour of the facility-local day.
    pub(crate) fn local_hour(&self, now: DateTime<Utc>) -> u32 {
        now.with_timezone(&self.config.local_offset()).hour()
    }
}

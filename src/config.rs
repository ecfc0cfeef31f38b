use std::fs;
use std::path::Path;

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::Result;

/// Runtime configuration for the reservation engine.
///
/// Every component receives this struct (or the `Engine` holding it) by
/// injection; there is no ambient/global configuration. Defaults mirror the
/// production service: AM/DAY slots open at 07:00 local, PM slots at 12:00,
/// bookings open 3 days ahead, facility-local time is UTC-8.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Offset of facility-local wall time from UTC, in hours.
    pub utc_offset_hours: i32,

    /// Default opening hour for AM and DAY slots (24h local time).
    /// A facility may override this via `booking_opening_hour`.
    pub am_opening_hour: u32,

    /// Opening hour for PM slots, which is also the closing boundary of
    /// the AM window. Not overridable per facility.
    pub pm_opening_hour: u32,

    /// Default booking look-ahead window in days, used when a facility
    /// does not set `booking_days_ahead`.
    pub booking_days_ahead: u32,

    /// Maximum guests per pass on a trail facility.
    pub trail_max_guests: u32,

    /// Maximum guests per pass on a parking facility. Parking bookings
    /// are coerced down to this value rather than rejected.
    pub parking_max_guests: u32,

    /// How many times the booking transaction is retried when it is
    /// rejected because the facility lock was held.
    pub transaction_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            utc_offset_hours: -8,
            am_opening_hour: 7,
            pm_opening_hour: 12,
            booking_days_ahead: 3,
            trail_max_guests: 4,
            parking_max_guests: 1,
            transaction_retries: 3,
        }
    }
}

impl EngineConfig {
    /// Loads a configuration from a JSON file. Missing fields fall back
    /// to the defaults above.
    pub fn from_file(path: impl AsRef<Path>) -> Result<EngineConfig> {
        let raw = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// The facility-local timezone as a fixed offset.
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is always valid"))
    }
}

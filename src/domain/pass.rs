use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::facility::SlotType;

/// Lifecycle state of a visitor pass.
///
/// `Hold` is an ephemeral pre-commitment state produced by the hold flow;
/// the time-driven sweeps move `Reserved` passes to `Active` and `Active`
/// passes to `Expired`. `Cancelled` is reachable from `Reserved` and
/// `Active` and is terminal. Passes are never deleted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PassStatus {
    /// Short-TTL pre-commitment; not yet counted as a committed guest.
    Hold,
    /// Booked for a future window.
    Reserved,
    /// The booked window is currently open.
    Active,
    /// The booked window has closed.
    Expired,
    /// Cancelled by the visitor or an administrator.
    Cancelled,
}

impl std::fmt::Display for PassStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassStatus::Hold => write!(f, "hold"),
            PassStatus::Reserved => write!(f, "reserved"),
            PassStatus::Active => write!(f, "active"),
            PassStatus::Expired => write!(f, "expired"),
            PassStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One immutable entry of a pass's audit trail. Entries are only ever
/// appended, never rewritten.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    /// Who performed the change: `system`, an administrator id, or the
    /// visitor.
    pub by: String,
    pub status: PassStatus,
    pub at: DateTime<Utc>,
}

/// Visitor contact details attached to a pass at commit time.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorDetails {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

/// One visitor reservation against a (facility, date, slot type).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Pass {
    pub park: String,

    /// 10-digit registration number; the pass key within its park.
    pub registration_number: String,

    pub facility_name: String,
    pub date: NaiveDate,
    pub slot: SlotType,
    pub number_of_guests: u32,
    pub status: PassStatus,

    /// Set by the capacity resizer when an administrative reduction
    /// retroactively pushed this pass over capacity. The booking is kept
    /// for manual resolution; it no longer counts against the pool.
    pub is_overbooked: bool,

    /// Independent of status; toggled at the gate.
    pub checked_in: bool,
    pub checked_in_time: Option<DateTime<Utc>>,

    pub visitor: VisitorDetails,

    pub creation_date: DateTime<Utc>,
    pub date_updated: DateTime<Utc>,

    /// Append-only status history.
    pub audit: Vec<AuditEntry>,
}

impl Pass {
    /// Builds a fresh pass with an initial audit entry recorded by the
    /// system actor.
    pub fn new(
        park: &str,
        facility_name: &str,
        date: NaiveDate,
        slot: SlotType,
        number_of_guests: u32,
        status: PassStatus,
        visitor: VisitorDetails,
        now: DateTime<Utc>,
    ) -> Pass {
        Pass {
            park: park.to_string(),
            registration_number: generate_registration_number(10),
            facility_name: facility_name.to_string(),
            date,
            slot,
            number_of_guests,
            status,
            is_overbooked: false,
            checked_in: false,
            checked_in_time: None,
            visitor,
            creation_date: now,
            date_updated: now,
            audit: vec![AuditEntry { by: "system".to_string(), status, at: now }],
        }
    }

    /// Whether this pass currently counts as a committed guest.
    pub fn is_committed(&self) -> bool {
        matches!(self.status, PassStatus::Reserved | PassStatus::Active)
    }
}

/// Generates a numeric registration number of the given length.
pub fn generate_registration_number(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length).map(|_| char::from(b'0' + rng.random_range(0..10u8))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_numbers_are_numeric_and_sized() {
        let number = generate_registration_number(10);
        assert_eq!(number.len(), 10);
        assert!(number.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn new_pass_starts_with_one_audit_entry() {
        let now = Utc::now();
        let pass = Pass::new(
            "0015",
            "P1 and Lower P5",
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            SlotType::Day,
            2,
            PassStatus::Reserved,
            VisitorDetails::default(),
            now,
        );
        assert_eq!(pass.audit.len(), 1);
        assert_eq!(pass.audit[0].by, "system");
        assert_eq!(pass.audit[0].status, PassStatus::Reserved);
        assert!(pass.is_committed());
        assert!(!pass.is_overbooked);
    }
}

use thiserror::Error;

/// Failure taxonomy for the reservation engine.
///
/// Booking and resize paths must map every storage-level rejection to
/// exactly one of these variants; `Locked`, `SoldOut` and `Duplicate`
/// require different caller behavior (retry vs. stop vs. look up the
/// existing reservation) and are never collapsed into a generic failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    /// Caller error detected before any storage access.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The facility is locked for an administrative capacity edit.
    /// Transient; the caller should try again shortly.
    #[error("This item is being updated by someone else. Please try again later.")]
    Locked,

    /// The pool decrement condition failed.
    #[error("We have sold out of allotted passes for this time, please check back on the site from time to time as new passes may come available.")]
    SoldOut,

    /// A non-cancelled pass already exists for this visitor, date and slot.
    #[error("A reservation for this booking time already exists (registration number {registration_number}).")]
    Duplicate { registration_number: String },

    #[error("{0} not found.")]
    NotFound(String),

    /// Any other storage or transaction failure. Logged with full context,
    /// surfaced without leaking internals.
    #[error("Something went wrong.")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Error {
        Error::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Error {
        Error::Internal(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Error {
        Error::NotFound(what.into())
    }

    /// True for failures a caller may safely retry by re-issuing the
    /// same idempotent request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Locked)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

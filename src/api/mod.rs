//! Request DTOs: the JSON shapes callers submit, kept separate from the
//! domain model and converted at the boundary.

pub mod booking_dto;
pub mod facility_dto;

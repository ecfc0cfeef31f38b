use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::facility::SlotType;
use crate::domain::pass::VisitorDetails;
use crate::engine::booking::BookingRequest;

/// A booking submission as received from a client.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDto {
    pub park_orcs: String,
    pub facility_name: String,
    pub date: NaiveDate,
    pub booking_time: SlotType,
    pub number_of_guests: u32,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    /// Request a hold instead of an immediate commitment.
    #[serde(default)]
    pub hold: bool,
}

impl From<BookingDto> for BookingRequest {
    fn from(dto: BookingDto) -> BookingRequest {
        BookingRequest {
            park: dto.park_orcs,
            facility_name: dto.facility_name,
            date: dto.date,
            slot: dto.booking_time,
            number_of_guests: dto.number_of_guests,
            visitor: VisitorDetails {
                email: dto.email,
                first_name: dto.first_name,
                last_name: dto.last_name,
                phone_number: dto.phone_number,
            },
            hold: dto.hold,
        }
    }
}

/// Contact details submitted when confirming a held pass.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmationDto {
    pub park_orcs: String,
    pub registration_number: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
}

impl ConfirmationDto {
    pub fn visitor_details(&self) -> VisitorDetails {
        VisitorDetails {
            email: Some(self.email.clone()),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone_number: self.phone_number.clone(),
        }
    }
}

//! Demo binary: seeds facilities from a JSON file and walks one day of
//! operation end to end (bookings, a capacity cut, the sweeps, a metric).

use std::fs;

use anyhow::Context;
use chrono::Duration;
use clap::Parser;
use log::info;

use daypass_engine::authz::{Authorizer, Permissions, StaticAuthorizer};
use daypass_engine::config::EngineConfig;
use daypass_engine::domain::facility::{BookingTime, Facility};
use daypass_engine::domain::pass::VisitorDetails;
use daypass_engine::engine::booking::BookingRequest;
use daypass_engine::engine::resize::FacilityEdit;
use daypass_engine::store::{FacilityKey, Store};
use daypass_engine::{default_engine, logger};

#[derive(Debug, Parser)]
#[command(about = "Capacity reservation engine demo")]
struct Args {
    /// JSON file with the facilities to seed.
    #[arg(long, default_value = "demos/facilities.json")]
    facilities: String,

    /// Optional engine configuration file.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path).with_context(|| format!("loading config from {path}"))?,
        None => EngineConfig::default(),
    };
    let engine = default_engine(config);

    let raw = fs::read_to_string(&args.facilities)
        .with_context(|| format!("reading facilities from {}", args.facilities))?;
    let facilities: Vec<Facility> = serde_json::from_str(&raw).context("parsing facilities")?;
    for facility in &facilities {
        engine.store().create_facility(facility.clone()).await?;
        info!("Seeded facility {}/{}", facility.park, facility.name);
    }

    let facility = facilities.first().context("the seed file has no facilities")?;
    let date = chrono::Utc::now().with_timezone(&engine.config().local_offset()).date_naive() + Duration::days(1);
    let slot = *facility.booking_times.keys().next().context("the facility has no booking times")?;
    // The demo stands in for the identity provider integration.
    let authorizer = StaticAuthorizer { permissions: Permissions::sysadmin() };
    let admin = authorizer.resolve("demo-admin-token");
    let public = Permissions::public();

    // A couple of visitor bookings.
    for (email, guests) in [("alice@example.com", 2), ("bob@example.com", 1)] {
        let pass = engine
            .book(
                BookingRequest {
                    park: facility.park.clone(),
                    facility_name: facility.name.clone(),
                    date,
                    slot,
                    number_of_guests: guests,
                    visitor: VisitorDetails { email: Some(email.to_string()), ..Default::default() },
                    hold: false,
                },
                &public,
            )
            .await?;
        info!("Issued pass {} for {email}", pass.registration_number);
    }

    // An administrator halves the slot's capacity.
    let key = FacilityKey::new(&facility.park, &facility.name);
    let mut booking_times = facility.booking_times.clone();
    let halved = booking_times[&slot].max / 2;
    booking_times.insert(slot, BookingTime { max: halved });
    info!("Halving {slot} capacity to {halved}");
    engine
        .update_facility(
            &key,
            FacilityEdit {
                booking_times,
                status: facility.status.clone(),
                visible: facility.visible,
                booking_opening_hour: None,
                booking_days_ahead: None,
                booking_days: None,
                bookable_holidays: None,
            },
            &admin,
        )
        .await?;

    // Run the time-driven sweeps once, concurrently.
    let now = chrono::Utc::now();
    let (activation, expiry) = futures::join!(engine.activation_sweep(now), engine.expiry_sweep(now));
    let (activation, expiry) = (activation?, expiry?);
    info!(
        "Sweeps done: {} activated, {} expired",
        activation.transitioned, expiry.transitioned
    );

    let metric = engine.create_metric(&facility.park, &facility.name, date).await?;
    println!("{}", serde_json::to_string_pretty(&metric)?);
    Ok(())
}

//! Dimension builders.
//!
//! Each builder takes the parsed label pairs of one domain (or the raw
//! demography rows) and returns the finished dimension table.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use super::{dedup_by_key, parse_int_id};
use crate::constants::*;
use crate::error::Result;
use crate::observability::metrics;
use crate::types::*;

static COUNTRY_PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(No Country|INVALID|Collapsed)").expect("valid regex"));

pub fn build_travel_modes(labels: Vec<LabelRecord>) -> Result<Table<TravelMode>> {
    let rows = labels
        .into_iter()
        .map(|l| {
            Ok(TravelMode {
                travel_mode_id: parse_int_id(DIM_TRAVEL_MODE, "travel_mode_id", &l.id)?,
                travel_mode_name: l.name,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(finish(DIM_TRAVEL_MODE, rows))
}

pub fn build_countries(labels: Vec<LabelRecord>) -> Result<Table<Country>> {
    let rows = labels
        .into_iter()
        .map(|l| {
            Ok(Country {
                country_id: parse_int_id(DIM_COUNTRY, "country_id", &l.id)?,
                country_name: normalize_country_name(l.name),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(finish(DIM_COUNTRY, rows))
}

/// Collapses placeholder country names ("No Country Code (...)",
/// "INVALID: ...", "Collapsed (...)") into the "NA" sentinel.
pub fn normalize_country_name(name: String) -> String {
    if COUNTRY_PLACEHOLDER_RE.is_match(&name) {
        COUNTRY_PLACEHOLDER.to_string()
    } else {
        name
    }
}

pub fn build_visa_categories(labels: Vec<LabelRecord>) -> Result<Table<VisaCategory>> {
    let rows = labels
        .into_iter()
        .map(|l| {
            Ok(VisaCategory {
                visa_category_id: parse_int_id(DIM_VISA_CATEGORY, "visa_category_id", &l.id)?,
                visa_category_name: l.name,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(finish(DIM_VISA_CATEGORY, rows))
}

pub fn build_us_states(labels: Vec<LabelRecord>) -> Table<UsState> {
    let rows: Vec<UsState> = labels
        .into_iter()
        .filter(|l| l.id != UNKNOWN_STATE_ID)
        .map(|l| UsState {
            us_state_id: l.id,
            us_state_name: l.name,
        })
        .collect();
    finish(DIM_US_STATES, rows)
}

pub fn build_airport_codes(labels: Vec<LabelRecord>) -> Table<AirportCode> {
    let rows: Vec<AirportCode> = labels
        .into_iter()
        .map(|l| {
            let (city, us_state_id) = split_airport_name(&l.name);
            AirportCode {
                airport_code: l.id,
                city,
                us_state_id,
            }
        })
        .collect();
    finish(DIM_AIRPORT_CODES, rows)
}

/// Splits "CITY, ST" on the first comma into the raw city and trimmed state.
fn split_airport_name(name: &str) -> (String, Option<String>) {
    match name.split_once(',') {
        Some((city, state)) => (city.to_string(), Some(state.trim().to_string())),
        None => (name.to_string(), None),
    }
}

pub fn build_city_demography(raw: Vec<RawDemographyRecord>) -> Table<CityDemography> {
    let (unique, dropped) = dedup_by_key(raw, |r| (r.city.clone(), r.state.clone()));
    if dropped > 0 {
        debug!(dropped, "dropped duplicate (city, state) demography rows");
        metrics::builder::rows_deduplicated(DIM_CITY_DEMOGRAPHY, dropped);
    }

    let rows: Vec<CityDemography> = unique
        .into_iter()
        .map(|r| CityDemography {
            city: r.city.map(|c| c.to_uppercase()),
            median_age: r.median_age,
            male_population: r.male_population,
            female_population: r.female_population,
            total_population: r.total_population,
            number_of_veterans: r.number_of_veterans,
            foreign_born: r.foreign_born,
            average_household_size: r.average_household_size,
            state_id: r.state_id,
            race: r.race,
        })
        .collect();
    finish(DIM_CITY_DEMOGRAPHY, rows)
}

fn finish<R: TableRow>(name: &'static str, rows: Vec<R>) -> Table<R> {
    info!(table = name, rows = rows.len(), "built dimension");
    metrics::builder::rows_built(name, rows.len());
    Table::new(name, rows)
}

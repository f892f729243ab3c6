//! Parser for the SAS label-description file.
//!
//! The file holds one section per coded attribute:
//!
//! ```text
//! /* I94MODE - There are missing values as well as not reported (9) */
//! value i94model
//!     1 = 'Air'
//!     2 = 'Sea'
//! ;
//! ```
//!
//! A section runs from the first occurrence of its marker up to the next
//! `;`. Every line in it that splits on `=` into exactly two parts is an
//! `id = name` pair.

use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::constants::*;
use crate::error::{LabelParseError, Result};
use crate::observability::metrics;
use crate::types::LabelRecord;

/// The label sections the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LabelDomain {
    TravelMode,
    Country,
    VisaCategory,
    UsState,
    AirportCode,
}

impl LabelDomain {
    pub const ALL: [LabelDomain; 5] = [
        LabelDomain::TravelMode,
        LabelDomain::Country,
        LabelDomain::VisaCategory,
        LabelDomain::UsState,
        LabelDomain::AirportCode,
    ];

    pub fn marker(&self) -> &'static str {
        match self {
            LabelDomain::TravelMode => TRAVEL_MODE_MARKER,
            LabelDomain::Country => COUNTRY_MARKER,
            LabelDomain::VisaCategory => VISA_CATEGORY_MARKER,
            LabelDomain::UsState => US_STATE_MARKER,
            LabelDomain::AirportCode => AIRPORT_CODE_MARKER,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LabelDomain::TravelMode => "travel-mode",
            LabelDomain::Country => "country",
            LabelDomain::VisaCategory => "visa-category",
            LabelDomain::UsState => "us-state",
            LabelDomain::AirportCode => "airport-code",
        }
    }
}

impl fmt::Display for LabelDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LabelDomain {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LabelDomain::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = LabelDomain::ALL.iter().map(|d| d.as_str()).collect();
                format!("unknown label domain '{}', expected one of: {}", s, known.join(", "))
            })
    }
}

/// The full text of a label-description file.
#[derive(Debug, Clone)]
pub struct LabelCatalog {
    text: String,
}

impl LabelCatalog {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Parses the section of `domain`, in file order.
    pub fn records(&self, domain: LabelDomain) -> Result<Vec<LabelRecord>> {
        let records = parse_label_section(&self.text, domain.marker())?;
        if records.is_empty() {
            warn!(domain = %domain, marker = domain.marker(), "label section has no entries");
        }
        debug!(domain = %domain, count = records.len(), "parsed label section");
        metrics::parser::records_parsed(domain.marker(), records.len());
        Ok(records)
    }
}

/// Extracts the `id = name` pairs of the section starting at `marker`.
///
/// No deduplication happens here; duplicate ids surface in the quality gate.
pub fn parse_label_section(
    text: &str,
    marker: &str,
) -> std::result::Result<Vec<LabelRecord>, LabelParseError> {
    let start = text
        .find(marker)
        .ok_or_else(|| LabelParseError::MarkerNotFound { marker: marker.to_string() })?;
    let section = &text[start..];
    let end = section
        .find(';')
        .ok_or_else(|| LabelParseError::UnterminatedSection { marker: marker.to_string() })?;

    Ok(section[..end].split('\n').filter_map(parse_label_line).collect())
}

fn parse_label_line(line: &str) -> Option<LabelRecord> {
    let mut parts = line.split('=');
    let (id, name) = (parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    Some(LabelRecord::new(clean_label_part(id), clean_label_part(name)))
}

fn clean_label_part(part: &str) -> &str {
    part.trim().trim_matches('\'')
}

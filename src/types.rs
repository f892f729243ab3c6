use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::constants::*;

/// One `id = name` pair from a label-description section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub id: String,
    pub name: String,
}

impl LabelRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A numeric source value. Integral source columns stay exact; everything
/// else keeps the source's double encoding until the fact builder coerces it.
#[derive(Debug, Clone, Copy)]
pub enum RawNumber {
    Int(i64),
    Float(f64),
}

// 2^63, the smallest double above i64::MAX.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

impl RawNumber {
    /// The value as an exact integer, if it is one.
    pub fn as_i64(self) -> Option<i64> {
        match self {
            RawNumber::Int(i) => Some(i),
            RawNumber::Float(v)
                if v.is_finite() && v.fract() == 0.0 && (-I64_LIMIT..I64_LIMIT).contains(&v) =>
            {
                Some(v as i64)
            }
            RawNumber::Float(_) => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            RawNumber::Int(i) => i as f64,
            RawNumber::Float(v) => v,
        }
    }

    // Integral values compare as integers whatever their encoding; other
    // doubles compare by value with every NaN equal.
    fn identity(self) -> NumberIdentity {
        match (self, self.as_i64()) {
            (_, Some(i)) => NumberIdentity::Int(i),
            (RawNumber::Float(v), None) if v.is_nan() => NumberIdentity::Float(f64::NAN.to_bits()),
            (other, None) => NumberIdentity::Float(other.as_f64().to_bits()),
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
enum NumberIdentity {
    Int(i64),
    Float(u64),
}

impl PartialEq for RawNumber {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for RawNumber {}

impl Hash for RawNumber {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl From<f64> for RawNumber {
    fn from(v: f64) -> Self {
        RawNumber::Float(v)
    }
}

impl From<i64> for RawNumber {
    fn from(v: i64) -> Self {
        RawNumber::Int(v)
    }
}

impl fmt::Display for RawNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawNumber::Int(i) => write!(f, "{}", i),
            RawNumber::Float(v) => write!(f, "{}", v),
        }
    }
}

/// An immigration row as read from the source parquet, restricted to the
/// selected columns. Equality is over all 18 attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RawImmigrationRecord {
    pub cicid: Option<RawNumber>,
    pub i94yr: Option<RawNumber>,
    pub i94mon: Option<RawNumber>,
    pub i94port: Option<String>,
    pub i94addr: Option<String>,
    pub arrdate: Option<RawNumber>,
    pub depdate: Option<RawNumber>,
    pub i94mode: Option<RawNumber>,
    pub i94visa: Option<RawNumber>,
    pub visatype: Option<String>,
    pub i94cit: Option<RawNumber>,
    pub i94res: Option<RawNumber>,
    pub biryear: Option<RawNumber>,
    pub gender: Option<String>,
    pub insnum: Option<String>,
    pub airline: Option<String>,
    pub admnum: Option<RawNumber>,
    pub fltno: Option<String>,
}

/// A demography CSV row read against the documented schema
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawDemographyRecord {
    pub city: Option<String>,
    pub state: Option<String>,
    pub median_age: Option<f64>,
    pub male_population: Option<i32>,
    pub female_population: Option<i32>,
    pub total_population: Option<i32>,
    pub number_of_veterans: Option<i32>,
    pub foreign_born: Option<i32>,
    pub average_household_size: Option<f64>,
    pub state_id: Option<String>,
    pub race: Option<String>,
}

/// A row type of one output table.
///
/// `KEY_COLUMNS` names the columns whose combined value must be unique
/// and `key` extracts that value.
pub trait TableRow: Clone + fmt::Debug {
    type Key: Eq + Hash;

    const COLUMNS: &'static [&'static str];
    const KEY_COLUMNS: &'static [&'static str];

    fn key(&self) -> Self::Key;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TravelMode {
    pub travel_mode_id: i32,
    pub travel_mode_name: String,
}

impl TableRow for TravelMode {
    type Key = i32;
    const COLUMNS: &'static [&'static str] = &["travel_mode_id", "travel_mode_name"];
    const KEY_COLUMNS: &'static [&'static str] = &["travel_mode_id"];

    fn key(&self) -> i32 {
        self.travel_mode_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Country {
    pub country_id: i32,
    pub country_name: String,
}

impl TableRow for Country {
    type Key = i32;
    const COLUMNS: &'static [&'static str] = &["country_id", "country_name"];
    const KEY_COLUMNS: &'static [&'static str] = &["country_id"];

    fn key(&self) -> i32 {
        self.country_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VisaCategory {
    pub visa_category_id: i32,
    pub visa_category_name: String,
}

impl TableRow for VisaCategory {
    type Key = i32;
    const COLUMNS: &'static [&'static str] = &["visa_category_id", "visa_category_name"];
    const KEY_COLUMNS: &'static [&'static str] = &["visa_category_id"];

    fn key(&self) -> i32 {
        self.visa_category_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UsState {
    pub us_state_id: String,
    pub us_state_name: String,
}

impl TableRow for UsState {
    type Key = String;
    const COLUMNS: &'static [&'static str] = &["us_state_id", "us_state_name"];
    const KEY_COLUMNS: &'static [&'static str] = &["us_state_id"];

    fn key(&self) -> String {
        self.us_state_id.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AirportCode {
    pub airport_code: String,
    pub city: String,
    pub us_state_id: Option<String>,
}

impl TableRow for AirportCode {
    type Key = String;
    const COLUMNS: &'static [&'static str] = &["airport_code", "city", "us_state_id"];
    const KEY_COLUMNS: &'static [&'static str] = &["airport_code"];

    fn key(&self) -> String {
        self.airport_code.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CityDemography {
    pub city: Option<String>,
    pub median_age: Option<f64>,
    pub male_population: Option<i32>,
    pub female_population: Option<i32>,
    pub total_population: Option<i32>,
    pub number_of_veterans: Option<i32>,
    pub foreign_born: Option<i32>,
    pub average_household_size: Option<f64>,
    pub state_id: Option<String>,
    pub race: Option<String>,
}

impl TableRow for CityDemography {
    type Key = (Option<String>, Option<String>);
    const COLUMNS: &'static [&'static str] = &[
        "city",
        "median_age",
        "male_population",
        "female_population",
        "total_population",
        "number_of_veterans",
        "foreign_born",
        "average_household_size",
        "state_id",
        "race",
    ];
    const KEY_COLUMNS: &'static [&'static str] = &["city", "state_id"];

    fn key(&self) -> Self::Key {
        (self.city.clone(), self.state_id.clone())
    }
}

/// One row of the immigration fact table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImmigrationFact {
    pub citizen_id: Option<i64>,
    pub year: Option<i32>,
    pub month: Option<i32>,
    pub airport_code: Option<String>,
    pub state_id: Option<String>,
    pub arrival_date: Option<NaiveDate>,
    pub departure_date: Option<NaiveDate>,
    pub travel_mode_id: Option<i32>,
    pub visa_category_id: Option<i32>,
    pub visa_type: Option<String>,
    pub citizen_country_id: Option<i32>,
    pub residence_country_id: Option<i32>,
    pub birth_year: Option<i32>,
    pub gender: Option<String>,
    pub ins_num: Option<String>,
    pub airline: Option<String>,
    pub admin_num: Option<i64>,
    pub flight_number: Option<String>,
}

impl TableRow for ImmigrationFact {
    // Facts have no business key; identity is the whole row.
    type Key = ImmigrationFact;
    const COLUMNS: &'static [&'static str] = &[
        "citizen_id",
        "year",
        "month",
        "airport_code",
        "state_id",
        "arrival_date",
        "departure_date",
        "travel_mode_id",
        "visa_category_id",
        "visa_type",
        "citizen_country_id",
        "residence_country_id",
        "birth_year",
        "gender",
        "ins_num",
        "airline",
        "admin_num",
        "flight_number",
    ];
    const KEY_COLUMNS: &'static [&'static str] = Self::COLUMNS;

    fn key(&self) -> Self {
        self.clone()
    }
}

/// An immutable, named table of rows.
#[derive(Debug, Clone)]
pub struct Table<R> {
    name: &'static str,
    rows: Vec<R>,
}

impl<R: TableRow> Table<R> {
    pub fn new(name: &'static str, rows: Vec<R>) -> Self {
        Self { name, rows }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &'static [&'static str] {
        R::COLUMNS
    }
}

/// The aggregate view of a table the quality gate needs.
pub trait TableStats {
    fn table_name(&self) -> &str;
    fn row_count(&self) -> usize;
    fn key_columns(&self) -> &'static [&'static str];
    fn distinct_key_count(&self) -> usize;
}

impl<R: TableRow> TableStats for Table<R> {
    fn table_name(&self) -> &str {
        self.name
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn key_columns(&self) -> &'static [&'static str] {
        R::KEY_COLUMNS
    }

    fn distinct_key_count(&self) -> usize {
        self.rows.iter().map(TableRow::key).collect::<HashSet<_>>().len()
    }
}

/// All seven output tables of one run.
#[derive(Debug, Clone)]
pub struct StarSchema {
    pub immigration_facts: Table<ImmigrationFact>,
    pub city_demography: Table<CityDemography>,
    pub travel_modes: Table<TravelMode>,
    pub countries: Table<Country>,
    pub visa_categories: Table<VisaCategory>,
    pub us_states: Table<UsState>,
    pub airport_codes: Table<AirportCode>,
}

impl StarSchema {
    /// The five tables derived from the label-description file.
    pub fn label_dimensions(&self) -> [&dyn TableStats; 5] {
        [
            &self.travel_modes,
            &self.countries,
            &self.visa_categories,
            &self.us_states,
            &self.airport_codes,
        ]
    }

    /// Every table, fact first.
    pub fn all_tables(&self) -> [&dyn TableStats; 7] {
        [
            &self.immigration_facts,
            &self.city_demography,
            &self.travel_modes,
            &self.countries,
            &self.visa_categories,
            &self.us_states,
            &self.airport_codes,
        ]
    }

    pub fn row_counts(&self) -> Vec<(String, usize)> {
        self.all_tables()
            .iter()
            .map(|t| (t.table_name().to_string(), t.row_count()))
            .collect()
    }
}

/// Table names in publish order.
pub const OUTPUT_TABLES: [&str; 7] = [
    IMMIGRATION_FACTS,
    DIM_CITY_DEMOGRAPHY,
    DIM_TRAVEL_MODE,
    DIM_COUNTRY,
    DIM_VISA_CATEGORY,
    DIM_US_STATES,
    DIM_AIRPORT_CODES,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_records_compare_numbers_by_value() {
        let a = RawImmigrationRecord {
            cicid: Some(RawNumber::Int(1)),
            arrdate: Some(0.0.into()),
            gender: Some("M".into()),
            ..Default::default()
        };
        let b = RawImmigrationRecord {
            cicid: Some(1.0.into()),
            arrdate: Some((-0.0).into()),
            gender: Some("M".into()),
            ..Default::default()
        };
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a.clone());
        assert!(!set.insert(b));

        let c = RawImmigrationRecord {
            gender: Some("F".into()),
            ..a
        };
        assert!(set.insert(c));
    }

    #[test]
    fn large_integers_stay_distinct() {
        let a = RawNumber::Int(9_007_199_254_740_993);
        let b = RawNumber::Int(9_007_199_254_740_992);
        assert_ne!(a, b);
        assert_eq!(b, RawNumber::Float(9_007_199_254_740_992.0));
        assert_eq!(a.as_i64(), Some(9_007_199_254_740_993));
        assert_eq!(RawNumber::Float(1.5).as_i64(), None);
        assert_eq!(RawNumber::Float(f64::NAN), RawNumber::Float(f64::NAN));
    }

    #[test]
    fn distinct_key_count_uses_declared_key() {
        let table = Table::new(
            DIM_US_STATES,
            vec![
                UsState { us_state_id: "AL".into(), us_state_name: "ALABAMA".into() },
                UsState { us_state_id: "AL".into(), us_state_name: "ALABAMA (dup)".into() },
                UsState { us_state_id: "AK".into(), us_state_name: "ALASKA".into() },
            ],
        );
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.distinct_key_count(), 2);
        assert_eq!(table.key_columns(), &["us_state_id"]);
    }

    #[test]
    fn fact_columns_match_mapping_targets() {
        let targets: Vec<&str> = IMMIGRATION_COLUMN_MAPPING.iter().map(|(_, t)| *t).collect();
        assert_eq!(targets, ImmigrationFact::COLUMNS);
    }
}

/// Output table names. These double as the destination directory stems.
pub const IMMIGRATION_FACTS: &str = "immigration_facts";
pub const DIM_CITY_DEMOGRAPHY: &str = "dim_city_demography";
pub const DIM_TRAVEL_MODE: &str = "dim_travel_mode";
pub const DIM_COUNTRY: &str = "dim_country";
pub const DIM_VISA_CATEGORY: &str = "dim_visa_category";
pub const DIM_US_STATES: &str = "dim_us_states";
pub const DIM_AIRPORT_CODES: &str = "dim_airport_codes";

/// Section markers inside the SAS label-description file
pub const TRAVEL_MODE_MARKER: &str = "i94model";
pub const COUNTRY_MARKER: &str = "i94cntyl";
pub const VISA_CATEGORY_MARKER: &str = "I94VISA";
pub const US_STATE_MARKER: &str = "i94addrl";
pub const AIRPORT_CODE_MARKER: &str = "$i94prtl";

/// State code used by the label file for "unknown"
pub const UNKNOWN_STATE_ID: &str = "99";

/// Replacement for placeholder country names
pub const COUNTRY_PLACEHOLDER: &str = "NA";

/// Fact partition columns, outermost first
pub const FACT_PARTITION_COLUMNS: [&str; 3] = ["year", "month", "airport_code"];

/// Raw immigration column → business column.
pub const IMMIGRATION_COLUMN_MAPPING: [(&str, &str); 18] = [
    ("cicid", "citizen_id"),
    ("i94yr", "year"),
    ("i94mon", "month"),
    ("i94port", "airport_code"),
    ("i94addr", "state_id"),
    ("arrdate", "arrival_date"),
    ("depdate", "departure_date"),
    ("i94mode", "travel_mode_id"),
    ("i94visa", "visa_category_id"),
    ("visatype", "visa_type"),
    ("i94cit", "citizen_country_id"),
    ("i94res", "residence_country_id"),
    ("biryear", "birth_year"),
    ("gender", "gender"),
    ("insnum", "ins_num"),
    ("airline", "airline"),
    ("admnum", "admin_num"),
    ("fltno", "flight_number"),
];

/// Demography CSV field separator
pub const DEMOGRAPHY_DELIMITER: u8 = b';';

/// Columns of the demography CSV, read by position.
pub const DEMOGRAPHY_SOURCE_COLUMNS: [&str; 11] = [
    "city",
    "state",
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

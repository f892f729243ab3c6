use csv::{ReaderBuilder, StringRecord};
use std::io;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use crate::constants::{DEMOGRAPHY_DELIMITER, DEMOGRAPHY_SOURCE_COLUMNS, DIM_CITY_DEMOGRAPHY};
use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::types::RawDemographyRecord;

/// Reads the `;`-separated demography file.
pub fn read_demography(path: &Path) -> Result<Vec<RawDemographyRecord>> {
    let file = std::fs::File::open(path)?;
    let records = parse_demography(file)?;
    info!(path = %path.display(), rows = records.len(), "read demography");
    Ok(records)
}

/// Parses demography CSV content.
///
/// Fields are taken by position against the 11-column schema; trailing
/// extra columns are ignored and empty cells are null.
pub fn parse_demography<R: io::Read>(input: R) -> Result<Vec<RawDemographyRecord>> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(DEMOGRAPHY_DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let width = rdr.headers()?.len();
    if width < DEMOGRAPHY_SOURCE_COLUMNS.len() {
        return Err(EtlError::Schema(format!(
            "demography header has {} columns, expected at least {}",
            width,
            DEMOGRAPHY_SOURCE_COLUMNS.len()
        )));
    }

    let mut out = Vec::new();
    for result in rdr.records() {
        out.push(parse_record(&result?)?);
    }
    metrics::ingestion::rows_read("demography", out.len());
    Ok(out)
}

fn parse_record(r: &StringRecord) -> Result<RawDemographyRecord> {
    Ok(RawDemographyRecord {
        city: text(r, 0),
        state: text(r, 1),
        median_age: number(r, 2)?,
        male_population: number(r, 3)?,
        female_population: number(r, 4)?,
        total_population: number(r, 5)?,
        number_of_veterans: number(r, 6)?,
        foreign_born: number(r, 7)?,
        average_household_size: number(r, 8)?,
        state_id: text(r, 9),
        race: text(r, 10),
    })
}

fn text(r: &StringRecord, i: usize) -> Option<String> {
    r.get(i).filter(|s| !s.is_empty()).map(str::to_string)
}

fn number<T: FromStr>(r: &StringRecord, i: usize) -> Result<Option<T>> {
    match r.get(i).map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|_| EtlError::coercion(DIM_CITY_DEMOGRAPHY, DEMOGRAPHY_SOURCE_COLUMNS[i], s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "City;State;Median Age;Male Population;Female Population;Total Population;Number of Veterans;Foreign-born;Average Household Size;State Code;Race;Count\n";

    #[test]
    fn reads_rows_by_position() {
        let input = format!(
            "{HEADER}Silver Spring;Maryland;33.8;40601;41862;82463;1562;30908;2.6;MD;Hispanic or Latino;25924\n\
             Quincy;Massachusetts;41.0;44129;49500;93629;;32935;2.39;MA;White;58723\n"
        );
        let rows = parse_demography(input.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].city.as_deref(), Some("Silver Spring"));
        assert_eq!(rows[0].state.as_deref(), Some("Maryland"));
        assert_eq!(rows[0].median_age, Some(33.8));
        assert_eq!(rows[0].foreign_born, Some(30908));
        assert_eq!(rows[0].state_id.as_deref(), Some("MD"));
        assert_eq!(rows[1].number_of_veterans, None);
        assert_eq!(rows[1].race.as_deref(), Some("White"));
    }

    #[test]
    fn non_numeric_cell_is_fatal() {
        let input = format!("{HEADER}Quincy;Massachusetts;old;1;1;2;0;0;2.0;MA;White;1\n");
        match parse_demography(input.as_bytes()).unwrap_err() {
            EtlError::TypeCoercion { column, value, .. } => {
                assert_eq!(column, "median_age");
                assert_eq!(value, "old");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn narrow_header_is_rejected() {
        let input = "City;State\nMiami;Florida\n";
        assert!(matches!(parse_demography(input.as_bytes()), Err(EtlError::Schema(_))));
    }
}

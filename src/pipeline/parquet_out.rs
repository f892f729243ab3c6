//! Arrow schemas and record-batch conversion for the output tables.
//!
//! Each row type declares its schema here; field names come from
//! `TableRow::COLUMNS` so the written files always carry the business names.

use arrow::array::{
    Array, ArrayRef, Date32Builder, Float64Builder, Int32Builder, Int64Builder, StringBuilder,
    UInt32Array,
};
use arrow::compute::take;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{EtlError, Result};
use crate::types::*;

/// A row type that can be laid out as an Arrow record batch.
pub trait ArrowTable: TableRow {
    /// Column types, in `COLUMNS` order, with nullability.
    fn field_types() -> Vec<(DataType, bool)>;

    fn columns(rows: &[Self]) -> Vec<ArrayRef>;

    fn schema() -> SchemaRef {
        let fields: Vec<Field> = Self::COLUMNS
            .iter()
            .zip(Self::field_types())
            .map(|(name, (data_type, nullable))| Field::new(*name, data_type, nullable))
            .collect();
        Arc::new(Schema::new(fields))
    }
}

/// Converts a table into one record batch.
pub fn to_record_batch<R: ArrowTable>(table: &Table<R>) -> Result<RecordBatch> {
    let types = R::field_types().len();
    if types != R::COLUMNS.len() {
        return Err(EtlError::Schema(format!(
            "{} declares {} columns but {} field types",
            table.name(),
            R::COLUMNS.len(),
            types
        )));
    }
    Ok(RecordBatch::try_new(R::schema(), R::columns(table.rows()))?)
}

/// Directory value used for a null partition column.
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

/// `(column, value)` pairs identifying one partition, outermost first.
pub type PartitionSpec = Vec<(String, String)>;

/// Splits `batch` on the values of `partition_by`.
///
/// Partitions come back sorted by their values, each holding the rows of
/// that partition in their original order with the partition columns
/// removed.
pub fn partition_batch(
    batch: &RecordBatch,
    partition_by: &[&str],
) -> Result<Vec<(PartitionSpec, RecordBatch)>> {
    let schema = batch.schema();
    let part_indices = partition_by
        .iter()
        .map(|name| {
            schema.index_of(name).map_err(|_| {
                EtlError::Schema(format!("partition column '{}' is not in the batch", name))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut groups: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let mut values = Vec::with_capacity(part_indices.len());
        for &i in &part_indices {
            let column = batch.column(i);
            if column.is_null(row) {
                values.push(HIVE_DEFAULT_PARTITION.to_string());
            } else {
                values.push(array_value_to_string(column, row)?);
            }
        }
        groups.entry(values).or_default().push(row as u32);
    }

    let keep: Vec<usize> = (0..schema.fields().len())
        .filter(|i| !part_indices.contains(i))
        .collect();
    let data_schema = Arc::new(schema.project(&keep)?);

    let mut partitions = Vec::with_capacity(groups.len());
    for (values, rows) in groups {
        let indices = UInt32Array::from(rows);
        let columns = keep
            .iter()
            .map(|&i| take(batch.column(i).as_ref(), &indices, None))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let spec = partition_by.iter().map(|n| n.to_string()).zip(values).collect();
        partitions.push((spec, RecordBatch::try_new(data_schema.clone(), columns)?));
    }
    Ok(partitions)
}

/// Percent-encodes characters that cannot appear in a partition directory.
pub fn escape_partition_value(value: &str) -> String {
    const SPECIAL: &[char] = &[
        '"', '#', '%', '\'', '*', '/', ':', '=', '?', '\\', '{', '[', ']', '^',
    ];
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_control() || SPECIAL.contains(&c) {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{:02X}", b));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn utf8<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    let mut b = StringBuilder::new();
    for v in values {
        b.append_option(v);
    }
    Arc::new(b.finish())
}

fn int32(values: impl Iterator<Item = Option<i32>>) -> ArrayRef {
    let mut b = Int32Builder::new();
    for v in values {
        b.append_option(v);
    }
    Arc::new(b.finish())
}

fn int64(values: impl Iterator<Item = Option<i64>>) -> ArrayRef {
    let mut b = Int64Builder::new();
    for v in values {
        b.append_option(v);
    }
    Arc::new(b.finish())
}

fn float64(values: impl Iterator<Item = Option<f64>>) -> ArrayRef {
    let mut b = Float64Builder::new();
    for v in values {
        b.append_option(v);
    }
    Arc::new(b.finish())
}

fn date32(values: impl Iterator<Item = Option<NaiveDate>>) -> ArrayRef {
    let mut b = Date32Builder::new();
    for v in values {
        b.append_option(v.map(days_since_unix_epoch));
    }
    Arc::new(b.finish())
}

/// Arrow's Date32 counts days from 1970-01-01.
pub fn days_since_unix_epoch(date: NaiveDate) -> i32 {
    (date - NaiveDate::default()).num_days() as i32
}

impl ArrowTable for TravelMode {
    fn field_types() -> Vec<(DataType, bool)> {
        vec![(DataType::Int32, false), (DataType::Utf8, false)]
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int32(rows.iter().map(|r| Some(r.travel_mode_id))),
            utf8(rows.iter().map(|r| Some(r.travel_mode_name.as_str()))),
        ]
    }
}

impl ArrowTable for Country {
    fn field_types() -> Vec<(DataType, bool)> {
        vec![(DataType::Int32, false), (DataType::Utf8, false)]
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int32(rows.iter().map(|r| Some(r.country_id))),
            utf8(rows.iter().map(|r| Some(r.country_name.as_str()))),
        ]
    }
}

impl ArrowTable for VisaCategory {
    fn field_types() -> Vec<(DataType, bool)> {
        vec![(DataType::Int32, false), (DataType::Utf8, false)]
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int32(rows.iter().map(|r| Some(r.visa_category_id))),
            utf8(rows.iter().map(|r| Some(r.visa_category_name.as_str()))),
        ]
    }
}

impl ArrowTable for UsState {
    fn field_types() -> Vec<(DataType, bool)> {
        vec![(DataType::Utf8, false), (DataType::Utf8, false)]
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            utf8(rows.iter().map(|r| Some(r.us_state_id.as_str()))),
            utf8(rows.iter().map(|r| Some(r.us_state_name.as_str()))),
        ]
    }
}

impl ArrowTable for AirportCode {
    fn field_types() -> Vec<(DataType, bool)> {
        vec![
            (DataType::Utf8, false),
            (DataType::Utf8, false),
            (DataType::Utf8, true),
        ]
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            utf8(rows.iter().map(|r| Some(r.airport_code.as_str()))),
            utf8(rows.iter().map(|r| Some(r.city.as_str()))),
            utf8(rows.iter().map(|r| r.us_state_id.as_deref())),
        ]
    }
}

impl ArrowTable for CityDemography {
    fn field_types() -> Vec<(DataType, bool)> {
        vec![
            (DataType::Utf8, true),
            (DataType::Float64, true),
            (DataType::Int32, true),
            (DataType::Int32, true),
            (DataType::Int32, true),
            (DataType::Int32, true),
            (DataType::Int32, true),
            (DataType::Float64, true),
            (DataType::Utf8, true),
            (DataType::Utf8, true),
        ]
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            utf8(rows.iter().map(|r| r.city.as_deref())),
            float64(rows.iter().map(|r| r.median_age)),
            int32(rows.iter().map(|r| r.male_population)),
            int32(rows.iter().map(|r| r.female_population)),
            int32(rows.iter().map(|r| r.total_population)),
            int32(rows.iter().map(|r| r.number_of_veterans)),
            int32(rows.iter().map(|r| r.foreign_born)),
            float64(rows.iter().map(|r| r.average_household_size)),
            utf8(rows.iter().map(|r| r.state_id.as_deref())),
            utf8(rows.iter().map(|r| r.race.as_deref())),
        ]
    }
}

impl ArrowTable for ImmigrationFact {
    fn field_types() -> Vec<(DataType, bool)> {
        vec![
            (DataType::Int64, true),
            (DataType::Int32, true),
            (DataType::Int32, true),
            (DataType::Utf8, true),
            (DataType::Utf8, true),
            (DataType::Date32, true),
            (DataType::Date32, true),
            (DataType::Int32, true),
            (DataType::Int32, true),
            (DataType::Utf8, true),
            (DataType::Int32, true),
            (DataType::Int32, true),
            (DataType::Int32, true),
            (DataType::Utf8, true),
            (DataType::Utf8, true),
            (DataType::Utf8, true),
            (DataType::Int64, true),
            (DataType::Utf8, true),
        ]
    }

    fn columns(rows: &[Self]) -> Vec<ArrayRef> {
        vec![
            int64(rows.iter().map(|r| r.citizen_id)),
            int32(rows.iter().map(|r| r.year)),
            int32(rows.iter().map(|r| r.month)),
            utf8(rows.iter().map(|r| r.airport_code.as_deref())),
            utf8(rows.iter().map(|r| r.state_id.as_deref())),
            date32(rows.iter().map(|r| r.arrival_date)),
            date32(rows.iter().map(|r| r.departure_date)),
            int32(rows.iter().map(|r| r.travel_mode_id)),
            int32(rows.iter().map(|r| r.visa_category_id)),
            utf8(rows.iter().map(|r| r.visa_type.as_deref())),
            int32(rows.iter().map(|r| r.citizen_country_id)),
            int32(rows.iter().map(|r| r.residence_country_id)),
            int32(rows.iter().map(|r| r.birth_year)),
            utf8(rows.iter().map(|r| r.gender.as_deref())),
            utf8(rows.iter().map(|r| r.ins_num.as_deref())),
            utf8(rows.iter().map(|r| r.airline.as_deref())),
            int64(rows.iter().map(|r| r.admin_num)),
            utf8(rows.iter().map(|r| r.flight_number.as_deref())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use arrow::array::AsArray;
    use arrow::datatypes::Date32Type;

    #[test]
    fn fact_schema_uses_business_names() {
        let schema = ImmigrationFact::schema();
        assert_eq!(schema.fields().len(), 18);
        assert_eq!(schema.field(0).name(), "citizen_id");
        assert_eq!(schema.field(5).name(), "arrival_date");
        assert_eq!(schema.field(5).data_type(), &DataType::Date32);
        assert_eq!(schema.field(17).name(), "flight_number");
    }

    #[test]
    fn dates_encode_as_days_since_unix_epoch() {
        let rows = vec![ImmigrationFact {
            citizen_id: Some(1),
            year: Some(2016),
            month: Some(4),
            airport_code: Some("NYC".into()),
            state_id: None,
            arrival_date: NaiveDate::from_ymd_opt(1960, 1, 1),
            departure_date: None,
            travel_mode_id: None,
            visa_category_id: None,
            visa_type: None,
            citizen_country_id: None,
            residence_country_id: None,
            birth_year: None,
            gender: None,
            ins_num: None,
            airline: None,
            admin_num: None,
            flight_number: None,
        }];
        let batch = to_record_batch(&Table::new(IMMIGRATION_FACTS, rows)).unwrap();
        let arrival = batch.column(5).as_primitive::<Date32Type>();
        assert_eq!(arrival.value(0), -3653);
        assert!(batch.column(6).is_null(0));
    }

    #[test]
    fn demography_batch_has_no_state_column() {
        let schema = CityDemography::schema();
        assert!(schema.index_of("state").is_err());
        assert!(schema.index_of("state_id").is_ok());
    }

    #[test]
    fn partitions_split_rows_and_drop_partition_columns() {
        let fact = |month: i32, port: Option<&str>, id: i64| ImmigrationFact {
            citizen_id: Some(id),
            year: Some(2016),
            month: Some(month),
            airport_code: port.map(String::from),
            state_id: None,
            arrival_date: None,
            departure_date: None,
            travel_mode_id: None,
            visa_category_id: None,
            visa_type: None,
            citizen_country_id: None,
            residence_country_id: None,
            birth_year: None,
            gender: None,
            ins_num: None,
            airline: None,
            admin_num: None,
            flight_number: None,
        };
        let table = Table::new(
            IMMIGRATION_FACTS,
            vec![fact(4, Some("NYC"), 1), fact(4, None, 2), fact(4, Some("NYC"), 3), fact(5, Some("LOS"), 4)],
        );
        let batch = to_record_batch(&table).unwrap();
        let parts = partition_batch(&batch, &FACT_PARTITION_COLUMNS).unwrap();

        assert_eq!(parts.len(), 3);
        let (spec, nyc) = &parts[0];
        assert_eq!(
            spec,
            &vec![
                ("year".to_string(), "2016".to_string()),
                ("month".to_string(), "4".to_string()),
                ("airport_code".to_string(), "NYC".to_string()),
            ]
        );
        assert_eq!(nyc.num_rows(), 2);
        assert_eq!(nyc.num_columns(), 15);
        assert!(nyc.schema().index_of("airport_code").is_err());
        assert_eq!(parts[1].0[2].1, HIVE_DEFAULT_PARTITION);
        assert_eq!(parts[1].1.num_rows(), 1);
    }

    #[test]
    fn unknown_partition_column_is_a_schema_error() {
        let table = Table::new(
            DIM_US_STATES,
            vec![UsState { us_state_id: "AL".into(), us_state_name: "ALABAMA".into() }],
        );
        let batch = to_record_batch(&table).unwrap();
        assert!(matches!(partition_batch(&batch, &["year"]), Err(EtlError::Schema(_))));
    }

    #[test]
    fn partition_values_are_escaped() {
        assert_eq!(escape_partition_value("NYC"), "NYC");
        assert_eq!(escape_partition_value("A/B=C"), "A%2FB%3DC");
    }

    #[test]
    fn airport_state_is_nullable() {
        let table = Table::new(
            DIM_AIRPORT_CODES,
            vec![AirportCode { airport_code: "XXX".into(), city: "UNKNOWN".into(), us_state_id: None }],
        );
        let batch = to_record_batch(&table).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert!(batch.column(2).is_null(0));
    }
}

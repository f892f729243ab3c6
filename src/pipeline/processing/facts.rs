//! Immigration fact table builder

use tracing::{debug, info, instrument};

use super::{coerce_i32, coerce_i64, dedup_rows, sas_offset_to_date};
use crate::constants::{IMMIGRATION_COLUMN_MAPPING, IMMIGRATION_FACTS};
use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::types::{ImmigrationFact, RawImmigrationRecord, Table, TableRow};

/// Source column → business column pairs, checked against the target
/// schema when constructed.
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pairs: Vec<(&'static str, &'static str)>,
}

impl ColumnMapping {
    pub fn new(
        pairs: &[(&'static str, &'static str)],
        expected_targets: &[&'static str],
    ) -> Result<Self> {
        if pairs.len() != expected_targets.len() {
            return Err(EtlError::Schema(format!(
                "column mapping has {} pairs but the target schema has {} columns",
                pairs.len(),
                expected_targets.len()
            )));
        }
        for ((source, target), expected) in pairs.iter().zip(expected_targets) {
            if target != expected {
                return Err(EtlError::Schema(format!(
                    "column mapping sends '{}' to '{}' where the target schema expects '{}'",
                    source, target, expected
                )));
            }
        }
        for (i, (source, _)) in pairs.iter().enumerate() {
            if pairs[..i].iter().any(|(s, _)| s == source) {
                return Err(EtlError::Schema(format!(
                    "source column '{}' is mapped twice",
                    source
                )));
            }
        }
        Ok(Self { pairs: pairs.to_vec() })
    }

    /// The raw immigration → fact mapping.
    pub fn immigration() -> Result<Self> {
        Self::new(&IMMIGRATION_COLUMN_MAPPING, ImmigrationFact::COLUMNS)
    }

    pub fn sources(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(s, _)| *s)
    }

    pub fn targets(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.pairs.iter().map(|(_, t)| *t)
    }

    pub fn target_of(&self, source: &str) -> Option<&'static str> {
        self.pairs.iter().find(|(s, _)| *s == source).map(|(_, t)| *t)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

pub struct FactBuilder {
    mapping: ColumnMapping,
}

impl FactBuilder {
    pub fn new(mapping: ColumnMapping) -> Self {
        Self { mapping }
    }

    /// Deduplicates raw rows, converts SAS offsets to dates and renames
    /// every attribute to its business column.
    #[instrument(skip_all, fields(raw_rows = raw.len()))]
    pub fn build(&self, raw: Vec<RawImmigrationRecord>) -> Result<Table<ImmigrationFact>> {
        let (unique, dropped) = dedup_rows(raw);
        if dropped > 0 {
            debug!(dropped, "dropped duplicate immigration rows");
            metrics::builder::rows_deduplicated(IMMIGRATION_FACTS, dropped);
        }

        let rows = unique
            .into_iter()
            .map(|r| self.to_fact(r))
            .collect::<Result<Vec<_>>>()?;

        info!(table = IMMIGRATION_FACTS, rows = rows.len(), "built fact table");
        metrics::builder::rows_built(IMMIGRATION_FACTS, rows.len());
        Ok(Table::new(IMMIGRATION_FACTS, rows))
    }

    fn to_fact(&self, r: RawImmigrationRecord) -> Result<ImmigrationFact> {
        let t = IMMIGRATION_FACTS;
        let col = |source: &'static str| self.mapping.target_of(source).unwrap_or(source);

        Ok(ImmigrationFact {
            citizen_id: coerce_i64(t, col("cicid"), r.cicid)?,
            year: coerce_i32(t, col("i94yr"), r.i94yr)?,
            month: coerce_i32(t, col("i94mon"), r.i94mon)?,
            airport_code: r.i94port,
            state_id: r.i94addr,
            arrival_date: sas_offset_to_date(t, col("arrdate"), r.arrdate)?,
            departure_date: sas_offset_to_date(t, col("depdate"), r.depdate)?,
            travel_mode_id: coerce_i32(t, col("i94mode"), r.i94mode)?,
            visa_category_id: coerce_i32(t, col("i94visa"), r.i94visa)?,
            visa_type: r.visatype,
            citizen_country_id: coerce_i32(t, col("i94cit"), r.i94cit)?,
            residence_country_id: coerce_i32(t, col("i94res"), r.i94res)?,
            birth_year: coerce_i32(t, col("biryear"), r.biryear)?,
            gender: r.gender,
            ins_num: r.insnum,
            airline: r.airline,
            admin_num: coerce_i64(t, col("admnum"), r.admnum)?,
            flight_number: r.fltno,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawNumber;
    use chrono::NaiveDate;

    fn num(v: f64) -> Option<RawNumber> {
        Some(RawNumber::Float(v))
    }

    fn raw(cicid: f64, arrdate: Option<f64>, depdate: Option<f64>) -> RawImmigrationRecord {
        RawImmigrationRecord {
            cicid: num(cicid),
            i94yr: num(2016.0),
            i94mon: num(4.0),
            i94port: Some("NYC".into()),
            i94addr: Some("NY".into()),
            arrdate: arrdate.map(RawNumber::from),
            depdate: depdate.map(RawNumber::from),
            i94mode: num(1.0),
            i94visa: num(2.0),
            visatype: Some("WT".into()),
            i94cit: num(101.0),
            i94res: num(101.0),
            biryear: num(1980.0),
            gender: Some("F".into()),
            insnum: None,
            airline: Some("AZ".into()),
            admnum: num(55425565433.0),
            fltno: Some("00602".into()),
        }
    }

    fn builder() -> FactBuilder {
        FactBuilder::new(ColumnMapping::immigration().unwrap())
    }

    #[test]
    fn converts_offsets_and_renames() {
        let table = builder().build(vec![raw(1.0, Some(0.0), None)]).unwrap();
        let fact = &table.rows()[0];
        assert_eq!(fact.arrival_date, NaiveDate::from_ymd_opt(1960, 1, 1));
        assert_eq!(fact.departure_date, None);
        assert_eq!(fact.citizen_id, Some(1));
        assert_eq!(fact.year, Some(2016));
        assert_eq!(fact.airport_code.as_deref(), Some("NYC"));
        assert_eq!(fact.admin_num, Some(55425565433));
        assert_eq!(table.name(), IMMIGRATION_FACTS);
    }

    #[test]
    fn duplicate_raw_rows_collapse() {
        let table = builder()
            .build(vec![
                raw(1.0, Some(20545.0), Some(20550.0)),
                raw(2.0, Some(20545.0), None),
                raw(1.0, Some(20545.0), Some(20550.0)),
            ])
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].departure_date, NaiveDate::from_ymd_opt(2016, 4, 6));
    }

    #[test]
    fn admission_numbers_beyond_double_precision_stay_distinct() {
        let mut a = raw(1.0, None, None);
        a.admnum = Some(RawNumber::Int(9_007_199_254_740_993));
        let mut b = raw(1.0, None, None);
        b.admnum = Some(RawNumber::Int(9_007_199_254_740_992));

        let table = builder().build(vec![a, b]).unwrap();
        let admin: Vec<_> = table.rows().iter().map(|f| f.admin_num).collect();
        assert_eq!(admin, vec![Some(9_007_199_254_740_993), Some(9_007_199_254_740_992)]);
    }

    #[test]
    fn fractional_id_is_fatal_and_names_business_column() {
        let mut bad = raw(1.0, None, None);
        bad.i94mode = num(1.5);
        match builder().build(vec![bad]).unwrap_err() {
            EtlError::TypeCoercion { column, .. } => assert_eq!(column, "travel_mode_id"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn mapping_rejects_misaligned_targets() {
        let pairs = [("a", "x"), ("b", "y")];
        assert!(ColumnMapping::new(&pairs, &["x"]).is_err());
        assert!(ColumnMapping::new(&pairs, &["y", "x"]).is_err());
        assert!(ColumnMapping::new(&[("a", "x"), ("a", "y")], &["x", "y"]).is_err());
        let mapping = ColumnMapping::new(&pairs, &["x", "y"]).unwrap();
        assert_eq!(mapping.target_of("b"), Some("y"));
        assert_eq!(mapping.sources().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn immigration_mapping_covers_fact_schema() {
        let mapping = ColumnMapping::immigration().unwrap();
        assert_eq!(mapping.len(), 18);
        assert_eq!(mapping.targets().collect::<Vec<_>>(), ImmigrationFact::COLUMNS);
    }
}

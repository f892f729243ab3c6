// Pipeline processing: label parsing, table building, and the quality gate

pub mod dimensions;
pub mod facts;
pub mod parser;
pub mod quality_gate;

use chrono::{Days, NaiveDate};
use std::collections::HashSet;
use std::hash::Hash;

use crate::error::{EtlError, Result};
use crate::types::RawNumber;

/// Keeps the first row of every key, preserving order.
///
/// Returns the surviving rows and the number of rows dropped.
pub fn dedup_by_key<T, K, F>(rows: Vec<T>, key: F) -> (Vec<T>, usize)
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let before = rows.len();
    let mut seen = HashSet::with_capacity(before);
    let kept: Vec<T> = rows.into_iter().filter(|row| seen.insert(key(row))).collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Keeps the first of every group of equal rows, preserving order.
///
/// Rows are hashed by reference, so no second copy is held while scanning.
pub fn dedup_rows<T: Eq + Hash>(rows: Vec<T>) -> (Vec<T>, usize) {
    let keep: Vec<bool> = {
        let mut seen = HashSet::with_capacity(rows.len());
        rows.iter().map(|row| seen.insert(row)).collect()
    };
    let before = rows.len();
    let kept: Vec<T> = rows
        .into_iter()
        .zip(keep)
        .filter_map(|(row, first)| first.then_some(row))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

/// Parses a label id into the integer key of its dimension.
pub fn parse_int_id(table: &str, column: &str, raw: &str) -> Result<i32> {
    raw.parse::<i32>().map_err(|_| EtlError::coercion(table, column, raw))
}

/// Narrows a raw number to `i32`, rejecting fractions and overflow.
pub fn coerce_i32(table: &str, column: &str, value: Option<RawNumber>) -> Result<Option<i32>> {
    value
        .map(|v| {
            v.as_i64()
                .and_then(|i| i32::try_from(i).ok())
                .ok_or_else(|| EtlError::coercion(table, column, v))
        })
        .transpose()
}

/// Narrows a raw number to `i64`, rejecting fractions and overflow.
pub fn coerce_i64(table: &str, column: &str, value: Option<RawNumber>) -> Result<Option<i64>> {
    value
        .map(|v| v.as_i64().ok_or_else(|| EtlError::coercion(table, column, v)))
        .transpose()
}

/// Day zero of SAS date offsets.
pub fn sas_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1960, 1, 1).expect("1960-01-01 is a valid date")
}

/// Converts a SAS day offset into a calendar date.
///
/// Fractional offsets count whole days elapsed, so they round down.
pub fn sas_offset_to_date(
    table: &str,
    column: &str,
    offset: Option<RawNumber>,
) -> Result<Option<NaiveDate>> {
    let Some(offset) = offset.map(RawNumber::as_f64) else {
        return Ok(None);
    };
    if !offset.is_finite() {
        return Err(EtlError::coercion(table, column, offset));
    }

    let out_of_range = || EtlError::DateOutOfRange {
        column: column.to_string(),
        offset,
    };
    let days = offset.floor();
    if days.abs() > u32::MAX as f64 {
        return Err(out_of_range());
    }
    let date = if days >= 0.0 {
        sas_epoch().checked_add_days(Days::new(days as u64))
    } else {
        sas_epoch().checked_sub_days(Days::new((-days) as u64))
    };
    date.map(Some).ok_or_else(out_of_range)
}

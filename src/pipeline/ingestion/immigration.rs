use arrow::array::{Array, AsArray, Float64Array, Int64Array, StringArray};
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ProjectionMask;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{EtlError, Result};
use crate::observability::metrics;
use crate::pipeline::processing::facts::ColumnMapping;
use crate::types::{RawImmigrationRecord, RawNumber};

const SOURCE: &str = "immigration";

/// Reads raw immigration rows from a parquet file, or from every
/// `*.parquet` file in a directory in name order.
///
/// Only the mapped source columns are projected. Integer columns are read
/// exactly as `i64`, other numeric columns as doubles. A missing column is
/// a schema error; a value that cannot be read as a number is a coercion
/// error.
pub fn read_immigration(path: &Path, mapping: &ColumnMapping) -> Result<Vec<RawImmigrationRecord>> {
    let files = parquet_files(path)?;
    let mut records = Vec::new();
    for file in &files {
        let before = records.len();
        read_file(file, mapping, &mut records)?;
        debug!(path = %file.display(), rows = records.len() - before, "read parquet file");
    }

    info!(path = %path.display(), files = files.len(), rows = records.len(), "read immigration data");
    metrics::ingestion::rows_read(SOURCE, records.len());
    Ok(records)
}

fn parquet_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(path)? {
        let p = entry?.path();
        if p.is_file() && p.extension().is_some_and(|ext| ext == "parquet") {
            files.push(p);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(EtlError::Schema(format!(
            "no parquet files found under {}",
            path.display()
        )));
    }
    Ok(files)
}

fn read_file(path: &Path, mapping: &ColumnMapping, out: &mut Vec<RawImmigrationRecord>) -> Result<()> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;
    let schema = builder.schema().clone();

    let indices = mapping
        .sources()
        .map(|column| {
            schema.index_of(column).map_err(|_| {
                EtlError::Schema(format!("{} has no column '{}'", path.display(), column))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
    for batch in builder.with_projection(mask).build()? {
        out.extend(records_from_batch(&batch?)?);
    }
    Ok(())
}

fn records_from_batch(batch: &RecordBatch) -> Result<Vec<RawImmigrationRecord>> {
    let cicid = numeric(batch, "cicid")?;
    let i94yr = numeric(batch, "i94yr")?;
    let i94mon = numeric(batch, "i94mon")?;
    let i94port = text(batch, "i94port")?;
    let i94addr = text(batch, "i94addr")?;
    let arrdate = numeric(batch, "arrdate")?;
    let depdate = numeric(batch, "depdate")?;
    let i94mode = numeric(batch, "i94mode")?;
    let i94visa = numeric(batch, "i94visa")?;
    let visatype = text(batch, "visatype")?;
    let i94cit = numeric(batch, "i94cit")?;
    let i94res = numeric(batch, "i94res")?;
    let biryear = numeric(batch, "biryear")?;
    let gender = text(batch, "gender")?;
    let insnum = text(batch, "insnum")?;
    let airline = text(batch, "airline")?;
    let admnum = numeric(batch, "admnum")?;
    let fltno = text(batch, "fltno")?;

    let rows = (0..batch.num_rows())
        .map(|i| RawImmigrationRecord {
            cicid: number_at(&cicid, i),
            i94yr: number_at(&i94yr, i),
            i94mon: number_at(&i94mon, i),
            i94port: text_at(&i94port, i),
            i94addr: text_at(&i94addr, i),
            arrdate: number_at(&arrdate, i),
            depdate: number_at(&depdate, i),
            i94mode: number_at(&i94mode, i),
            i94visa: number_at(&i94visa, i),
            visatype: text_at(&visatype, i),
            i94cit: number_at(&i94cit, i),
            i94res: number_at(&i94res, i),
            biryear: number_at(&biryear, i),
            gender: text_at(&gender, i),
            insnum: text_at(&insnum, i),
            airline: text_at(&airline, i),
            admnum: number_at(&admnum, i),
            fltno: text_at(&fltno, i),
        })
        .collect();
    Ok(rows)
}

fn strict_cast(batch: &RecordBatch, column: &str, to: &DataType) -> Result<arrow::array::ArrayRef> {
    let array = batch
        .column_by_name(column)
        .ok_or_else(|| EtlError::Schema(format!("batch has no column '{}'", column)))?;
    let options = CastOptions { safe: false, ..Default::default() };
    cast_with_options(array, to, &options).map_err(|e| EtlError::coercion(SOURCE, column, e))
}

/// A numeric source column after widening.
enum NumericColumn {
    Int(Int64Array),
    Float(Float64Array),
}

fn numeric(batch: &RecordBatch, column: &str) -> Result<NumericColumn> {
    let is_integer = batch
        .column_by_name(column)
        .is_some_and(|array| array.data_type().is_integer());
    if is_integer {
        let array = strict_cast(batch, column, &DataType::Int64)?;
        Ok(NumericColumn::Int(array.as_primitive::<Int64Type>().clone()))
    } else {
        let array = strict_cast(batch, column, &DataType::Float64)?;
        Ok(NumericColumn::Float(array.as_primitive::<Float64Type>().clone()))
    }
}

fn text(batch: &RecordBatch, column: &str) -> Result<StringArray> {
    Ok(strict_cast(batch, column, &DataType::Utf8)?.as_string::<i32>().clone())
}

fn number_at(column: &NumericColumn, i: usize) -> Option<RawNumber> {
    match column {
        NumericColumn::Int(a) => (!a.is_null(i)).then(|| RawNumber::Int(a.value(i))),
        NumericColumn::Float(a) => (!a.is_null(i)).then(|| RawNumber::Float(a.value(i))),
    }
}

fn text_at(array: &StringArray, i: usize) -> Option<String> {
    (!array.is_null(i)).then(|| array.value(i).to_string())
}

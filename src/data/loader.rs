use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use arrow::array::{Array, Float32Array, Float64Array, Int32Array, Int64Array};
use arrow::datatypes::DataType;
use log::debug;
use ndarray::{Axis, Ix4};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Mask, RegressorTable, Volume};
use crate::error::{CleanError, Result};

// ---------------------------------------------------------------------------
// NIfTI volumes
// ---------------------------------------------------------------------------

/// Load a `.nii` / `.nii.gz` image as a 4D volume. A 3D image becomes a
/// single-frame series.
pub fn load_volume(path: &Path) -> Result<Volume> {
    let (header, data) = read_nifti(path)?;
    let data = match data.ndim() {
        3 => data.insert_axis(Axis(3)),
        4 => data,
        _ => {
            return Err(CleanError::shape(format!(
                "{}: expected a 3D or 4D image, got shape {:?}",
                path.display(),
                data.shape()
            )))
        }
    };
    let data = data
        .into_dimensionality::<Ix4>()
        .map_err(|e| CleanError::shape(format!("{}: {e}", path.display())))?;
    debug!("loaded {} with shape {:?}", path.display(), data.shape());
    Ok(Volume::new(data, header))
}

/// Load a mask image; any non-zero voxel is selected.
pub fn load_mask(path: &Path) -> Result<Mask> {
    let (_, data) = read_nifti(path)?;
    let mask = Mask::from_values(data)?;
    debug!("mask {} selects {} voxels", path.display(), mask.count());
    Ok(mask)
}

fn read_nifti(path: &Path) -> Result<(nifti::NiftiHeader, ndarray::ArrayD<f64>)> {
    let to_err = |source| CleanError::Nifti {
        path: path.to_path_buf(),
        source,
    };
    let obj = ReaderOptions::new().read_file(path).map_err(to_err)?;
    let header = obj.header().clone();
    let data = obj.into_volume().into_ndarray::<f64>().map_err(to_err)?;
    Ok((header, data))
}

// ---------------------------------------------------------------------------
// Regressor tables – dispatch by extension
// ---------------------------------------------------------------------------

/// Load a regressor table (rows = timepoints, columns = parameters).
///
/// Supported formats:
/// * `.csv` / `.tsv` – delimited text, optional header row
/// * `.txt` / `.1d` / `.par` / `.dat` – whitespace-separated numbers
/// * `.json` – `[[...], ...]` or `[{ "name": value, ... }, ...]`
/// * `.parquet` – every numeric column becomes a regressor
pub fn load_table(path: &Path) -> Result<RegressorTable> {
    load_table_inner(path)
        .map_err(|source| CleanError::Table {
            path: path.to_path_buf(),
            source,
        })
        .inspect(|table| {
            debug!(
                "regressor table {}: {} rows × {} columns",
                path.display(),
                table.n_rows(),
                table.n_columns()
            )
        })
}

fn load_table_inner(path: &Path) -> anyhow::Result<RegressorTable> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => load_delimited(path, b','),
        "tsv" => load_delimited(path, b'\t'),
        "txt" | "1d" | "par" | "dat" => load_whitespace(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => bail!("Unsupported regressor file extension: .{other}"),
    }
}

/// Empty cells and `n/a` (as written by BIDS confound tables) read as 0.
fn parse_cell(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("n/a") || s.eq_ignore_ascii_case("nan") {
        return Some(0.0);
    }
    s.parse::<f64>().ok()
}

// ---------------------------------------------------------------------------
// Delimited text loader
// ---------------------------------------------------------------------------

/// The first row is a header when any of its cells is not a number.
fn load_delimited(path: &Path, delimiter: u8) -> anyhow::Result<RegressorTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .context("opening delimited file")?;

    let mut columns = None;
    let mut rows = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("row {row_no}"))?;
        let parsed: Option<Vec<f64>> = record.iter().map(parse_cell).collect();
        match parsed {
            Some(values) => rows.push(values),
            None if row_no == 0 => {
                columns = Some(record.iter().map(|h| h.to_string()).collect());
            }
            None => bail!("row {row_no}: non-numeric value in {:?}", record),
        }
    }

    RegressorTable::from_rows(columns, rows)
}

// ---------------------------------------------------------------------------
// Whitespace text loader (FSL .par, AFNI .1D)
// ---------------------------------------------------------------------------

fn load_whitespace(path: &Path) -> anyhow::Result<RegressorTable> {
    let text = std::fs::read_to_string(path).context("reading text file")?;
    let mut rows = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let row = line
            .split_whitespace()
            .map(|tok| {
                parse_cell(tok).with_context(|| format!("line {}: '{tok}' is not a number", line_no + 1))
            })
            .collect::<anyhow::Result<Vec<f64>>>()?;
        rows.push(row);
    }

    RegressorTable::from_rows(None, rows)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Either rows as arrays:
///
/// ```json
/// [[0.01, -0.02, 0.0], [0.02, -0.01, 0.1]]
/// ```
///
/// or rows as objects, with the first object fixing the column set:
///
/// ```json
/// [{ "trans_x": 0.01, "rot_z": 0.0 }, { "trans_x": 0.02, "rot_z": 0.1 }]
/// ```
fn load_json(path: &Path) -> anyhow::Result<RegressorTable> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let records = root.as_array().context("Expected top-level JSON array")?;

    let columns: Option<Vec<String>> = records
        .first()
        .and_then(|r| r.as_object())
        .map(|obj| obj.keys().cloned().collect());

    let mut rows = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let row = match (&columns, rec) {
            (None, JsonValue::Array(values)) => values
                .iter()
                .enumerate()
                .map(|(j, v)| json_number(v).with_context(|| format!("Row {i}, [{j}]: not a number")))
                .collect::<anyhow::Result<Vec<f64>>>()?,
            (Some(cols), JsonValue::Object(obj)) => cols
                .iter()
                .map(|col| {
                    obj.get(col)
                        .and_then(json_number)
                        .with_context(|| format!("Row {i}: missing or invalid '{col}'"))
                })
                .collect::<anyhow::Result<Vec<f64>>>()?,
            _ => bail!("Row {i}: rows must all be arrays or all be objects"),
        };
        rows.push(row);
    }

    RegressorTable::from_rows(columns, rows)
}

fn json_number(val: &JsonValue) -> Option<f64> {
    match val {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Null => Some(0.0),
        JsonValue::String(s) => parse_cell(s),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Every Float64/Float32/Int64/Int32 column is a regressor, in schema order.
/// Other columns are skipped; nulls read as 0.
fn load_parquet(path: &Path) -> anyhow::Result<RegressorTable> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    let mut columns: Option<Vec<(usize, String)>> = None;
    let mut data: Vec<Vec<f64>> = Vec::new();

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;

        let numeric = columns.get_or_insert_with(|| {
            batch
                .schema()
                .fields()
                .iter()
                .enumerate()
                .filter(|(_, f)| is_numeric(f.data_type()))
                .map(|(i, f)| (i, f.name().clone()))
                .collect()
        });
        if data.is_empty() {
            data = vec![Vec::new(); numeric.len()];
        }

        for ((col_idx, name), values) in numeric.iter().zip(data.iter_mut()) {
            let col = batch.column(*col_idx);
            extract_f64_column(col, values).with_context(|| format!("column '{name}'"))?;
        }
    }

    let columns = columns.unwrap_or_default();
    if columns.is_empty() {
        bail!("Parquet file has no numeric columns");
    }
    let n_rows = data.first().map_or(0, Vec::len);
    let rows = (0..n_rows)
        .map(|r| data.iter().map(|col| col[r]).collect())
        .collect();
    let names = columns.into_iter().map(|(_, name)| name).collect();

    RegressorTable::from_rows(Some(names), rows)
}

fn is_numeric(dt: &DataType) -> bool {
    matches!(
        dt,
        DataType::Float64 | DataType::Float32 | DataType::Int64 | DataType::Int32
    )
}

/// Append every row of a numeric Arrow column to `out`.
fn extract_f64_column(col: &Arc<dyn Array>, out: &mut Vec<f64>) -> anyhow::Result<()> {
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        out.extend(arr.iter().map(|v| v.unwrap_or(0.0)));
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        out.extend(arr.iter().map(|v| v.unwrap_or(0.0) as f64));
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        out.extend(arr.iter().map(|v| v.unwrap_or(0) as f64));
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        out.extend(arr.iter().map(|v| v.unwrap_or(0) as f64));
    } else {
        bail!("unsupported column type {:?}", col.data_type());
    }
    Ok(())
}

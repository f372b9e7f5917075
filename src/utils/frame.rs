//! Conversions between polars frames and ndarray matrices

use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Values of one column as `f64`; nulls and unparsable text are rejected
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::FeatureNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;

    series
        .f64()?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                PipelineError::DataError(format!(
                    "Column '{}' has a missing or non-numeric value at row {}",
                    name, row
                ))
            })
        })
        .collect()
}

/// Extract named columns into a row-major matrix
pub fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|name| column_f64(df, name))
        .collect::<Result<_>>()?;

    Ok(Array2::from_shape_fn((n_rows, col_names.len()), |(r, c)| col_data[c][r]))
}

/// Integer class labels from one column
pub fn column_labels(df: &DataFrame, name: &str) -> Result<Array1<i64>> {
    column_f64(df, name)?
        .into_iter()
        .map(|v| {
            if v.fract() == 0.0 && v.is_finite() {
                Ok(v as i64)
            } else {
                Err(PipelineError::DataError(format!(
                    "Label column '{}' holds non-integer value {}",
                    name, v
                )))
            }
        })
        .collect()
}

/// Rebuild a frame from a feature matrix and labels
pub fn array2_to_frame(
    x: &Array2<f64>,
    feature_names: &[String],
    y: &Array1<i64>,
    target: &str,
) -> Result<DataFrame> {
    if x.ncols() != feature_names.len() || x.nrows() != y.len() {
        return Err(PipelineError::ShapeError {
            expected: format!("{} rows x {} columns", y.len(), feature_names.len()),
            actual: format!("{} rows x {} columns", x.nrows(), x.ncols()),
        });
    }

    let mut columns: Vec<Column> = feature_names
        .iter()
        .enumerate()
        .map(|(j, name)| Series::new(name.as_str().into(), x.column(j).to_vec()).into())
        .collect();
    columns.push(Series::new(target.into(), y.to_vec()).into());

    Ok(DataFrame::new(columns)?)
}

/// Column names other than `target`, in frame order
pub fn feature_columns(df: &DataFrame, target: &str) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .filter(|name| name.as_str() != target)
        .map(|name| name.to_string())
        .collect()
}

//! Conversion of a loaded table into dense feature/target arrays

use crate::error::{ModellingError, Result};
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Name of the column holding the regression target
pub const TARGET_COLUMN: &str = "target";

/// Feature matrix and target vector extracted from a table
#[derive(Debug, Clone)]
pub struct Dataset {
    feature_names: Vec<String>,
    features: Array2<f64>,
    target: Array1<f64>,
}

impl Dataset {
    /// Build a dataset from a frame, using every column other than `target_column`
    /// as a feature.
    ///
    /// All columns must cast to `f64` without producing nulls; the input is
    /// expected to be fully preprocessed.
    pub fn from_frame(df: &DataFrame, target_column: &str) -> Result<Self> {
        let target_col = df
            .column(target_column)
            .map_err(|_| ModellingError::FeatureNotFound(target_column.to_string()))?;
        let target = Array1::from_vec(column_to_vec(target_col)?);

        let feature_names: Vec<String> = df
            .get_column_names()
            .into_iter()
            .filter(|name| name.as_str() != target_column)
            .map(|name| name.to_string())
            .collect();

        if feature_names.is_empty() {
            return Err(ModellingError::DataError(format!(
                "no feature columns besides '{}'",
                target_column
            )));
        }

        let features = columns_to_array2(df, &feature_names)?;

        Ok(Self {
            feature_names,
            features,
            target,
        })
    }

    /// Build a dataset directly from arrays
    pub fn from_arrays(
        feature_names: Vec<String>,
        features: Array2<f64>,
        target: Array1<f64>,
    ) -> Result<Self> {
        if features.nrows() != target.len() {
            return Err(ModellingError::ShapeError {
                expected: format!("target length = {}", features.nrows()),
                actual: format!("target length = {}", target.len()),
            });
        }
        if features.ncols() != feature_names.len() {
            return Err(ModellingError::ShapeError {
                expected: format!("{} feature names", features.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }
        Ok(Self {
            feature_names,
            features,
            target,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn n_rows(&self) -> usize {
        self.target.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}

fn column_to_vec(column: &Column) -> Result<Vec<f64>> {
    let name = column.name().to_string();
    let cast = column
        .cast(&DataType::Float64)
        .map_err(|e| ModellingError::DataError(format!("column '{}': {}", name, e)))?;

    // Non-strict casts turn unparsable values into nulls, so this also catches text columns.
    let nulls = cast.null_count();
    if nulls > 0 {
        return Err(ModellingError::DataError(format!(
            "column '{}' has {} missing or non-numeric values",
            name, nulls
        )));
    }

    Ok(cast
        .as_materialized_series()
        .f64()?
        .into_no_null_iter()
        .collect())
}

/// Extract named columns into a row-major `Array2<f64>`
fn columns_to_array2(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| ModellingError::FeatureNotFound(col_name.clone()))?;
            column_to_vec(column)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_data[c][r]))
}

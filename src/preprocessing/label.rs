//! Binary label encoding

use crate::data::Column;
use crate::error::{PipelineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

const POSITIVE_TOKENS: &[&str] = &["1", "yes", "true", "y", "t"];
const NEGATIVE_TOKENS: &[&str] = &["0", "no", "false", "n", "f"];

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Maps the label column onto `0.0` / `1.0`.
///
/// Boolean-like labels (`Yes`/`No`, `1`/`0`, `true`/`false`) keep their
/// polarity. Any other pair of values is ordered lexicographically and the
/// second one becomes the positive class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    negative: Vec<String>,
    positive: Vec<String>,
    boolean_tokens: bool,
}

impl LabelEncoder {
    /// Learn the label vocabulary
    pub fn fit(column: &Column) -> Result<Self> {
        let mut distinct = BTreeSet::new();
        for row in 0..column.len() {
            let value = column.text(row).ok_or_else(|| {
                PipelineError::PreprocessingError(format!(
                    "label column '{}' has a missing value at row {}",
                    column.name, row
                ))
            })?;
            distinct.insert(normalize(&value));
        }

        if distinct.is_empty() {
            return Err(PipelineError::PreprocessingError(format!(
                "label column '{}' is empty",
                column.name
            )));
        }

        let all_boolean = distinct
            .iter()
            .all(|v| {
                POSITIVE_TOKENS.contains(&v.as_str()) || NEGATIVE_TOKENS.contains(&v.as_str())
            });

        if all_boolean {
            let (positive, negative): (Vec<String>, Vec<String>) = distinct
                .into_iter()
                .partition(|v| POSITIVE_TOKENS.contains(&v.as_str()));
            return Ok(Self {
                negative,
                positive,
                boolean_tokens: true,
            });
        }

        if distinct.len() != 2 {
            return Err(PipelineError::PreprocessingError(format!(
                "label column '{}' must be binary, found {} distinct values",
                column.name,
                distinct.len()
            )));
        }

        let mut values = distinct.into_iter();
        let negative = values.next().into_iter().collect();
        let positive = values.next().into_iter().collect();
        Ok(Self {
            negative,
            positive,
            boolean_tokens: false,
        })
    }

    /// Encode one label value
    pub fn encode(&self, value: &str) -> Result<f64> {
        let v = normalize(value);
        if self.positive.contains(&v) {
            return Ok(1.0);
        }
        if self.negative.contains(&v) {
            return Ok(0.0);
        }
        if self.boolean_tokens {
            if POSITIVE_TOKENS.contains(&v.as_str()) {
                return Ok(1.0);
            }
            if NEGATIVE_TOKENS.contains(&v.as_str()) {
                return Ok(0.0);
            }
        }
        Err(PipelineError::PreprocessingError(format!(
            "unseen label value '{}'",
            value
        )))
    }

    /// Encode a whole label column
    pub fn transform(&self, column: &Column) -> Result<Array1<f64>> {
        (0..column.len())
            .map(|row| {
                let value = column.text(row).ok_or_else(|| {
                    PipelineError::PreprocessingError(format!(
                        "label column '{}' has a missing value at row {}",
                        column.name, row
                    ))
                })?;
                self.encode(&value)
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from_vec)
    }

    /// Label values mapped to the positive class
    pub fn positive_values(&self) -> &[String] {
        &self.positive
    }
}

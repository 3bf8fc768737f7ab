use crate::config::{FieldKeys, FormatTag};
use crate::data::model::{FieldValue, FoldRecord};
use crate::data::params::{ArgumentSet, ParamSet};
use crate::error::{PrepError, Result};

use super::dispatch::{Decomposition, DEFAULT_FIELD};

impl Decomposition {
    /// Turn one fold into its ordered argument sets.
    ///
    /// Every argument set borrows its sample from `record` and shares `params`.
    pub fn decompose<'a>(
        self,
        record: &'a FoldRecord,
        keys: Option<&'a FieldKeys>,
        params: &'a ParamSet,
    ) -> Result<Vec<ArgumentSet<'a>>> {
        match self {
            Decomposition::Default => single_field(record, DEFAULT_FIELD, params),
            Decomposition::SingleField => {
                let keys = require_keys(keys, FormatTag::SingleField)?;
                single_field(record, keys.single_y(FormatTag::SingleField)?, params)
            }
            Decomposition::PairedField => {
                let keys = require_keys(keys, FormatTag::PairedField)?;
                let y = keys.single_y(FormatTag::PairedField)?;
                let x = keys.x.as_deref().ok_or_else(|| {
                    PrepError::InvalidConfiguration("paired_field needs an x field".into())
                })?;
                paired_field(record, y, x, params)
            }
            Decomposition::MultiField => {
                let keys = require_keys(keys, FormatTag::MultiField)?;
                multi_field(record, &keys.y.labels(), params)
            }
        }
    }
}

fn require_keys(keys: Option<&FieldKeys>, mode: FormatTag) -> Result<&FieldKeys> {
    keys.ok_or_else(|| PrepError::InvalidConfiguration(format!("{mode} needs unpack_keys")))
}

fn numeric_rows<'a>(record: &'a FoldRecord, label: &str) -> Result<Vec<&'a [f64]>> {
    record
        .get(label)
        .ok_or_else(|| PrepError::MissingField(label.to_string()))?
        .rows()
        .ok_or_else(|| PrepError::NotNumeric(label.to_string()))
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// A series yields one argument set, a matrix one per row.
fn single_field<'a>(
    record: &'a FoldRecord,
    label: &str,
    params: &'a ParamSet,
) -> Result<Vec<ArgumentSet<'a>>> {
    Ok(numeric_rows(record, label)?
        .into_iter()
        .map(|y| ArgumentSet::new(y, params))
        .collect())
}

/// Pair value rows with axis rows. A flat axis is broadcast to every row.
fn paired_field<'a>(
    record: &'a FoldRecord,
    y_label: &str,
    x_label: &str,
    params: &'a ParamSet,
) -> Result<Vec<ArgumentSet<'a>>> {
    let ys = numeric_rows(record, y_label)?;
    let axis = record
        .get(x_label)
        .ok_or_else(|| PrepError::MissingField(x_label.to_string()))?;

    match axis {
        FieldValue::Series(x) => Ok(ys
            .into_iter()
            .map(|y| ArgumentSet::new(y, params).with_x(x))
            .collect()),
        FieldValue::Matrix(xs) => {
            if xs.len() != ys.len() {
                return Err(PrepError::ShapeMismatch(format!(
                    "'{y_label}' has {} rows but axis '{x_label}' has {}",
                    ys.len(),
                    xs.len()
                )));
            }
            Ok(ys
                .into_iter()
                .zip(xs)
                .map(|(y, x)| ArgumentSet::new(y, params).with_x(x))
                .collect())
        }
        _ => Err(PrepError::NotNumeric(x_label.to_string())),
    }
}

/// Single-field decomposition of each label in order, concatenated.
fn multi_field<'a>(
    record: &'a FoldRecord,
    labels: &[&str],
    params: &'a ParamSet,
) -> Result<Vec<ArgumentSet<'a>>> {
    let mut samples = Vec::new();
    for label in labels {
        samples.extend(single_field(record, label, params)?);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fold() -> FoldRecord {
        FoldRecord::new()
            .with("a", vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])
            .with("b", vec![vec![7.0, 8.0], vec![9.0, 10.0]])
            .with("flat", vec![0.5, 0.25, 0.125])
            .with("axis", vec![10.0, 20.0])
            .with("label", FieldValue::Text("run 1".into()))
    }

    #[test]
    fn matrix_yields_one_sample_per_row() {
        let record = fold();
        let params = ParamSet::new();
        let keys = FieldKeys::y("a");
        let samples = Decomposition::SingleField
            .decompose(&record, Some(&keys), &params)
            .unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[2].y, &[5.0, 6.0]);
        assert!(samples.iter().all(|s| s.x.is_none()));
    }

    #[test]
    fn series_yields_a_single_sample() {
        let record = fold();
        let params = ParamSet::new();
        let keys = FieldKeys::y("flat");
        let samples = Decomposition::SingleField
            .decompose(&record, Some(&keys), &params)
            .unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].y, &[0.5, 0.25, 0.125]);
    }

    #[test]
    fn flat_axis_is_broadcast() {
        let record = fold();
        let params = ParamSet::new();
        let keys = FieldKeys::y_of_x("b", "axis");
        let samples = Decomposition::PairedField
            .decompose(&record, Some(&keys), &params)
            .unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.x == Some(&[10.0, 20.0][..])));
    }

    #[test]
    fn matrix_axis_must_match_rows() {
        let record = fold().with("axis", vec![vec![1.0, 2.0]]);
        let params = ParamSet::new();
        let keys = FieldKeys::y_of_x("a", "axis");
        let err = Decomposition::PairedField
            .decompose(&record, Some(&keys), &params)
            .unwrap_err();
        assert!(matches!(err, PrepError::ShapeMismatch(_)));
    }

    #[test]
    fn matrix_axis_pairs_rows_in_order() {
        let xs = vec![vec![10.0, 11.0], vec![20.0, 21.0], vec![30.0, 31.0]];
        let record = fold().with("axis", xs.clone());
        let params = ParamSet::new();
        let keys = FieldKeys::y_of_x("a", "axis");
        let samples = Decomposition::PairedField
            .decompose(&record, Some(&keys), &params)
            .unwrap();
        assert_eq!(samples.len(), 3);
        for (i, sample) in samples.iter().enumerate() {
            assert_eq!(sample.x, Some(xs[i].as_slice()));
            assert_eq!(sample.y[0], 1.0 + 2.0 * i as f64);
        }
    }

    #[test]
    fn multi_field_concatenates_in_label_order() {
        let record = fold();
        let params = ParamSet::new().with("window_size", 3_i64);
        let keys = FieldKeys::many(vec!["a", "b"]);
        let samples = Decomposition::MultiField
            .decompose(&record, Some(&keys), &params)
            .unwrap();
        let firsts: Vec<f64> = samples.iter().map(|s| s.y[0]).collect();
        assert_eq!(firsts, vec![1.0, 3.0, 5.0, 7.0, 9.0]);
        assert!(samples.iter().all(|s| s.params.contains("window_size")));
    }

    #[test]
    fn missing_and_non_numeric_fields_are_errors() {
        let record = fold();
        let params = ParamSet::new();
        let missing = Decomposition::Default.decompose(&record, None, &params);
        assert!(matches!(missing, Err(PrepError::MissingField(ref f)) if f == "data"));

        let keys = FieldKeys::y("label");
        let text = Decomposition::SingleField.decompose(&record, Some(&keys), &params);
        assert!(matches!(text, Err(PrepError::NotNumeric(_))));
    }
}

use crate::config::{FieldKeys, FormatTag};
use crate::data::model::{FieldValue, FoldRecord};
use crate::error::{PrepError, Result};

use super::dispatch::{Reassembly, DEFAULT_FIELD};

impl Reassembly {
    /// Write `results` back into a copy of `record`.
    ///
    /// `record` is the fold as it was before decomposition; its field shapes
    /// decide how many results each field reclaims. The input is never touched.
    pub fn reassemble(
        self,
        record: &FoldRecord,
        keys: Option<&FieldKeys>,
        results: Vec<FieldValue>,
    ) -> Result<FoldRecord> {
        let mut updated = record.clone();
        match self {
            Reassembly::Default => {
                updated.insert(DEFAULT_FIELD, restore_shape(record.get(DEFAULT_FIELD), results));
            }
            Reassembly::SingleField => {
                let label = require_keys(keys, FormatTag::SingleField)?
                    .single_y(FormatTag::SingleField)?;
                updated.insert(label, restore_shape(record.get(label), results));
            }
            Reassembly::MultiField => {
                let keys = require_keys(keys, FormatTag::MultiField)?;
                for (label, value) in split_by_label(record, &keys.y.labels(), results)? {
                    updated.insert(label, value);
                }
            }
        }
        Ok(updated)
    }
}

fn require_keys(keys: Option<&FieldKeys>, mode: FormatTag) -> Result<&FieldKeys> {
    keys.ok_or_else(|| PrepError::InvalidConfiguration(format!("{mode} needs pack_keys")))
}

/// A field that was a flat series and got exactly one result stays flat;
/// otherwise the results become rows.
fn restore_shape(original: Option<&FieldValue>, mut results: Vec<FieldValue>) -> FieldValue {
    match (original, results.len()) {
        (Some(FieldValue::Series(_)), 1) => results.remove(0),
        _ => FieldValue::from_results(results),
    }
}

/// Hand each label as many leading results as it had samples.
///
/// The counts must add up to exactly the number of results.
fn split_by_label<'l>(
    record: &FoldRecord,
    labels: &[&'l str],
    results: Vec<FieldValue>,
) -> Result<Vec<(&'l str, FieldValue)>> {
    let counts = labels
        .iter()
        .map(|label| {
            record
                .get(label)
                .ok_or_else(|| PrepError::MissingField(label.to_string()))?
                .sample_count()
                .ok_or_else(|| PrepError::NotNumeric(label.to_string()))
        })
        .collect::<Result<Vec<usize>>>()?;

    let expected: usize = counts.iter().sum();
    if expected != results.len() {
        return Err(PrepError::ResultCountMismatch {
            expected,
            actual: results.len(),
        });
    }

    let mut remaining = results.into_iter();
    Ok(labels
        .iter()
        .zip(counts)
        .map(|(label, count)| {
            let taken: Vec<FieldValue> = remaining.by_ref().take(count).collect();
            (*label, restore_shape(record.get(label), taken))
        })
        .collect())
}

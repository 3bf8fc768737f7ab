use crate::config::{Configuration, Domain};
use crate::data::model::FieldValue;
use crate::data::params::{ArgumentSet, ParamSet};
use crate::error::{PrepError, Result};
use crate::pipeline::SampleProcessor;

/// Keep the index region `[left, right)` of `y`, or everything outside it.
///
/// Bounds `<= 0` count from the end. The pair is reordered when `left >= right`.
pub fn cut_range(y: &[f64], range: (i64, i64), return_middle: bool) -> Result<Vec<f64>> {
    let len = y.len() as i64;
    let resolve = |bound: i64| if bound <= 0 { len + bound } else { bound };

    let (mut left, mut right) = (resolve(range.0), resolve(range.1));
    if left >= right {
        std::mem::swap(&mut left, &mut right);
    }
    if left < 0 || right > len {
        return Err(PrepError::invalid_parameter(
            "cut_range",
            format!("({left}, {right}) is outside a sample of length {len}"),
        ));
    }

    let (left, right) = (left as usize, right as usize);
    if return_middle {
        Ok(y[left..right].to_vec())
    } else {
        Ok(y[..left].iter().chain(&y[right..]).copied().collect())
    }
}

/// `cut-range`: applied to both the value field and its axis by default, so
/// the two stay aligned.
pub struct CutRange;

impl SampleProcessor for CutRange {
    fn name(&self) -> &str {
        "cut-range"
    }

    fn defaults(&self) -> ParamSet {
        ParamSet::new()
            .with("cut_range", (200_i64, -100_i64))
            .with("return_middle", true)
    }

    fn default_configuration(&self) -> Configuration {
        Domain::Ftir.multi()
    }

    fn process(&self, args: &ArgumentSet<'_>) -> Result<FieldValue> {
        let p = args.params;
        cut_range(args.y, p.int_pair("cut_range")?, p.flag("return_middle")?)
            .map(FieldValue::Series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64).collect()
    }

    #[test]
    fn middle_with_bound_from_the_end() {
        assert_eq!(cut_range(&ramp(10), (2, -3), true).unwrap(), vec![2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn outer_parts_are_concatenated() {
        assert_eq!(
            cut_range(&ramp(10), (2, -3), false).unwrap(),
            vec![0.0, 1.0, 7.0, 8.0, 9.0]
        );
        // A zero left bound means "the end", so the pair is swapped to (7, 10).
        assert_eq!(cut_range(&ramp(10), (0, 7), false).unwrap(), ramp(7));
    }

    #[test]
    fn reversed_bounds_are_swapped() {
        assert_eq!(cut_range(&ramp(6), (4, 1), true).unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn out_of_range_bounds_fail() {
        assert!(cut_range(&ramp(10), (2, 20), true).is_err());
        assert!(cut_range(&ramp(10), (-20, 5), true).is_err());
    }

    #[test]
    fn default_configuration_cuts_values_and_axis() {
        let config = CutRange.default_configuration();
        assert_eq!(config, Domain::Ftir.multi());
    }
}

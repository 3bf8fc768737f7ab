use std::fmt;
use std::str::FromStr;

use log::trace;

use crate::config::{Configuration, Domain};
use crate::data::model::FieldValue;
use crate::data::params::{ArgumentSet, ParamSet};
use crate::error::{PrepError, Result};
use crate::pipeline::SampleProcessor;

use super::filter::running_median;
use super::linalg::{least_squares, second_difference_penalty, vandermonde};

// ---------------------------------------------------------------------------
// Output selection
// ---------------------------------------------------------------------------

/// What a baseline processor hands back for each sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaselineOutput {
    /// The estimated baseline itself.
    Baseline,
    /// The sample with the baseline subtracted.
    Removal,
    /// Two rows: removal, then baseline.
    Both,
}

impl BaselineOutput {
    pub fn apply(self, y: &[f64], baseline: Vec<f64>) -> FieldValue {
        let removal = || y.iter().zip(&baseline).map(|(v, b)| v - b).collect::<Vec<f64>>();
        match self {
            BaselineOutput::Baseline => FieldValue::Series(baseline),
            BaselineOutput::Removal => FieldValue::Series(removal()),
            BaselineOutput::Both => {
                let corrected = removal();
                FieldValue::Matrix(vec![corrected, baseline])
            }
        }
    }
}

impl FromStr for BaselineOutput {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "baseline" => Ok(BaselineOutput::Baseline),
            "removal" => Ok(BaselineOutput::Removal),
            "both" => Ok(BaselineOutput::Both),
            other => Err(PrepError::invalid_parameter(
                "output",
                format!("'{other}' is not one of baseline, removal, both"),
            )),
        }
    }
}

impl fmt::Display for BaselineOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BaselineOutput::Baseline => "baseline",
            BaselineOutput::Removal => "removal",
            BaselineOutput::Both => "both",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Asymmetric least squares
// ---------------------------------------------------------------------------

/// Asymmetric least squares baseline (Eilers & Boelens).
///
/// Repeatedly solves `(W + lam D Dᵀ) b = W y`, starting from unit weights and
/// reweighting with `p` above the baseline and `1 - p` below it. Points lying
/// exactly on the baseline get weight zero.
pub fn als_baseline(y: &[f64], lam: f64, p: f64, iterations: usize) -> Result<Vec<f64>> {
    if y.len() < 3 {
        return Err(PrepError::invalid_parameter(
            "y",
            format!("needs at least 3 points, got {}", y.len()),
        ));
    }
    if lam.is_nan() || lam <= 0.0 {
        return Err(PrepError::invalid_parameter("lam", format!("{lam} must be positive")));
    }
    if p.is_nan() || p <= 0.0 || p >= 1.0 {
        return Err(PrepError::invalid_parameter("p", format!("{p} is outside (0, 1)")));
    }
    if iterations == 0 {
        return Err(PrepError::invalid_parameter("iterations", "must be at least 1"));
    }

    let mut penalty = second_difference_penalty(y.len());
    penalty.scale(lam);

    let mut weights = vec![1.0; y.len()];
    let mut baseline = Vec::new();
    for iteration in 0..iterations {
        let mut system = penalty.clone();
        system.add_diagonal(&weights);
        let rhs: Vec<f64> = weights.iter().zip(y).map(|(w, v)| w * v).collect();
        baseline = system.solve(&rhs)?;

        weights = y
            .iter()
            .zip(&baseline)
            .map(|(v, b)| {
                if v > b {
                    p
                } else if v < b {
                    1.0 - p
                } else {
                    0.0
                }
            })
            .collect();
        trace!("als iteration {iteration}");
    }
    Ok(baseline)
}

// ---------------------------------------------------------------------------
// Improved modified polynomial
// ---------------------------------------------------------------------------

fn population_std(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let (sum, count) = values.clone().fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    (values.map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64).sqrt()
}

/// Improved modified polynomial baseline (Zhao et al.).
///
/// Fits a polynomial, drops points more than one residual standard deviation
/// above it, then keeps refitting while clipping the remaining points to
/// `fit + std`. Stops once the relative change of the standard deviation
/// drops below `gradient` or after `iterations` fits.
pub fn modpoly_baseline(
    y: &[f64],
    degree: usize,
    iterations: usize,
    gradient: f64,
) -> Result<Vec<f64>> {
    if y.is_empty() {
        return Err(PrepError::invalid_parameter("y", "sample is empty"));
    }
    if degree >= y.len() {
        return Err(PrepError::invalid_parameter(
            "polynomial_degree",
            format!("{degree} needs more than {} points", y.len()),
        ));
    }
    if iterations == 0 {
        return Err(PrepError::invalid_parameter("iterations", "must be at least 1"));
    }

    // Abscissa scaled onto [-1, 1] keeps the design matrix well conditioned.
    let n = y.len();
    let span = (n.max(2) - 1) as f64;
    let u: Vec<f64> = (0..n).map(|i| 2.0 * i as f64 / span - 1.0).collect();
    let design = vandermonde(&u, degree);

    let mut coeffs = least_squares(&design, y)?;
    let fitted = &design * &coeffs;
    let mut prev_dev = population_std(y.iter().zip(fitted.iter()).map(|(v, f)| v - f));

    let kept: Vec<usize> = (0..n).filter(|&i| y[i] <= fitted[i] + prev_dev).collect();
    let mut y_work: Vec<f64> = kept.iter().map(|&i| y[i]).collect();
    let kept_design = design.select_rows(kept.iter());

    for round in 2..=iterations {
        coeffs = least_squares(&kept_design, &y_work)?;
        let pred = &kept_design * &coeffs;
        let dev = population_std(y_work.iter().zip(pred.iter()).map(|(v, f)| v - f));
        trace!("modpoly round {round}: dev {dev}");

        if dev == 0.0 || ((dev - prev_dev) / dev).abs() < gradient {
            break;
        }
        for (v, f) in y_work.iter_mut().zip(pred.iter()) {
            *v = v.min(f + dev);
        }
        prev_dev = dev;
    }

    Ok((&design * &coeffs).iter().copied().collect())
}

// ---------------------------------------------------------------------------
// Processors
// ---------------------------------------------------------------------------

fn output_mode(params: &ParamSet) -> Result<BaselineOutput> {
    params.text("output")?.parse()
}

/// `als-baseline`
pub struct AlsBaseline;

impl SampleProcessor for AlsBaseline {
    fn name(&self) -> &str {
        "als-baseline"
    }

    fn defaults(&self) -> ParamSet {
        ParamSet::new()
            .with("output", "removal")
            .with("lam", 1000_i64)
            .with("p", 0.1)
            .with("iterations", 10_i64)
    }

    fn default_configuration(&self) -> Configuration {
        Domain::Ftir.single()
    }

    fn process(&self, args: &ArgumentSet<'_>) -> Result<FieldValue> {
        let p = args.params;
        let output = output_mode(p)?;
        let baseline = als_baseline(
            args.y,
            p.float("lam")?,
            p.float("p")?,
            p.count("iterations")?,
        )?;
        Ok(output.apply(args.y, baseline))
    }
}

/// `median-baseline`: a running median taken as the baseline.
pub struct MedianBaseline;

impl SampleProcessor for MedianBaseline {
    fn name(&self) -> &str {
        "median-baseline"
    }

    fn defaults(&self) -> ParamSet {
        ParamSet::new()
            .with("output", "removal")
            .with("window_size", 3_i64)
    }

    fn default_configuration(&self) -> Configuration {
        Domain::Ftir.single()
    }

    fn process(&self, args: &ArgumentSet<'_>) -> Result<FieldValue> {
        let output = output_mode(args.params)?;
        let baseline = running_median(args.y, args.params.count("window_size")?)?;
        Ok(output.apply(args.y, baseline))
    }
}

/// `modpoly-baseline`
pub struct ModPolyBaseline;

impl SampleProcessor for ModPolyBaseline {
    fn name(&self) -> &str {
        "modpoly-baseline"
    }

    fn defaults(&self) -> ParamSet {
        ParamSet::new()
            .with("output", "removal")
            .with("polynomial_degree", 2_i64)
            .with("iterations", 100_i64)
            .with("gradient", 0.001)
    }

    fn default_configuration(&self) -> Configuration {
        Domain::Ftir.single()
    }

    fn process(&self, args: &ArgumentSet<'_>) -> Result<FieldValue> {
        let p = args.params;
        let output = output_mode(p)?;
        let baseline = modpoly_baseline(
            args.y,
            p.count("polynomial_degree")?,
            p.count("iterations")?,
            p.float("gradient")?,
        )?;
        Ok(output.apply(args.y, baseline))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn noisy_flat(len: usize, seed: u64) -> Vec<f64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..len).map(|_| 5.0 + rng.gen_range(-0.5..0.5)).collect()
    }

    #[test]
    fn als_baseline_sits_under_a_noisy_plateau() {
        let y = noisy_flat(200, 7);
        let baseline = als_baseline(&y, 1e5, 0.001, 10).unwrap();
        let mean_y = y.iter().sum::<f64>() / y.len() as f64;
        let mean_b = baseline.iter().sum::<f64>() / baseline.len() as f64;
        assert_eq!(baseline.len(), y.len());
        assert!(mean_b <= mean_y, "baseline {mean_b} above signal {mean_y}");
    }

    #[test]
    fn als_follows_a_straight_line() {
        // A line is in the null space of the penalty, so unit weights reproduce it.
        let y: Vec<f64> = (0..30).map(|i| 2.0 + 0.1 * i as f64).collect();
        let baseline = als_baseline(&y, 1000.0, 0.1, 1).unwrap();
        for (b, v) in baseline.iter().zip(&y) {
            assert_abs_diff_eq!(b, v, epsilon = 1e-8);
        }
    }

    #[test]
    fn als_rejects_short_or_bad_input() {
        assert!(als_baseline(&[1.0, 2.0], 1000.0, 0.1, 10).is_err());
        assert!(als_baseline(&[1.0; 5], 1000.0, 1.5, 10).is_err());
        assert!(als_baseline(&[1.0; 5], -1.0, 0.1, 10).is_err());
        assert!(als_baseline(&[1.0; 5], 1000.0, 0.1, 0).is_err());
    }

    #[test]
    fn modpoly_ignores_a_peak_on_a_quadratic() {
        let n = 101;
        let clean: Vec<f64> = (0..n)
            .map(|i| {
                let t = i as f64 / 100.0;
                1.0 + 0.5 * t + 0.2 * t * t
            })
            .collect();
        let mut y = clean.clone();
        for (i, v) in y.iter_mut().enumerate() {
            let d = (i as f64 - 50.0) / 3.0;
            *v += 4.0 * (-0.5 * d * d).exp();
        }
        let baseline = modpoly_baseline(&y, 2, 100, 0.001).unwrap();
        let worst = baseline
            .iter()
            .zip(&clean)
            .map(|(b, c)| (b - c).abs())
            .fold(0.0, f64::max);
        assert!(worst < 0.6, "max deviation {worst}");
    }

    #[test]
    fn modpoly_on_an_exact_polynomial_is_exact() {
        let y: Vec<f64> = (0..20).map(|i| 3.0 - 0.25 * i as f64).collect();
        let baseline = modpoly_baseline(&y, 1, 10, 0.001).unwrap();
        for (b, v) in baseline.iter().zip(&y) {
            assert_abs_diff_eq!(b, v, epsilon = 1e-9);
        }
    }

    #[test]
    fn modpoly_rejects_a_degree_the_sample_cannot_support() {
        let y = [1.0, 2.0, 3.0];
        assert!(matches!(
            modpoly_baseline(&y, 3, 10, 0.001),
            Err(PrepError::InvalidParameter { ref name, .. }) if name == "polynomial_degree"
        ));
        assert!(modpoly_baseline(&y, usize::MAX / 4, 10, 0.001).is_err());

        let params = ModPolyBaseline.defaults();
        let overrides = ParamSet::new().with("polynomial_degree", i64::MAX);
        let merged = params.merge_overrides(&overrides, "modpoly-baseline").unwrap();
        assert!(ModPolyBaseline.process(&ArgumentSet::new(&y, &merged)).is_err());
    }

    #[test]
    fn output_modes() {
        let y = [3.0, 4.0];
        let b = vec![1.0, 1.0];
        assert_eq!(
            BaselineOutput::Baseline.apply(&y, b.clone()),
            FieldValue::Series(vec![1.0, 1.0])
        );
        assert_eq!(
            BaselineOutput::Removal.apply(&y, b.clone()),
            FieldValue::Series(vec![2.0, 3.0])
        );
        assert_eq!(
            BaselineOutput::Both.apply(&y, b),
            FieldValue::Matrix(vec![vec![2.0, 3.0], vec![1.0, 1.0]])
        );
        assert!("sideways".parse::<BaselineOutput>().is_err());
    }

    #[test]
    fn median_baseline_removes_running_median() {
        let params = MedianBaseline.defaults();
        let y = [5.0, 1.0, 4.0, 2.0, 8.0];
        let out = MedianBaseline.process(&ArgumentSet::new(&y, &params)).unwrap();
        assert_eq!(out, FieldValue::Series(vec![0.0, -4.0, 0.0, 0.0, 4.0]));
    }
}

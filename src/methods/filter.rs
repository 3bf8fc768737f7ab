use std::collections::VecDeque;
use std::f64::consts::PI;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::config::{Configuration, Domain};
use crate::data::model::FieldValue;
use crate::data::params::{ArgumentSet, ParamSet};
use crate::error::{PrepError, Result};
use crate::pipeline::SampleProcessor;

use super::linalg::{falling_factorial, pseudo_inverse, vandermonde};

// ---------------------------------------------------------------------------
// Savitzky-Golay
// ---------------------------------------------------------------------------

/// Local polynomial least-squares smoothing.
///
/// Each interior point is replaced by the value (or `derivative`-th
/// derivative, per sample step) at the centre of a degree-`polyorder` fit over
/// `window` points. The first and last half-windows are evaluated on the fit
/// of the first and last full window.
pub fn savgol_filter(
    y: &[f64],
    window: usize,
    polyorder: usize,
    derivative: usize,
) -> Result<Vec<f64>> {
    if window % 2 == 0 {
        return Err(PrepError::invalid_parameter("window_size", format!("{window} is not odd")));
    }
    if polyorder >= window {
        return Err(PrepError::invalid_parameter(
            "polyorder",
            format!("{polyorder} must be less than window_size {window}"),
        ));
    }
    let n = y.len();
    if window > n {
        return Err(PrepError::invalid_parameter(
            "window_size",
            format!("{window} exceeds the sample length {n}"),
        ));
    }

    let half = window / 2;
    let scale = (half as f64).max(1.0);
    let u: Vec<f64> = (0..window).map(|t| (t as f64 - half as f64) / scale).collect();
    // Rows of `fit` turn window values into polynomial coefficients in `u`.
    let fit = pseudo_inverse(vandermonde(&u, polyorder))?;

    // Weights evaluating the derivative of the fitted polynomial at `u0`.
    let weights_at = |u0: f64| -> Vec<f64> {
        let basis: Vec<f64> = (0..=polyorder)
            .map(|i| {
                if i < derivative {
                    0.0
                } else {
                    falling_factorial(i, derivative) * u0.powi((i - derivative) as i32)
                }
            })
            .collect();
        let to_index_units = scale.powi(derivative as i32);
        (0..window)
            .map(|j| (0..=polyorder).map(|i| basis[i] * fit[(i, j)]).sum::<f64>() / to_index_units)
            .collect()
    };
    let dot = |weights: &[f64], start: usize| -> f64 {
        weights.iter().zip(&y[start..start + window]).map(|(w, v)| w * v).sum()
    };

    let mut out = vec![0.0; n];
    let centre = weights_at(0.0);
    for i in half..n - half {
        out[i] = dot(&centre, i - half);
    }
    for t in 0..half {
        out[t] = dot(&weights_at(u[t]), 0);
        out[n - window + half + 1 + t] = dot(&weights_at(u[half + 1 + t]), n - window);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Running median
// ---------------------------------------------------------------------------

/// Sliding-window median with a growing warm-up window.
///
/// While the first `window` items arrive the median of everything seen so far
/// is emitted (index `len / 2` of the sorted window), so the first half-window
/// is not centred. Afterwards the oldest item is evicted for each new one and
/// index `window / 2` is emitted.
pub fn running_median(y: &[f64], window: usize) -> Result<Vec<f64>> {
    if window == 0 {
        return Err(PrepError::invalid_parameter("window_size", "must be at least 1"));
    }

    // The window never holds more items than the sample has.
    let capacity = window.min(y.len());
    let mut fifo: VecDeque<f64> = VecDeque::with_capacity(capacity);
    let mut sorted: Vec<f64> = Vec::with_capacity(capacity);
    let mut out = Vec::with_capacity(y.len());

    let warm_up = window.min(y.len());
    for &item in &y[..warm_up] {
        fifo.push_back(item);
        insort(&mut sorted, item);
        out.push(sorted[fifo.len() / 2]);
    }

    let mid = window / 2;
    for &item in &y[warm_up..] {
        if let Some(old) = fifo.pop_front() {
            let pos = sorted.partition_point(|v| *v < old);
            sorted.remove(pos);
        }
        fifo.push_back(item);
        insort(&mut sorted, item);
        out.push(sorted[mid]);
    }
    Ok(out)
}

/// Insert after any equal items.
fn insort(sorted: &mut Vec<f64>, item: f64) {
    let pos = sorted.partition_point(|v| *v <= item);
    sorted.insert(pos, item);
}

// ---------------------------------------------------------------------------
// Fourier filter
// ---------------------------------------------------------------------------

/// Generalized Gaussian window `exp(-0.5 |n / sigma|^(2m))`, symmetric about
/// the centre of `len` points.
fn general_gaussian(len: usize, m: f64, sigma: f64) -> Vec<f64> {
    let centre = (len as f64 - 1.0) / 2.0;
    (0..len)
        .map(|i| (-0.5 * ((i as f64 - centre) / sigma).abs().powf(2.0 * m)).exp())
        .collect()
}

/// Circular shift: item `i` moves to `(i + shift) mod len`.
fn roll<T: Copy>(values: &[T], shift: isize) -> Vec<T> {
    let len = values.len() as isize;
    if len == 0 {
        return Vec::new();
    }
    let mut out = values.to_vec();
    for (i, v) in values.iter().enumerate() {
        out[(i as isize + shift).rem_euclid(len) as usize] = *v;
    }
    out
}

/// Frequency-domain smoothing of a mirror-extended sample.
///
/// The sample is followed by its reverse, transformed, multiplied by a
/// generalized Gaussian centred on zero frequency and transformed back; the
/// first half is returned. With `derivative` set the spectrum is weighted by
/// `-(angular frequency)²` under a window of half the width instead.
pub fn fourier_filter(y: &[f64], sigma: f64, m: f64, derivative: bool) -> Result<Vec<f64>> {
    if y.is_empty() {
        return Err(PrepError::invalid_parameter("y", "sample is empty"));
    }
    if sigma.is_nan() || sigma <= 0.0 {
        return Err(PrepError::invalid_parameter("sigma", format!("{sigma} must be positive")));
    }
    if m < 0.0 {
        return Err(PrepError::invalid_parameter("m", format!("{m} must not be negative")));
    }

    let len = y.len();
    let n = 2 * len;
    let half = (n / 2) as isize;

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut spectrum: Vec<Complex<f64>> = y
        .iter()
        .chain(y.iter().rev())
        .map(|&v| Complex::new(v, 0.0))
        .collect();
    forward.process(&mut spectrum);

    let (mut filtered, window) = if derivative {
        let angular: Vec<f64> = (0..n)
            .map(|k| 2.0 * PI * (k as f64 - len as f64) / n as f64)
            .collect();
        let centred = roll(&spectrum, -half);
        let weighted: Vec<Complex<f64>> = centred
            .iter()
            .zip(&angular)
            .map(|(c, q)| *c * -(q * q))
            .collect();
        (roll(&weighted, half), roll(&general_gaussian(n, m, 0.5 * sigma), half))
    } else {
        (spectrum, roll(&general_gaussian(n, m, sigma), half))
    };

    for (c, w) in filtered.iter_mut().zip(&window) {
        *c *= *w;
    }
    inverse.process(&mut filtered);

    let norm = n as f64;
    Ok(filtered[..len].iter().map(|c| c.re / norm).collect())
}

// ---------------------------------------------------------------------------
// Processors
// ---------------------------------------------------------------------------

/// `savgol`: Savitzky-Golay smoothing or differentiation.
pub struct SavitzkyGolay;

impl SampleProcessor for SavitzkyGolay {
    fn name(&self) -> &str {
        "savgol"
    }

    fn defaults(&self) -> ParamSet {
        ParamSet::new()
            .with("window_size", 151_i64)
            .with("polyorder", 5_i64)
            .with("derivative", 0_i64)
    }

    fn default_configuration(&self) -> Configuration {
        Domain::Ftir.single()
    }

    fn process(&self, args: &ArgumentSet<'_>) -> Result<FieldValue> {
        let p = args.params;
        savgol_filter(
            args.y,
            p.count("window_size")?,
            p.count("polyorder")?,
            p.count("derivative")?,
        )
        .map(FieldValue::Series)
    }
}

/// `running-median`: sliding-window median filter.
pub struct RunningMedian;

impl SampleProcessor for RunningMedian {
    fn name(&self) -> &str {
        "running-median"
    }

    fn defaults(&self) -> ParamSet {
        ParamSet::new().with("window_size", 3_i64)
    }

    fn default_configuration(&self) -> Configuration {
        Domain::Ftir.single()
    }

    fn process(&self, args: &ArgumentSet<'_>) -> Result<FieldValue> {
        running_median(args.y, args.params.count("window_size")?).map(FieldValue::Series)
    }
}

/// `fourier`: generalized-Gaussian low-pass in the frequency domain.
pub struct FourierFilter;

impl SampleProcessor for FourierFilter {
    fn name(&self) -> &str {
        "fourier"
    }

    fn defaults(&self) -> ParamSet {
        ParamSet::new()
            .with("sigma", 40_i64)
            .with("m", 1_i64)
            .with("derivative", false)
    }

    fn default_configuration(&self) -> Configuration {
        Domain::Ftir.single()
    }

    fn process(&self, args: &ArgumentSet<'_>) -> Result<FieldValue> {
        let p = args.params;
        fourier_filter(args.y, p.float("sigma")?, p.float("m")?, p.flag("derivative")?)
            .map(FieldValue::Series)
    }
}

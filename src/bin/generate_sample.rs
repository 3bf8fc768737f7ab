use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rusty_prep::{Dataset, FoldRecord};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

/// Peaks on a sloped baseline, plus noise.
fn generate_spectrum(
    wavenumbers: &[f64],
    peaks: &[(f64, f64, f64)],
    slope: f64,
    offset: f64,
    noise_level: f64,
    rng: &mut StdRng,
) -> Vec<f64> {
    wavenumbers
        .iter()
        .map(|&wn| {
            let signal: f64 = peaks
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(wn, mu, sigma, amp))
                .sum();
            let baseline = offset + slope * (4000.0 - wn) / 2000.0;
            signal + baseline + gauss(rng, 0.0, noise_level)
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = StdRng::seed_from_u64(42);

    // Wavenumbers: 4000 → 2002, step 2
    let wavenumbers: Vec<f64> = (0..1000).map(|i| 4000.0 - i as f64 * 2.0).collect();

    let fold_peaks: Vec<(&str, Vec<(f64, f64, f64)>)> = vec![
        ("fold0", vec![(3400.0, 80.0, 0.8), (2900.0, 40.0, 0.5), (2350.0, 30.0, 0.3)]),
        ("fold1", vec![(3200.0, 60.0, 0.6), (2800.0, 50.0, 0.7), (2500.0, 35.0, 0.4)]),
        ("fold2", vec![(3600.0, 70.0, 0.9), (3000.0, 45.0, 0.4), (2200.0, 25.0, 0.5)]),
    ];
    let concentrations = [0.5, 1.0, 2.0, 5.0];

    let mut dataset = Dataset::with_capacity(fold_peaks.len());
    for (name, peaks_base) in &fold_peaks {
        let spectra: Vec<Vec<f64>> = concentrations
            .iter()
            .map(|&conc| {
                let peaks: Vec<(f64, f64, f64)> = peaks_base
                    .iter()
                    .map(|&(mu, sigma, amp)| (mu, sigma, amp * conc))
                    .collect();
                let slope = rng.gen_range(0.05..0.3);
                let offset = rng.gen_range(0.0..0.2);
                generate_spectrum(&wavenumbers, &peaks, slope, offset, 0.005 * conc, &mut rng)
            })
            .collect();

        dataset.insert(
            *name,
            FoldRecord::new()
                .with("spectra", spectra)
                .with("axis_wavenumber", wavenumbers.clone()),
        );
    }

    let output_path = std::env::args().nth(1).unwrap_or_else(|| "sample_data.json".to_string());
    let file = File::create(&output_path).with_context(|| format!("creating {output_path}"))?;
    serde_json::to_writer(BufWriter::new(file), &dataset).context("writing dataset")?;

    println!(
        "Wrote {} folds of {} spectra ({} wavenumbers each) to {output_path}",
        dataset.len(),
        concentrations.len(),
        wavenumbers.len()
    );
    Ok(())
}

use anyhow::{Context, Result};

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Absorbance on a sloped, slightly curved background.
fn generate_spectrum(
    wavenumbers: &[f64],
    bands: &[(f64, f64, f64)],
    noise_level: f64,
    rng: &mut SimpleRng,
) -> Vec<f64> {
    wavenumbers
        .iter()
        .map(|&wn| {
            let signal: f64 = bands
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(wn, mu, sigma, amp))
                .sum();
            let t = (wn - 400.0) / 3600.0;
            let background = 0.05 + 0.08 * t + 0.03 * t * t;
            signal + background + rng.gauss(0.0, noise_level)
        })
        .collect()
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_spectrum.csv".to_string());

    let mut rng = SimpleRng::new(42);

    // Wavenumbers: 4000 → 400, step 2 (instrument export order)
    let wavenumbers: Vec<f64> = (0..=1800).map(|i| 4000.0 - i as f64 * 2.0).collect();

    // (centre, width, absorbance)
    let bands = [
        (3400.0, 120.0, 0.45), // O-H stretch, broad
        (2920.0, 18.0, 0.60),  // C-H asymmetric stretch
        (2850.0, 14.0, 0.40),  // C-H symmetric stretch
        (1720.0, 12.0, 0.85),  // C=O stretch
        (1640.0, 20.0, 0.30),  // C=C / amide
        (1460.0, 15.0, 0.35),  // CH2 bend
        (1240.0, 25.0, 0.50),  // C-O stretch
        (1050.0, 30.0, 0.70),  // C-O-C
        (720.0, 10.0, 0.20),   // CH2 rock
    ];

    let absorbance = generate_spectrum(&wavenumbers, &bands, 0.004, &mut rng);

    let mut writer = csv::Writer::from_path(&output_path)
        .with_context(|| format!("creating {output_path}"))?;
    writer.write_record(["wavenumber", "absorbance"])?;
    for (wn, a) in wavenumbers.iter().zip(&absorbance) {
        writer.write_record([format!("{wn:.1}"), format!("{a:.6}")])?;
    }
    writer.flush().context("flushing sample CSV")?;

    println!(
        "Wrote {} samples ({} bands) to {output_path}",
        wavenumbers.len(),
        bands.len()
    );
    Ok(())
}

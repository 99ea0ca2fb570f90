//! Gaussian test bunch used by the setup binary and the benches.
use crate::phase_space::PhaseSpaceDescription;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BunchParams {
    pub num_particles: usize,
    /// Defaults to `num_particles`.
    pub capacity: Option<usize>,
    pub sigma_x: f64,
    pub sigma_px: f64,
    pub sigma_y: f64,
    pub sigma_py: f64,
    pub sigma_zeta: f64,
    pub sigma_delta: f64,
    /// Fixed seed for reproducible bunches.
    pub seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct Reference {
    pub p0c: f64,
    pub mass0: f64,
    #[serde(default = "unit_charge")]
    pub q0: f64,
}

fn unit_charge() -> f64 {
    1.0
}

fn gaussian<R: Rng>(rng: &mut R, n: usize, sigma: f64) -> Vec<f64> {
    (0..n)
        .map(|_| {
            let r: f64 = rng.sample(StandardNormal);
            r * sigma
        })
        .collect()
}

fn sample<R: Rng>(rng: &mut R, params: &BunchParams, reference: &Reference) -> PhaseSpaceDescription {
    let n = params.num_particles;
    PhaseSpaceDescription::new(reference.p0c, reference.mass0, reference.q0)
        .x(gaussian(rng, n, params.sigma_x))
        .px(gaussian(rng, n, params.sigma_px))
        .y(gaussian(rng, n, params.sigma_y))
        .py(gaussian(rng, n, params.sigma_py))
        .zeta(gaussian(rng, n, params.sigma_zeta))
        .delta(gaussian(rng, n, params.sigma_delta))
}

/// Uncorrelated Gaussian distribution in all six coordinates.
pub fn gaussian_bunch(params: &BunchParams, reference: &Reference) -> PhaseSpaceDescription {
    match params.seed {
        Some(seed) => sample(&mut ChaCha8Rng::seed_from_u64(seed), params, reference),
        None => sample(&mut thread_rng(), params, reference),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase_space::PhaseSpace;

    fn params(seed: Option<u64>) -> BunchParams {
        BunchParams {
            num_particles: 500,
            capacity: None,
            sigma_x: 1e-3,
            sigma_px: 1e-6,
            sigma_y: 2e-3,
            sigma_py: 1e-6,
            sigma_zeta: 0.1,
            sigma_delta: 1e-4,
            seed,
        }
    }

    const REF: Reference = Reference {
        p0c: 7e12,
        mass0: 938.272_088_16e6,
        q0: 1.0,
    };

    #[test]
    fn seeded_bunch_is_reproducible() {
        let a = gaussian_bunch(&params(Some(42)), &REF);
        let b = gaussian_bunch(&params(Some(42)), &REF);
        let c = gaussian_bunch(&params(Some(43)), &REF);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn spread_follows_sigma() {
        let f = gaussian_bunch(&params(Some(7)), &REF).to_field_values().unwrap();
        let y: Vec<f64> = f.get("y").unwrap().cast().unwrap();
        assert_eq!(y.len(), 500);
        let rms = (y.iter().map(|v| v * v).sum::<f64>() / y.len() as f64).sqrt();
        assert!(rms > 1.5e-3 && rms < 2.5e-3);
    }
}

#![allow(dead_code)]

use beam_prtls::{BunchParams, Context, FieldValues, PhaseSpaceDescription, Prtls, Reference, PMASS};

pub const LHC: Reference = Reference {
    p0c: 7e12,
    mass0: PMASS,
    q0: 1.0,
};

pub fn bunch_params(num_particles: usize, seed: u64) -> BunchParams {
    // small reproducible bunch for testing
    BunchParams {
        num_particles,
        capacity: None,
        sigma_x: 1e-3,
        sigma_px: 1e-6,
        sigma_y: 1e-3,
        sigma_py: 1e-6,
        sigma_zeta: 0.075,
        sigma_delta: 1.1e-4,
        seed: Some(seed),
    }
}

pub fn setup_bunch(context: Context, capacity: usize, num_particles: usize, seed: u64) -> Prtls {
    let description = beam_prtls::gaussian_bunch(&bunch_params(num_particles, seed), &LHC);
    Prtls::create_from_phase_space(context, Some(capacity), &description).unwrap()
}

/// `num_alive` alive protons followed by `num_lost` lost ones.
pub fn setup_with_states(capacity: usize, num_alive: usize, num_lost: usize) -> Prtls {
    let n = num_alive + num_lost;
    if n == 0 {
        let values = FieldValues::new()
            .with("q0", LHC.q0)
            .with("mass0", LHC.mass0)
            .with("state", Vec::<i64>::new());
        return Prtls::create_from_fields(Context::Cpu, Some(capacity), &values).unwrap();
    }
    let state: Vec<i64> = (0..n).map(|i| if i < num_alive { 1 } else { 0 }).collect();
    let x: Vec<f64> = (0..n).map(|i| i as f64 * 1e-4).collect();
    let description = PhaseSpaceDescription::new(LHC.p0c, LHC.mass0, LHC.q0)
        .x(x)
        .state(state);
    Prtls::create_from_phase_space(Context::Cpu, Some(capacity), &description).unwrap()
}

//! Relativistic longitudinal kinematics for a single particle.
//!
//! These are the only formulas that write `delta`, `psigma`, `rvv` and
//! `rpp`. The ensemble methods and `LocalParticle` both go through them,
//! so per-particle and whole-ensemble updates agree bit for bit. None of
//! the square roots are taken of `1 - beta`, which would cancel for
//! ultra-relativistic particles.
//!
//! Nothing here validates its inputs: `delta <= -1` gives non-finite
//! results that propagate to the caller.

/// The four dependent longitudinal variables of one particle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Longitudinal {
    pub delta: f64,
    pub psigma: f64,
    pub rvv: f64,
    pub rpp: f64,
}

/// Reference energy, beta and gamma for a reference momentum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reference {
    pub energy0: f64,
    pub beta0: f64,
    pub gamma0: f64,
}

#[inline(always)]
pub fn energy0(p0c: f64, mass0: f64) -> f64 {
    (p0c * p0c + mass0 * mass0).sqrt()
}

#[inline(always)]
pub fn reference(p0c: f64, mass0: f64) -> Reference {
    let energy0 = energy0(p0c, mass0);
    Reference {
        energy0,
        beta0: p0c / energy0,
        gamma0: energy0 / mass0,
    }
}

/// Consistent longitudinal state for a new `delta`.
#[inline(always)]
pub fn from_delta(new_delta: f64, beta0: f64) -> Longitudinal {
    let delta_beta0 = new_delta * beta0;
    let ptau_beta0 = (delta_beta0 * delta_beta0 + 2. * delta_beta0 * beta0 + 1.).sqrt() - 1.;
    let one_plus_delta = 1. + new_delta;
    Longitudinal {
        delta: new_delta,
        rvv: one_plus_delta / (1. + ptau_beta0),
        rpp: 1. / one_plus_delta,
        psigma: ptau_beta0 / (beta0 * beta0),
    }
}

/// Longitudinal state after adding `delta_energy` [eV] to a particle
/// whose current momentum deviation is `delta`.
#[inline(always)]
pub fn with_added_energy(delta: f64, beta0: f64, energy0: f64, delta_energy: f64) -> Longitudinal {
    let delta_beta0 = delta * beta0;
    let ptau_beta0 = delta_energy / energy0
        + (delta_beta0 * delta_beta0 + 2.0 * delta_beta0 * beta0 + 1.).sqrt()
        - 1.;

    let ptau = ptau_beta0 / beta0;
    let psigma = ptau / beta0;
    let delta = (ptau * ptau + 2. * psigma + 1.).sqrt() - 1.;
    let one_plus_delta = delta + 1.;

    Longitudinal {
        delta,
        psigma,
        rvv: one_plus_delta / (1. + ptau_beta0),
        rpp: 1. / one_plus_delta,
    }
}

/// `delta` relative to `new_p0c` for a particle keeping its total
/// momentum `p0c * (1 + delta)`.
#[inline(always)]
pub fn rebased_delta(old_p0c: f64, old_delta: f64, new_p0c: f64) -> f64 {
    let ppc = old_p0c * old_delta + old_p0c;
    (ppc - new_p0c) / new_p0c
}

#[inline(always)]
pub fn ptau(delta: f64, beta0: f64) -> f64 {
    (delta * delta + 2. * delta + 1. / (beta0 * beta0)).sqrt() - 1. / beta0
}

/// Total energy [eV].
#[inline(always)]
pub fn energy(energy0: f64, psigma: f64, p0c: f64, beta0: f64) -> f64 {
    energy0 + psigma * p0c * beta0
}

/// `delta` for a given `ptau`, the inverse of [`ptau`].
#[inline(always)]
pub fn delta_from_ptau(ptau: f64, beta0: f64) -> f64 {
    (ptau * ptau + 2. * ptau / beta0 + 1.).sqrt() - 1.
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const PMASS: f64 = 938.272_088_16e6;

    #[test]
    fn reference_of_lhc_proton() {
        let r = reference(7e12, PMASS);
        assert!((r.energy0 - energy0(7e12, PMASS)).abs() < 1e-3);
        assert!(r.beta0 < 1.0 && r.beta0 > 0.999_999_99);
        assert!((r.gamma0 - r.energy0 / PMASS).abs() < 1e-9);
    }

    #[test]
    fn zero_delta_is_on_reference() {
        let l = from_delta(0.0, 0.7);
        assert_eq!(l.psigma, 0.0);
        assert_eq!(l.rvv, 1.0);
        assert_eq!(l.rpp, 1.0);
    }

    #[test]
    fn added_energy_shows_up_in_energy() {
        let r = reference(7e12, PMASS);
        let l = with_added_energy(0.0, r.beta0, r.energy0, 1e9);
        let e = energy(r.energy0, l.psigma, 7e12, r.beta0);
        assert!(((e - r.energy0) - 1e9).abs() / 1e9 < 1e-6);
    }

    #[test]
    fn rebased_delta_keeps_total_momentum() {
        let d = rebased_delta(1e9, 1e-3, 2e9);
        assert!(((1.0 + d) * 2e9 - (1.0 + 1e-3) * 1e9).abs() < 1e-3);
    }

    #[test]
    fn invalid_delta_is_not_masked() {
        let l = from_delta(-1.0, 0.5);
        assert!(!l.rpp.is_finite());
    }

    proptest! {
        #[test]
        fn delta_round_trips_and_stays_consistent(
            delta in -0.99f64..10.0,
            beta0 in 0.01f64..0.999_999,
        ) {
            let l = from_delta(delta, beta0);
            prop_assert_eq!(l.delta, delta);
            prop_assert!((l.rpp * (1.0 + delta) - 1.0).abs() < 1e-12);
            // rvv = (1 + delta) / (1 + ptau * beta0)
            let pt = ptau(delta, beta0);
            prop_assert!((l.rvv * (1.0 + pt * beta0) - (1.0 + delta)).abs() < 1e-9 * (1.0 + delta));
        }

        #[test]
        fn ptau_and_psigma_agree(
            delta in -0.5f64..2.0,
            beta0 in 0.05f64..0.999,
        ) {
            let l = from_delta(delta, beta0);
            let pt = ptau(delta, beta0);
            prop_assert!((l.psigma * beta0 - pt).abs() < 1e-9 * (1.0 + pt.abs()));
            prop_assert!((delta_from_ptau(pt, beta0) - delta).abs() < 1e-9);
        }
    }
}

mod common;

use beam_prtls::prtls::schema::{BETA0, DELTA, PSIGMA, RPP, RVV, STATE, X, ZETA};
use beam_prtls::{Context, PrtlError, LAST_INVALID_STATE, UNKNOWN_COUNT};
use proptest::prelude::*;

#[test]
fn bunch_fills_capacity_prefix() {
    let p = common::setup_bunch(Context::Cpu, 150, 100, 3);
    assert_eq!(p.capacity(), 150);
    assert_eq!(p.num_active(), 100);
    assert_eq!(p.num_lost(), 0);
    assert!(p.get(STATE)[100..].iter().all(|&s| s == LAST_INVALID_STATE));
    assert_eq!(p.active_particle_id_range(), Some((0, 100)));
}

#[test]
fn longitudinal_fields_are_consistent_after_construction() {
    let p = common::setup_bunch(Context::Cpu, 50, 50, 11);
    let ptau = p.ptau();
    for i in 0..50 {
        let delta = p.get(DELTA)[i];
        assert!((p.get(RPP)[i] * (1.0 + delta) - 1.0).abs() < 1e-14);
        let beta0 = p.get(BETA0)[i];
        assert!((p.get(RVV)[i] * (1.0 + ptau[i] * beta0) - (1.0 + delta)).abs() < 1e-12);
        assert!((p.get(PSIGMA)[i] * beta0 - ptau[i]).abs() < 1e-12);
    }
}

#[test]
fn energy_follows_added_energy() {
    let mut p = common::setup_bunch(Context::Cpu, 64, 64, 5);
    let before = p.energy();
    p.add_to_energy(&[3e8]).unwrap();
    for (e_new, e_old) in p.energy().iter().zip(&before) {
        assert!(((e_new - e_old) - 3e8).abs() / 3e8 < 1e-5);
    }
}

#[test]
fn per_slot_energy_changes() {
    let mut p = common::setup_bunch(Context::Cpu, 4, 4, 5);
    let zeta = p.get(ZETA).to_vec();
    let rvv = p.get(RVV).to_vec();
    p.add_to_energy(&[0.0, 1e9, -1e9, 2e9]).unwrap();
    for i in 0..4 {
        let expected = zeta[i] * p.get(RVV)[i] / rvv[i];
        assert!((p.get(ZETA)[i] - expected).abs() <= 1e-12 * expected.abs());
    }
}

#[test]
fn set_reference_keeps_delta() {
    let mut p = common::setup_bunch(Context::Cpu, 8, 8, 9);
    let delta = p.get(DELTA).to_vec();
    p.set_reference(450e9, common::LHC.mass0, 1.0).unwrap();
    assert_eq!(p.get(DELTA), &delta[..]);
    assert!(p.energy0().iter().all(|&e0| e0 < 451e9));
}

#[test]
fn set_particle_overwrites_one_slot() {
    let mut p = common::setup_bunch(Context::Cpu, 8, 8, 9);
    let single = beam_prtls::PhaseSpaceDescription::new(7e12, common::LHC.mass0, 1.0)
        .x(vec![4e-3])
        .delta(vec![1e-3]);
    p.set_particle(3, &single).unwrap();
    assert_eq!(p.get(X)[3], 4e-3);
    assert_eq!(p.get(DELTA)[3], 1e-3);
    assert!((p.get(RPP)[3] - 1.0 / 1.001).abs() < 1e-15);
    assert!(matches!(
        p.set_particle(8, &single),
        Err(PrtlError::Configuration(_))
    ));
}

#[test]
fn compaction_after_losses() {
    let mut p = common::setup_bunch(Context::Cpu, 10, 10, 2);
    let x = p.get(X).to_vec();
    {
        let state = p.get_mut(STATE);
        state[1] = 0;
        state[4] = -2;
        state[7] = LAST_INVALID_STATE;
    }
    assert_eq!(p.reorganize().unwrap(), (7, 2));
    assert_eq!(p.get(X)[..3], [x[0], x[2], x[3]]);
    assert_eq!(p.get(X)[7..9], [x[1], x[4]]);
    assert_eq!(p.get(STATE)[9], LAST_INVALID_STATE);

    p.hide_lost_particles().unwrap();
    assert_eq!(p.get(X).len(), 7);
    assert_eq!(p.to_field_values().get("x").unwrap().len(), 7);
}

#[test]
fn gpu_like_backends_report_unknown_counts() {
    let mut p = common::setup_bunch(Context::Cuda, 10, 8, 2);
    assert_eq!(p.num_active(), UNKNOWN_COUNT);
    assert_eq!(p.reorganize().unwrap(), (8, 0));
    assert_eq!(p.num_active(), UNKNOWN_COUNT);
    assert!(matches!(
        p.hide_lost_particles(),
        Err(PrtlError::NotSupported(_))
    ));
}

proptest! {
    #[test]
    fn update_delta_round_trips(delta in -0.5f64..2.0, seed in 0u64..1000) {
        let mut p = common::setup_bunch(Context::Cpu, 6, 6, seed);
        p.update_delta(&[delta]).unwrap();
        for (&d, &rpp) in p.get(DELTA).iter().zip(p.get(RPP)) {
            prop_assert_eq!(d, delta);
            prop_assert!((rpp * (1.0 + d) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn update_p0c_there_and_back(factor in 0.5f64..2.0) {
        let mut p = common::setup_bunch(Context::Cpu, 6, 6, 17);
        let reference = p.to_field_values();
        p.update_p0c(&[7e12 * factor]).unwrap();
        p.update_p0c(&[7e12]).unwrap();
        let again = p.to_field_values();
        for name in ["delta", "px", "py", "rpp", "rvv"].iter() {
            let a: Vec<f64> = reference.get(name).unwrap().cast().unwrap();
            let b: Vec<f64> = again.get(name).unwrap().cast().unwrap();
            for (x, y) in a.iter().zip(&b) {
                prop_assert!((x - y).abs() <= 1e-13 + 1e-9 * x.abs());
            }
        }
    }
}

//! Single-particle access for tracking kernels.
//!
//! [`LocalParticle`] is the Rust side of the interface that
//! [`codegen`] emits as C. Both are built from the same field schema and
//! honor the same [`FreezePolicy`], so a kernel sees the same behavior
//! whichever side it runs on.
use crate::error::{PrtlError, Result};
use crate::prtls::kinematics;
use crate::prtls::schema::{
    var_index, FieldValue, Var, BETA0, DELTA, GAMMA0, P0C, PER_PARTICLE_VARS, PSIGMA, PX, PY,
    RPP, RVV, ZETA,
};
use crate::prtls::Prtls;
use std::ops::{AddAssign, MulAssign};

pub mod codegen;

/// How the mutators of one field behave.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpVariant {
    Normal,
    /// The mutator exists and can be called but changes nothing.
    Inert,
}

/// Per-field mutator behavior, indexed like the schema.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FreezePolicy {
    variants: Vec<OpVariant>,
}

impl FreezePolicy {
    /// Freezes the named fields. Every name has to be a per-particle
    /// field.
    pub fn new<S: AsRef<str>>(frozen: &[S]) -> Result<FreezePolicy> {
        let mut variants = vec![OpVariant::Normal; PER_PARTICLE_VARS.len()];
        for name in frozen {
            let name = name.as_ref();
            let i = var_index(name).ok_or_else(|| {
                PrtlError::config(format!("cannot freeze '{}': not a particle field", name))
            })?;
            variants[i] = OpVariant::Inert;
        }
        Ok(FreezePolicy { variants })
    }

    pub fn none() -> FreezePolicy {
        FreezePolicy {
            variants: vec![OpVariant::Normal; PER_PARTICLE_VARS.len()],
        }
    }

    pub fn variant(&self, index: usize) -> OpVariant {
        self.variants[index]
    }

    pub fn is_frozen(&self, name: &str) -> bool {
        var_index(name).map_or(false, |i| self.variants[i] == OpVariant::Inert)
    }
}

impl Default for FreezePolicy {
    fn default() -> Self {
        FreezePolicy::none()
    }
}

/// One particle of an ensemble, selected by `ipart`.
pub struct LocalParticle<'a> {
    prtls: &'a mut Prtls,
    policy: &'a FreezePolicy,
    ipart: usize,
}

impl<'a> LocalParticle<'a> {
    pub fn new(prtls: &'a mut Prtls, policy: &'a FreezePolicy, ipart: usize) -> LocalParticle<'a> {
        let mut part = LocalParticle {
            prtls,
            policy,
            ipart: 0,
        };
        part.set_ipart(ipart);
        part
    }

    pub fn ipart(&self) -> usize {
        self.ipart
    }

    pub fn set_ipart(&mut self, ipart: usize) {
        if !cfg!(feature = "unchecked") {
            assert!(ipart < self.prtls.capacity());
        }
        self.ipart = ipart;
    }

    pub fn capacity(&self) -> i64 {
        self.prtls.capacity() as i64
    }

    pub fn num_active(&self) -> i64 {
        self.prtls.num_active()
    }

    pub fn num_lost(&self) -> i64 {
        self.prtls.num_lost()
    }

    pub fn q0(&self) -> f64 {
        self.prtls.q0()
    }

    pub fn mass0(&self) -> f64 {
        self.prtls.mass0()
    }

    #[inline(always)]
    fn inert<T, A>(&self, var: Var<T, A>) -> bool {
        self.policy.variant(var.index()) == OpVariant::Inert
    }

    #[inline(always)]
    pub fn get<T: FieldValue, A>(&self, var: Var<T, A>) -> T {
        let col = self.prtls.column(var);
        // ipart is checked against capacity in set_ipart
        unsafe { *col.get_unchecked(self.ipart) }
    }

    #[inline(always)]
    fn slot_mut<T: FieldValue, A>(&mut self, var: Var<T, A>) -> &mut T {
        let ipart = self.ipart;
        let col = self.prtls.column_mut(var);
        unsafe { col.get_unchecked_mut(ipart) }
    }

    /// Writes any field, dependent ones included. The caller keeps the
    /// longitudinal fields consistent.
    #[inline(always)]
    pub fn set<T: FieldValue, A>(&mut self, var: Var<T, A>, value: T) {
        if !self.inert(var) {
            *self.slot_mut(var) = value;
        }
    }

    #[inline(always)]
    pub fn add_to<T: FieldValue + AddAssign, A>(&mut self, var: Var<T, A>, value: T) {
        if !self.inert(var) {
            *self.slot_mut(var) += value;
        }
    }

    #[inline(always)]
    pub fn scale<T: FieldValue + MulAssign, A>(&mut self, var: Var<T, A>, value: T) {
        if !self.inert(var) {
            *self.slot_mut(var) *= value;
        }
    }

    /// Swaps every field of slots `i1` and `i2`. Not for use while other
    /// kernels run on the same ensemble.
    pub fn exchange(&mut self, i1: usize, i2: usize) {
        if !cfg!(feature = "unchecked") {
            assert!(i1 < self.prtls.capacity() && i2 < self.prtls.capacity());
        }
        self.prtls.swap_slots(i1, i2);
    }

    /// Writes this particle into slot `id` of `dest`. With `set_scalar`
    /// the reference and counters are copied as well.
    pub fn to_prtls(&self, dest: &mut Prtls, id: usize, set_scalar: bool) {
        if !cfg!(feature = "unchecked") {
            assert!(id < dest.capacity());
        }
        if set_scalar {
            dest.set_scalars(self.q0(), self.mass0(), self.num_active(), self.num_lost());
        }
        dest.copy_slot_from(id, &*self.prtls, self.ipart);
    }

    pub fn get_energy0(&self) -> f64 {
        kinematics::energy0(self.get(P0C), self.mass0())
    }

    pub fn add_to_energy(&mut self, delta_energy: f64) {
        let l = kinematics::with_added_energy(
            self.get(DELTA),
            self.get(BETA0),
            self.get_energy0(),
            delta_energy,
        );
        self.set(DELTA, l.delta);
        self.set(PSIGMA, l.psigma);
        let old_rvv = self.get(RVV);
        self.scale(ZETA, l.rvv / old_rvv);
        self.set(RVV, l.rvv);
        self.set(RPP, l.rpp);
    }

    pub fn update_delta(&mut self, new_delta: f64) {
        let l = kinematics::from_delta(new_delta, self.get(BETA0));
        self.set(DELTA, l.delta);
        self.set(RVV, l.rvv);
        self.set(RPP, l.rpp);
        self.set(PSIGMA, l.psigma);
    }

    pub fn update_p0c(&mut self, new_p0c: f64) {
        let old_p0c = self.get(P0C);
        let new_delta = kinematics::rebased_delta(old_p0c, self.get(DELTA), new_p0c);
        let r = kinematics::reference(new_p0c, self.mass0());

        self.set(P0C, new_p0c);
        self.set(GAMMA0, r.gamma0);
        self.set(BETA0, r.beta0);
        self.update_delta(new_delta);
        self.scale(PX, old_p0c / new_p0c);
        self.scale(PY, old_p0c / new_p0c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::prtls::schema::{FieldValues, PARTICLE_ID, STATE, X};
    use crate::prtls::UNKNOWN_COUNT;
    use crate::{build_test_prtls, E_TOL};

    #[test]
    fn unknown_frozen_name_is_rejected() {
        assert!(matches!(
            FreezePolicy::new(&["x", "not_a_field"]),
            Err(PrtlError::Configuration(_))
        ));
        let policy = FreezePolicy::new(&["x", "delta"]).unwrap();
        assert!(policy.is_frozen("delta"));
        assert!(!policy.is_frozen("y"));
    }

    #[test]
    fn frozen_mutators_do_nothing() {
        let mut p = build_test_prtls();
        let policy = FreezePolicy::new(&["x"]).unwrap();
        let before = p.get(X)[1];
        {
            let mut part = LocalParticle::new(&mut p, &policy, 1);
            part.set(X, 5.0);
            part.add_to(X, 1.0);
            part.scale(X, 3.0);
            part.add_to(STATE, -1);
            assert_eq!(part.get(X), before);
        }
        assert_eq!(p.get(X)[1], before);
        assert_eq!(p.get(STATE)[1], 0);
    }

    #[test]
    fn single_particle_kinematics_match_ensemble() {
        let mut a = build_test_prtls();
        let mut b = build_test_prtls();
        let policy = FreezePolicy::none();
        for i in 0..a.capacity() {
            let mut part = LocalParticle::new(&mut a, &policy, i);
            part.add_to_energy(2e8);
            part.update_p0c(7.1e12);
        }
        b.add_to_energy(&[2e8]).unwrap();
        b.update_p0c(&[7.1e12]).unwrap();
        assert!(a.compare(&b, E_TOL, 0.0));
    }

    #[test]
    fn exchange_swaps_whole_slots() {
        let values = FieldValues::new().with("x", vec![1.0, 2.0]);
        let mut p = Prtls::create_from_fields(Context::Cpu, None, &values).unwrap();
        let policy = FreezePolicy::none();
        LocalParticle::new(&mut p, &policy, 0).exchange(0, 1);
        assert_eq!(p.get(X), &[2.0, 1.0]);
        assert_eq!(p.get(PARTICLE_ID), &[1, 0]);
    }

    #[test]
    fn to_prtls_copies_slot_and_scalars() {
        let mut src = build_test_prtls();
        let mut dest = Prtls::create_from_fields(Context::Cpu, Some(2), &FieldValues::new()).unwrap();
        let policy = FreezePolicy::none();
        let part = LocalParticle::new(&mut src, &policy, 2);
        part.to_prtls(&mut dest, 1, true);
        assert_eq!(dest.get(X)[1], part.get(X));
        assert_eq!(dest.q0(), part.q0());
        assert_eq!(dest.num_active(), UNKNOWN_COUNT);
    }

    #[test]
    fn to_prtls_keeps_counters_that_fit() {
        let mut src = build_test_prtls();
        let mut dest = Prtls::create_from_fields(Context::Cpu, Some(8), &FieldValues::new()).unwrap();
        let policy = FreezePolicy::none();
        let part = LocalParticle::new(&mut src, &policy, 0);
        part.to_prtls(&mut dest, 0, true);
        assert_eq!(dest.num_active(), 4);
        dest.hide_lost_particles().unwrap();
        assert_eq!(dest.get(X).len(), 4);
    }
}

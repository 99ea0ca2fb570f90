use super::kinematics::{self, Longitudinal};
use super::schema::{
    Derived, FieldValue, Var, BETA0, DELTA, GAMMA0, P0C, PSIGMA, PX, PY, RPP, RVV, STATE, ZETA,
};
use super::{bcast, Prtls};
use crate::error::{PrtlError, Result};
use crate::PRTL_CHUNK_SIZE;
use itertools::izip;
use rayon::prelude::*;

type Pick = fn(&Longitudinal) -> f64;

fn longitudinal_fields() -> [(Var<f64, Derived>, Pick); 4] {
    [
        (DELTA, |l| l.delta),
        (PSIGMA, |l| l.psigma),
        (RVV, |l| l.rvv),
        (RPP, |l| l.rpp),
    ]
}

impl Prtls {
    fn check_arg(&self, op: &str, values: &[f64]) -> Result<()> {
        if values.len() == 1 || values.len() == self.capacity {
            Ok(())
        } else {
            Err(PrtlError::config(format!(
                "{} takes 1 or {} values, got {}",
                op,
                self.capacity,
                values.len()
            )))
        }
    }

    /// True for slots that hold a particle, alive or lost.
    fn valid_mask(&self) -> Vec<bool> {
        let invalid = i64::invalid();
        self.column(STATE).iter().map(|&s| s != invalid).collect()
    }

    fn write_longitudinal(&mut self, updates: &[Option<Longitudinal>]) {
        for &(var, pick) in longitudinal_fields().iter() {
            for (v, u) in self.column_mut(var).iter_mut().zip(updates) {
                if let Some(l) = u {
                    *v = pick(l);
                }
            }
        }
    }

    pub(crate) fn write_longitudinal_at(&mut self, i: usize, l: Longitudinal) {
        for &(var, pick) in longitudinal_fields().iter() {
            self.column_mut(var)[i] = pick(&l);
        }
    }

    /// Sets `p0c` and derives `gamma0` and `beta0` from it. The
    /// longitudinal fields are not touched.
    pub fn set_p0c(&mut self, p0c: &[f64]) -> Result<()> {
        self.check_arg("set_p0c", p0c)?;
        let valid = self.valid_mask();
        let mass0 = self.mass0;
        for (i, &ok) in valid.iter().enumerate() {
            if !ok {
                continue;
            }
            let new_p0c = bcast(p0c, i);
            let r = kinematics::reference(new_p0c, mass0);
            self.column_mut(P0C)[i] = new_p0c;
            self.column_mut(GAMMA0)[i] = r.gamma0;
            self.column_mut(BETA0)[i] = r.beta0;
        }
        Ok(())
    }

    /// Sets `delta` and the three fields that depend on it. `zeta` is
    /// left alone.
    pub fn update_delta(&mut self, new_delta: &[f64]) -> Result<()> {
        self.check_arg("update_delta", new_delta)?;
        let valid = self.valid_mask();
        let updates: Vec<Option<Longitudinal>> = (&valid, self.column(BETA0))
            .into_par_iter()
            .enumerate()
            .map(|(i, (&ok, &beta0))| {
                if ok {
                    Some(kinematics::from_delta(bcast(new_delta, i), beta0))
                } else {
                    None
                }
            })
            .collect();
        self.write_longitudinal(&updates);
        Ok(())
    }

    /// Adds `delta_energy` [eV] to every valid particle. `zeta` is
    /// rescaled by the change in `rvv`.
    pub fn add_to_energy(&mut self, delta_energy: &[f64]) -> Result<()> {
        self.check_arg("add_to_energy", delta_energy)?;
        let valid = self.valid_mask();
        let mass0 = self.mass0;
        let mut updates: Vec<Option<Longitudinal>> = vec![None; self.capacity];
        let mut zeta_scale: Vec<f64> = vec![1.0; self.capacity];
        (
            &valid,
            self.column(DELTA),
            self.column(BETA0),
            self.column(P0C),
            self.column(RVV),
            &mut updates,
            &mut zeta_scale,
        )
            .into_par_iter()
            .enumerate()
            .chunks(PRTL_CHUNK_SIZE)
            .for_each(|o| {
                o.into_iter()
                    .for_each(|(i, (&ok, &delta, &beta0, &p0c, &old_rvv, upd, scale))| {
                        if ok {
                            let energy0 = kinematics::energy0(p0c, mass0);
                            let l = kinematics::with_added_energy(
                                delta,
                                beta0,
                                energy0,
                                bcast(delta_energy, i),
                            );
                            *scale = l.rvv / old_rvv;
                            *upd = Some(l);
                        }
                    })
            });
        for (zeta, &scale) in self.column_mut(ZETA).iter_mut().zip(&zeta_scale) {
            *zeta *= scale;
        }
        self.write_longitudinal(&updates);
        Ok(())
    }

    /// Changes the reference momentum while keeping each particle's total
    /// momentum. `px` and `py` follow the new `p0c`.
    pub fn update_p0c(&mut self, new_p0c: &[f64]) -> Result<()> {
        self.check_arg("update_p0c", new_p0c)?;
        let valid = self.valid_mask();
        let mass0 = self.mass0;
        let mut updates: Vec<Option<Longitudinal>> = vec![None; self.capacity];
        for (i, (&ok, &old_p0c, &old_delta, upd)) in
            izip!(&valid, self.column(P0C), self.column(DELTA), &mut updates).enumerate()
        {
            if ok {
                let new_delta = kinematics::rebased_delta(old_p0c, old_delta, bcast(new_p0c, i));
                let beta0 = kinematics::reference(bcast(new_p0c, i), mass0).beta0;
                *upd = Some(kinematics::from_delta(new_delta, beta0));
            }
        }

        let ratio: Vec<f64> = izip!(&valid, self.column(P0C))
            .enumerate()
            .map(|(i, (&ok, &old))| if ok { old / bcast(new_p0c, i) } else { 1.0 })
            .collect();
        self.set_p0c(new_p0c)?;
        self.write_longitudinal(&updates);
        for var in [PX, PY].iter() {
            for (p, &r) in self.column_mut(*var).iter_mut().zip(&ratio) {
                *p *= r;
            }
        }
        Ok(())
    }

    /// Relative energy deviation of every visible slot.
    pub fn ptau(&self) -> Vec<f64> {
        self.get(DELTA)
            .iter()
            .zip(self.get(BETA0))
            .map(|(&delta, &beta0)| kinematics::ptau(delta, beta0))
            .collect()
    }

    /// Reference energy [eV] of every visible slot.
    pub fn energy0(&self) -> Vec<f64> {
        let mass0 = self.mass0;
        self.get(P0C)
            .iter()
            .map(|&p0c| kinematics::energy0(p0c, mass0))
            .collect()
    }

    /// Total energy [eV] of every visible slot.
    pub fn energy(&self) -> Vec<f64> {
        let mass0 = self.mass0;
        izip!(self.get(P0C), self.get(BETA0), self.get(PSIGMA))
            .map(|(&p0c, &beta0, &psigma)| {
                kinematics::energy(kinematics::energy0(p0c, mass0), psigma, p0c, beta0)
            })
            .collect()
    }
}

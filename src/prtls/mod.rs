//! The particle ensemble: a fixed number of slots stored column by column.
use crate::context::Context;
use crate::error::{PrtlError, Result};
use crate::phase_space::PhaseSpace;
use std::ops::{Deref, DerefMut};
use tracing::info;

pub mod kinematics;
mod merge;
mod reorganize;
mod rng;
pub mod schema;
mod update;

use schema::{
    var_index, Column, FieldValue, FieldValues, Var, VarDef, VarType, CHARGE_RATIO, CHI,
    DELTA, GAMMA0, BETA0, P0C, PARTICLE_ID, PER_PARTICLE_VARS, STATE, WEIGHT,
};

/// Value of `num_active`/`num_lost` when the backend does not keep them.
pub const UNKNOWN_COUNT: i64 = -1;

#[inline(always)]
pub(crate) fn bcast<T: Copy>(v: &[T], i: usize) -> T {
    if v.len() == 1 {
        v[0]
    } else {
        v[i]
    }
}

/// Same closeness test as `numpy.isclose`.
#[inline(always)]
pub(crate) fn isclose(a: f64, b: f64, rtol: f64, atol: f64) -> bool {
    (a - b).abs() <= atol + rtol * b.abs()
}

/// An ensemble of particles.
///
/// Every per-particle field is one column of length `capacity`; slot `i`
/// of every column describes the same particle. The four longitudinal
/// fields `delta`, `psigma`, `rvv`, `rpp` are only written by the
/// kinematics methods so they always agree with each other.
pub struct Prtls {
    context: Context,
    capacity: usize,
    num_active: i64,
    num_lost: i64,
    q0: f64,
    mass0: f64,
    columns: Vec<Column>,
    lost_hidden: bool,
}

#[derive(Clone, Copy, PartialEq)]
enum Source {
    Fields,
    PhaseSpace,
}

fn default_column(index: usize, n: usize, src: Source) -> Column {
    if index == PARTICLE_ID.index() {
        return Column::from((0..n as i64).collect::<Vec<i64>>());
    }
    let one = index == CHI.index()
        || index == CHARGE_RATIO.index()
        || index == STATE.index()
        || (index == WEIGHT.index() && src == Source::PhaseSpace);
    let value = if one { 1.0 } else { 0.0 };
    match PER_PARTICLE_VARS[index].ty {
        VarType::F64 => Column::filled(value, n),
        VarType::I64 => Column::filled(value as i64, n),
        VarType::U32 => Column::filled(value as u32, n),
    }
}

fn prepare<T: FieldValue>(name: &str, col: &Column, n: usize) -> Result<Column> {
    let vals: Vec<T> = col.cast().ok_or_else(|| {
        PrtlError::config(format!(
            "values of '{}' do not fit {:?}",
            name,
            T::TYPE
        ))
    })?;
    if vals.len() == 1 && n != 1 {
        Ok(Column::filled(vals[0], n))
    } else if vals.len() == n {
        Ok(T::wrap(vals))
    } else {
        Err(PrtlError::config(format!(
            "'{}' has {} values, expected 1 or {}",
            name,
            vals.len(),
            n
        )))
    }
}

fn prepare_column(def: &VarDef, col: &Column, n: usize) -> Result<Column> {
    match def.ty {
        VarType::F64 => prepare::<f64>(def.name, col, n),
        VarType::I64 => prepare::<i64>(def.name, col, n),
        VarType::U32 => prepare::<u32>(def.name, col, n),
    }
}

fn lookup(name: &str) -> Result<usize> {
    var_index(name)
        .ok_or_else(|| PrtlError::config(format!("'{}' is not a particle field", name)))
}

/// The single value of a scalar field given as an array. Every entry has
/// to agree with the first one.
fn uniform_scalar(values: &FieldValues, name: &str, default: Option<f64>) -> Result<f64> {
    let col = match (values.get(name), default) {
        (Some(col), _) => col,
        (None, Some(d)) => return Ok(d),
        (None, None) => return Err(PrtlError::config(format!("'{}' is required", name))),
    };
    let vals: Vec<f64> = col
        .cast()
        .ok_or_else(|| PrtlError::config(format!("'{}' is not numeric", name)))?;
    let first = *vals
        .first()
        .ok_or_else(|| PrtlError::config(format!("'{}' is empty", name)))?;
    if !vals.iter().all(|&v| isclose(v, first, 1e-10, 1e-14)) {
        return Err(PrtlError::config(format!(
            "'{}' must be the same for all particles",
            name
        )));
    }
    Ok(first)
}

/// Checks every supplied column against the schema and brings it to
/// length `n`, filling in defaults for the rest. Nothing is allocated at
/// full capacity before all inputs validate.
fn build_columns(supplied: &[(usize, &Column)], n: usize, src: Source) -> Result<Vec<Column>> {
    let mut columns: Vec<Option<Column>> = vec![None; PER_PARTICLE_VARS.len()];
    for &(index, col) in supplied {
        if index == PARTICLE_ID.index() && col.len() == 1 && n > 1 {
            return Err(PrtlError::config(format!(
                "a single 'particle_id' cannot be shared by {} particles",
                n
            )));
        }
        columns[index] = Some(prepare_column(&PER_PARTICLE_VARS[index], col, n)?);
    }
    Ok(columns
        .into_iter()
        .enumerate()
        .map(|(index, col)| col.unwrap_or_else(|| default_column(index, n, src)))
        .collect())
}

fn checked_capacity(capacity: Option<usize>, n: usize) -> Result<usize> {
    match capacity {
        Some(c) if c < n => Err(PrtlError::config(format!(
            "capacity {} is smaller than the {} particles supplied",
            c, n
        ))),
        Some(c) => Ok(c),
        None => Ok(n),
    }
}

impl Prtls {
    fn allocate(
        context: Context,
        capacity: usize,
        q0: f64,
        mass0: f64,
        columns: Vec<Column>,
    ) -> Prtls {
        Prtls {
            context,
            capacity,
            num_active: UNKNOWN_COUNT,
            num_lost: UNKNOWN_COUNT,
            q0,
            mass0,
            columns: columns.into_iter().map(|c| c.padded(capacity)).collect(),
            lost_hidden: false,
        }
    }

    /// Counters are unknown until compaction; backends that keep counts
    /// start out compacted.
    fn finish(&mut self) -> Result<()> {
        self.num_active = UNKNOWN_COUNT;
        self.num_lost = UNKNOWN_COUNT;
        let caps = self.context.capabilities();
        if caps.has_exact_counts && caps.supports_masking {
            self.reorganize()?;
        }
        Ok(())
    }

    /// Builds an ensemble from raw field values.
    ///
    /// The longest supplied array sets the number of populated slots and
    /// values of length 1 are broadcast over them. Without any per-particle
    /// field, every slot of `capacity` (default 1) is populated. Slots
    /// beyond the populated ones are left invalid. The longitudinal fields
    /// are taken as given.
    pub fn create_from_fields(
        context: Context,
        capacity: Option<usize>,
        values: &FieldValues,
    ) -> Result<Prtls> {
        let mut q0 = 0.0;
        let mut mass0 = 0.0;
        let mut supplied = Vec::new();
        for (name, col) in values.iter() {
            match name {
                "q0" | "mass0" => {
                    let v: Vec<f64> = col
                        .cast()
                        .ok_or_else(|| PrtlError::config(format!("'{}' is not numeric", name)))?;
                    if v.len() != 1 {
                        return Err(PrtlError::config(format!(
                            "'{}' takes a single value, got {}",
                            name,
                            v.len()
                        )));
                    }
                    if name == "q0" {
                        q0 = v[0];
                    } else {
                        mass0 = v[0];
                    }
                }
                _ => supplied.push((lookup(name)?, col)),
            }
        }

        let longest = supplied.iter().map(|(_, c)| c.len()).max();
        let n = match longest {
            Some(l) => l,
            None => capacity.unwrap_or(1),
        };
        let capacity = checked_capacity(capacity, n)?;
        let columns = build_columns(&supplied, n, Source::Fields)?;

        let mut prtls = Prtls::allocate(context, capacity, q0, mass0, columns);
        prtls.finish()?;
        info!(capacity, populated = n, "ensemble created from fields");
        Ok(prtls)
    }

    /// Builds an ensemble from a phase-space description and derives the
    /// reference and longitudinal fields from `p0c`, `mass0` and `delta`.
    pub fn create_from_phase_space<P: PhaseSpace + ?Sized>(
        context: Context,
        capacity: Option<usize>,
        description: &P,
    ) -> Result<Prtls> {
        let values = description.to_field_values()?;
        let lens: Vec<usize> = values.iter().map(|(_, c)| c.len()).collect();
        let n = lens.iter().copied().max().unwrap_or(1);
        if lens.iter().any(|&l| l != 1 && l != n) {
            return Err(PrtlError::config(format!(
                "field lengths {:?} cannot be broadcast to {}",
                lens, n
            )));
        }

        let q0 = uniform_scalar(&values, "q0", Some(1.0))?;
        let mass0 = uniform_scalar(&values, "mass0", None)?;
        if !values.contains(P0C.name()) {
            return Err(PrtlError::config("'p0c' is required"));
        }
        let mut supplied = Vec::new();
        for (name, col) in values.iter() {
            if name != "q0" && name != "mass0" {
                supplied.push((lookup(name)?, col));
            }
        }
        let capacity = checked_capacity(capacity, n)?;
        let columns = build_columns(&supplied, n, Source::PhaseSpace)?;

        let mut prtls = Prtls::allocate(context, capacity, q0, mass0, columns);
        let p0c = prtls.column(P0C).to_vec();
        prtls.set_p0c(&p0c)?;
        let delta = prtls.column(DELTA).to_vec();
        prtls.update_delta(&delta)?;
        prtls.finish()?;
        info!(capacity, populated = n, "ensemble created from phase space");
        Ok(prtls)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of alive particles, or [`UNKNOWN_COUNT`].
    pub fn num_active(&self) -> i64 {
        self.num_active
    }

    /// Number of lost but valid particles, or [`UNKNOWN_COUNT`].
    pub fn num_lost(&self) -> i64 {
        self.num_lost
    }

    pub fn context(&self) -> Context {
        self.context
    }

    pub fn q0(&self) -> f64 {
        self.q0
    }

    pub fn mass0(&self) -> f64 {
        self.mass0
    }

    fn visible_len(&self) -> usize {
        if self.lost_hidden && self.num_active >= 0 {
            (self.num_active as usize).min(self.capacity)
        } else {
            self.capacity
        }
    }

    /// Values of one field. Only the alive prefix while lost particles
    /// are hidden.
    pub fn get<T: FieldValue, A>(&self, var: Var<T, A>) -> &[T] {
        let len = self.visible_len();
        &self.column(var)[..len]
    }

    /// Mutable values of a field that is not derived.
    pub fn get_mut<T: FieldValue>(&mut self, var: Var<T>) -> &mut [T] {
        let len = self.visible_len();
        &mut self.column_mut(var)[..len]
    }

    #[inline(always)]
    pub(crate) fn column<T: FieldValue, A>(&self, var: Var<T, A>) -> &[T] {
        T::slice(&self.columns[var.index()])
    }

    #[inline(always)]
    pub(crate) fn column_mut<T: FieldValue, A>(&mut self, var: Var<T, A>) -> &mut [T] {
        T::vec_mut(&mut self.columns[var.index()])
    }

    /// Counters that do not fit this ensemble's capacity become unknown.
    pub(crate) fn set_scalars(&mut self, q0: f64, mass0: f64, num_active: i64, num_lost: i64) {
        self.q0 = q0;
        self.mass0 = mass0;
        let fits =
            num_active >= 0 && num_lost >= 0 && num_active + num_lost <= self.capacity as i64;
        if fits {
            self.num_active = num_active;
            self.num_lost = num_lost;
        } else {
            self.num_active = UNKNOWN_COUNT;
            self.num_lost = UNKNOWN_COUNT;
        }
    }

    /// Swaps every per-particle field between two slots.
    pub(crate) fn swap_slots(&mut self, i1: usize, i2: usize) {
        for col in self.columns.iter_mut() {
            col.swap(i1, i2);
        }
    }

    /// Copies every per-particle field of `src[i_src]` into slot `dst`.
    pub(crate) fn copy_slot_from(&mut self, dst: usize, src: &Prtls, i_src: usize) {
        for (to, from) in self.columns.iter_mut().zip(src.columns.iter()) {
            to.copy_from(dst, from, i_src);
        }
    }

    /// Restricts field access to the alive prefix until
    /// [`unhide_lost_particles`](Prtls::unhide_lost_particles).
    pub fn hide_lost_particles(&mut self) -> Result<()> {
        if !self.context.capabilities().has_exact_counts {
            return Err(PrtlError::unsupported(format!(
                "hiding lost particles needs exact counts, not kept on {:?}",
                self.context
            )));
        }
        self.lost_hidden = true;
        Ok(())
    }

    pub fn unhide_lost_particles(&mut self) {
        self.lost_hidden = false;
    }

    pub fn lost_particles_are_hidden(&self) -> bool {
        self.lost_hidden
    }

    /// Full-capacity access for the lifetime of the returned guard. The
    /// previous view comes back when the guard is dropped, including
    /// during unwinding.
    pub fn unhidden(&mut self) -> UnhiddenView<'_> {
        let restore = self.lost_hidden;
        self.lost_hidden = false;
        UnhiddenView {
            prtls: self,
            restore,
        }
    }

    /// Sets the reference of every valid slot. `delta` is kept and the
    /// other longitudinal fields follow the new `beta0`.
    pub fn set_reference(&mut self, p0c: f64, mass0: f64, q0: f64) -> Result<()> {
        self.q0 = q0;
        self.mass0 = mass0;
        self.set_p0c(&[p0c])?;
        let delta = self.column(DELTA).to_vec();
        self.update_delta(&delta)
    }

    /// Overwrites slot `index` with a single-particle description.
    ///
    /// Fields the description leaves out get their defaults, except the
    /// particle id and the random generator state, which are kept.
    pub fn set_particle<P: PhaseSpace + ?Sized>(&mut self, index: usize, description: &P) -> Result<()> {
        if index >= self.capacity {
            return Err(PrtlError::config(format!(
                "slot {} is outside capacity {}",
                index, self.capacity
            )));
        }
        let values = description.to_field_values()?;
        if let Some((name, col)) = values.iter().find(|(_, c)| c.len() != 1) {
            return Err(PrtlError::config(format!(
                "set_particle takes one particle, '{}' has {} values",
                name,
                col.len()
            )));
        }
        let q0 = uniform_scalar(&values, "q0", Some(self.q0))?;
        let mass0 = uniform_scalar(&values, "mass0", Some(self.mass0))?;
        let mut supplied: Vec<Option<Column>> = vec![None; PER_PARTICLE_VARS.len()];
        for (name, col) in values.iter() {
            if name != "q0" && name != "mass0" {
                let i = lookup(name)?;
                supplied[i] = Some(prepare_column(&PER_PARTICLE_VARS[i], col, 1)?);
            }
        }

        self.q0 = q0;
        self.mass0 = mass0;
        for (i, (def, col)) in PER_PARTICLE_VARS.iter().zip(supplied).enumerate() {
            let col = match col {
                Some(c) => c,
                None if i == PARTICLE_ID.index() || def.name.starts_with("__") => continue,
                None => default_column(i, 1, Source::PhaseSpace),
            };
            self.columns[i].copy_from(index, &col, 0);
        }

        let r = kinematics::reference(self.column(P0C)[index], mass0);
        self.column_mut(GAMMA0)[index] = r.gamma0;
        self.column_mut(BETA0)[index] = r.beta0;
        let l = kinematics::from_delta(self.column(DELTA)[index], r.beta0);
        self.write_longitudinal_at(index, l);
        Ok(())
    }

    /// `(min, max + 1)` of the ids of alive particles.
    pub fn active_particle_id_range(&self) -> Option<(i64, i64)> {
        let ids = self
            .column(STATE)
            .iter()
            .zip(self.column(PARTICLE_ID))
            .filter(|(&s, _)| s > 0)
            .map(|(_, &id)| id);
        ids.fold(None, |acc, id| match acc {
            None => Some((id, id + 1)),
            Some((lo, hi)) => Some((lo.min(id), hi.max(id + 1))),
        })
    }

    /// True if every scalar and per-particle field of `other` is close to
    /// this ensemble's. Integer fields must match exactly.
    pub fn compare(&self, other: &Prtls, rtol: f64, atol: f64) -> bool {
        if self.capacity != other.capacity
            || self.num_active != other.num_active
            || self.num_lost != other.num_lost
        {
            return false;
        }
        if !isclose(self.q0, other.q0, rtol, atol) || !isclose(self.mass0, other.mass0, rtol, atol) {
            return false;
        }
        self.columns
            .iter()
            .zip(other.columns.iter())
            .all(|(a, b)| match (a, b) {
                (Column::F64(a), Column::F64(b)) => a
                    .iter()
                    .zip(b.iter())
                    .all(|(&x, &y)| isclose(x, y, rtol, atol)),
                _ => a == b,
            })
    }

    /// Every field by name, dependent longitudinal fields included.
    pub fn to_field_values(&self) -> FieldValues {
        let len = self.visible_len();
        let mut out = FieldValues::new()
            .with("q0", self.q0)
            .with("mass0", self.mass0);
        for (def, col) in PER_PARTICLE_VARS.iter().zip(self.columns.iter()) {
            out.insert(def.name, col.truncated(len));
        }
        out
    }
}

/// Scoped full-capacity view, see [`Prtls::unhidden`].
pub struct UnhiddenView<'a> {
    prtls: &'a mut Prtls,
    restore: bool,
}

impl<'a> Deref for UnhiddenView<'a> {
    type Target = Prtls;

    fn deref(&self) -> &Prtls {
        self.prtls
    }
}

impl<'a> DerefMut for UnhiddenView<'a> {
    fn deref_mut(&mut self) -> &mut Prtls {
        self.prtls
    }
}

impl<'a> Drop for UnhiddenView<'a> {
    fn drop(&mut self) {
        if self.restore {
            self.prtls.lost_hidden = true;
        }
    }
}

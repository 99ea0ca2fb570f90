use super::schema::{Column, FieldValue, LAST_INVALID_STATE, STATE};
use super::Prtls;
use crate::error::{PrtlError, Result};
use rayon::prelude::*;
use tracing::debug;

#[inline(always)]
fn is_alive(state: i64) -> bool {
    state > 0
}

#[inline(always)]
fn is_lost(state: i64) -> bool {
    state <= 0 && state > LAST_INVALID_STATE
}

/// Moves `v[order[k]]` to `v[k]` and fills the rest with the sentinel.
fn gather<T: FieldValue>(v: &mut Vec<T>, order: &[usize]) {
    let mut out: Vec<T> = order.iter().map(|&i| v[i]).collect();
    out.resize(v.len(), T::invalid());
    *v = out;
}

impl Prtls {
    /// `(alive, lost)` as seen from `state`, without moving anything.
    pub(crate) fn count_partition(&self) -> (usize, usize) {
        self.column(STATE).iter().fold((0, 0), |(a, l), &s| {
            if is_alive(s) {
                (a + 1, l)
            } else if is_lost(s) {
                (a, l + 1)
            } else {
                (a, l)
            }
        })
    }

    /// Compacts the ensemble: alive particles first, then lost ones, then
    /// invalid slots. Order within each group is kept.
    ///
    /// Returns `(num_active, num_lost)`. The stored counters are only
    /// updated on backends that keep exact counts.
    pub fn reorganize(&mut self) -> Result<(usize, usize)> {
        if !self.context.capabilities().supports_masking {
            return Err(PrtlError::unsupported(format!(
                "reorganize needs masking, which {:?} does not support",
                self.context
            )));
        }
        let mut view = self.unhidden();
        Ok(view.partition())
    }

    fn partition(&mut self) -> (usize, usize) {
        let (order, n_active, n_lost) = {
            let state = self.column(STATE);
            let alive = state.iter().enumerate().filter(|(_, &s)| is_alive(s));
            let lost = state.iter().enumerate().filter(|(_, &s)| is_lost(s));
            let order: Vec<usize> = alive.chain(lost).map(|(i, _)| i).collect();
            let n_active = state.iter().filter(|&&s| is_alive(s)).count();
            let n_lost = order.len() - n_active;
            (order, n_active, n_lost)
        };

        self.columns.par_iter_mut().for_each(|col| match col {
            Column::F64(v) => gather(v, &order),
            Column::I64(v) => gather(v, &order),
            Column::U32(v) => gather(v, &order),
        });

        if self.context.capabilities().has_exact_counts {
            self.num_active = n_active as i64;
            self.num_lost = n_lost as i64;
        }
        debug!(
            n_active,
            n_lost,
            capacity = self.capacity,
            "ensemble reorganized"
        );
        (n_active, n_lost)
    }
}

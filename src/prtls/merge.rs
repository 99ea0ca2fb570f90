use super::schema::{PARTICLE_ID, STATE};
use super::{isclose, Prtls};
use crate::error::{PrtlError, Result};
use tracing::info;

const SCALAR_RTOL: f64 = 1e-14;
const SCALAR_ATOL: f64 = 1e-14;

impl Prtls {
    /// Appends the alive particles of `donor` after this ensemble's valid
    /// ones and gives them fresh, contiguous particle ids above the current
    /// maximum. The donor is not modified.
    ///
    /// Capacity, backend support and the scalar reference are checked
    /// first, so a rejected merge leaves both ensembles as they were.
    pub fn add_particles(&mut self, donor: &Prtls, keep_lost: bool) -> Result<()> {
        if keep_lost {
            return Err(PrtlError::unsupported("merging lost particles"));
        }
        for p in [&*self, donor].iter() {
            if !p.context.capabilities().supports_masking {
                return Err(PrtlError::unsupported(format!(
                    "merging needs masking, which {:?} does not support",
                    p.context
                )));
            }
        }

        let donor_alive: Vec<usize> = donor
            .column(STATE)
            .iter()
            .enumerate()
            .filter(|(_, &s)| s > 0)
            .map(|(i, _)| i)
            .collect();
        let (n_active, n_lost) = self.count_partition();
        let free = self.capacity - n_active - n_lost;
        if donor_alive.len() > free {
            return Err(PrtlError::CapacityExceeded {
                needed: donor_alive.len(),
                free,
            });
        }
        if !isclose(donor.q0, self.q0, SCALAR_RTOL, SCALAR_ATOL)
            || !isclose(donor.mass0, self.mass0, SCALAR_RTOL, SCALAR_ATOL)
        {
            return Err(PrtlError::config(format!(
                "reference mismatch: q0 {} vs {}, mass0 {} vs {}",
                self.q0, donor.q0, self.mass0, donor.mass0
            )));
        }
        if donor_alive.is_empty() {
            return Ok(());
        }

        let mut view = self.unhidden();
        let (n_active, n_lost) = view.reorganize()?;
        let n_valid = n_active + n_lost;
        let max_id = view.column(PARTICLE_ID)[..n_valid]
            .iter()
            .copied()
            .max()
            .unwrap_or(-1);

        for (k, &i_src) in donor_alive.iter().enumerate() {
            let dst = n_valid + k;
            view.copy_slot_from(dst, donor, i_src);
            view.column_mut(PARTICLE_ID)[dst] = max_id + 1 + k as i64;
        }
        view.reorganize()?;
        info!(
            added = donor_alive.len(),
            first_id = max_id + 1,
            "particles merged"
        );
        Ok(())
    }
}

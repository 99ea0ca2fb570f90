use super::schema::{RNG_S1, RNG_S2, RNG_S3, RNG_S4};
use super::Prtls;
use crate::error::{PrtlError, Result};
use num_traits::ToPrimitive;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::info;

/// Lower bounds of the first three state words of a combined Tausworthe
/// generator. Smaller values make the generator degenerate.
const MIN_STATE: [u32; 3] = [2, 8, 16];

/// Four generator state words derived from one seed. Same seed, same
/// words, on every backend.
pub fn init_rng_state(seed: u32) -> [u32; 4] {
    let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
    let mut state = [0u32; 4];
    for (k, s) in state.iter_mut().enumerate() {
        *s = loop {
            let v = rng.next_u32();
            if k >= MIN_STATE.len() || v >= MIN_STATE[k] {
                break v;
            }
        };
    }
    state
}

impl Prtls {
    /// Seeds every slot's generator from `thread_rng`, one seed in
    /// `[1, 4e9)` per slot.
    pub fn init_rng(&mut self) {
        let mut rng = thread_rng();
        let seeds: Vec<u32> = (0..self.capacity)
            .map(|_| rng.gen_range(1..4_000_000_000u32))
            .collect();
        self.write_rng_states(&seeds);
    }

    /// Seeds every slot's generator from an explicit seed. Needs exactly
    /// one seed per slot; seeds are taken modulo 2^32.
    pub fn init_rng_with_seeds<T: ToPrimitive + Copy>(&mut self, seeds: &[T]) -> Result<()> {
        if seeds.len() != self.capacity {
            return Err(PrtlError::config(format!(
                "{} seeds given for capacity {}",
                seeds.len(),
                self.capacity
            )));
        }
        let seeds: Vec<u32> = seeds
            .iter()
            .map(|s| {
                s.to_i128()
                    .map(|v| v as u32)
                    .ok_or_else(|| PrtlError::config("seed is not an integer"))
            })
            .collect::<Result<_>>()?;
        self.write_rng_states(&seeds);
        Ok(())
    }

    fn write_rng_states(&mut self, seeds: &[u32]) {
        let states: Vec<[u32; 4]> = seeds.par_iter().map(|&s| init_rng_state(s)).collect();
        for (k, var) in [RNG_S1, RNG_S2, RNG_S3, RNG_S4].iter().enumerate() {
            for (dst, st) in self.column_mut(*var).iter_mut().zip(&states) {
                *dst = st[k];
            }
        }
        info!(n_init = seeds.len(), "random generators seeded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::prtls::schema::FieldValues;

    fn prtls(n: usize) -> Prtls {
        Prtls::create_from_fields(Context::Cpu, Some(n), &FieldValues::new()).unwrap()
    }

    #[test]
    fn same_seed_same_state() {
        let mut a = prtls(3);
        let mut b = prtls(3);
        a.init_rng_with_seeds(&[1u32, 2, 3]).unwrap();
        b.init_rng_with_seeds(&[1i64, 2, 3]).unwrap();
        assert!(a.compare(&b, 0.0, 0.0));
        assert_ne!(a.get(RNG_S1)[0], a.get(RNG_S1)[1]);
    }

    #[test]
    fn seeds_wrap_to_u32() {
        let mut a = prtls(1);
        let mut b = prtls(1);
        a.init_rng_with_seeds(&[(1i64 << 32) + 5]).unwrap();
        b.init_rng_with_seeds(&[5u32]).unwrap();
        assert_eq!(a.get(RNG_S3), b.get(RNG_S3));
    }

    #[test]
    fn seed_count_must_match_capacity() {
        let mut p = prtls(3);
        assert!(matches!(
            p.init_rng_with_seeds(&[1u32]),
            Err(PrtlError::Configuration(_))
        ));
    }

    #[test]
    fn state_words_respect_lower_bounds() {
        for seed in 0..200u32 {
            let s = init_rng_state(seed);
            assert!(s[0] >= 2 && s[1] >= 8 && s[2] >= 16);
        }
    }

    #[test]
    fn default_seeding_fills_every_slot() {
        let mut p = prtls(8);
        p.init_rng();
        assert!(p.get(RNG_S1).iter().all(|&s| s >= 2));
    }
}

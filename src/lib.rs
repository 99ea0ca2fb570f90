use serde::Deserialize;
use std::fs;

use anyhow::{Context as _, Result};
use tracing::{info, warn};

pub mod bunch;
pub mod context;
pub mod error;
pub mod local_prtl;
pub mod phase_space;
pub mod prtls;

pub use crate::bunch::{gaussian_bunch, BunchParams, Reference};
pub use crate::context::{Capabilities, Context};
pub use crate::error::PrtlError;
pub use crate::local_prtl::codegen::{gen_local_particle_api, ApiMode};
pub use crate::local_prtl::{FreezePolicy, LocalParticle, OpVariant};
pub use crate::phase_space::{PhaseSpace, PhaseSpaceDescription};
pub use crate::prtls::schema::{FieldValues, LAST_INVALID_STATE};
pub use crate::prtls::{Prtls, UNKNOWN_COUNT};

/// Particles handed to one rayon task in the ensemble-wide kinematics.
pub const PRTL_CHUNK_SIZE: usize = 512;

/// Proton rest mass [eV].
pub const PMASS: f64 = 938.272_088_16e6;

#[derive(Deserialize)]
pub struct Config {
    #[serde(default)]
    pub context: Context,
    pub reference: Reference,
    pub bunch: BunchParams,
    pub api: Api,
}

#[derive(Deserialize)]
pub struct Api {
    #[serde(default)]
    pub mode: ApiMode,
    #[serde(default)]
    pub freeze_vars: Vec<String>,
    /// Where the generated C source is written.
    pub output: String,
}

impl Config {
    pub fn new() -> Result<Config> {
        let contents =
            fs::read_to_string("config.toml").context("Could not open the config.toml file")?;
        toml::from_str(&contents).with_context(|| "Could not parse Config file")
    }
}

/// Builds the configured bunch, seeds its generators and writes the
/// single-particle C interface.
pub fn run(cfg: Config) -> Result<()> {
    if cfg.bunch.num_particles == 0 {
        return Err(anyhow::Error::msg("bunch.num_particles must be positive"));
    }
    let policy = FreezePolicy::new(&cfg.api.freeze_vars[..])
        .context("Could not build the freeze policy")?;

    info!(
        context = ?cfg.context,
        num_particles = cfg.bunch.num_particles,
        "initializing prtls"
    );
    let description = gaussian_bunch(&cfg.bunch, &cfg.reference);
    let mut prtls = Prtls::create_from_phase_space(cfg.context, cfg.bunch.capacity, &description)
        .context("Could not create the particle ensemble")?;

    match cfg.bunch.seed {
        Some(seed) => {
            let seeds: Vec<u64> = (0..prtls.capacity() as u64).map(|i| seed.wrapping_add(i)).collect();
            prtls.init_rng_with_seeds(&seeds)?;
        }
        None => prtls.init_rng(),
    }

    if prtls.num_active() == UNKNOWN_COUNT {
        warn!(context = ?cfg.context, "particle counters are not kept on this backend");
    } else {
        info!(
            num_active = prtls.num_active(),
            num_lost = prtls.num_lost(),
            capacity = prtls.capacity(),
            "ensemble ready"
        );
    }

    let src = gen_local_particle_api(cfg.api.mode, &policy)
        .context("Could not generate the local particle api")?;
    fs::write(&cfg.api.output, &src)
        .with_context(|| format!("Could not write {}", cfg.api.output))?;
    info!(
        output = %cfg.api.output,
        frozen = cfg.api.freeze_vars.len(),
        bytes = src.len(),
        "local particle api written"
    );
    Ok(())
}

/// Four LHC protons, all alive, with distinct coordinates.
#[cfg(test)]
pub(crate) fn build_test_prtls() -> Prtls {
    let description = PhaseSpaceDescription::new(7e12, PMASS, 1.0)
        .x(vec![1e-3, -2e-3, 0.0, 5e-4])
        .px(vec![1e-6, 0.0, -3e-6, 2e-6])
        .y(vec![0.0, 1e-3, 2e-3, -1e-3])
        .zeta(vec![1e-2, -2e-2, 0.0, 3e-2])
        .delta(vec![0.0, 1e-4, -2e-4, 3e-4]);
    Prtls::create_from_phase_space(Context::Cpu, None, &description).unwrap()
}

#[cfg(test)]
pub(crate) const E_TOL: f64 = 1e-12;

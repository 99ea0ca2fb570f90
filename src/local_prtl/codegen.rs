//! C source for the single-particle interface used by compiled tracking
//! kernels.
//!
//! The text is a pure function of the field schema and the freeze
//! policy, so it has to be regenerated whenever either changes.
use super::{FreezePolicy, OpVariant};
use crate::error::{PrtlError, Result};
use crate::prtls::schema::{ScalarDef, VarDef, PER_PARTICLE_VARS, SCALAR_VARS, SIZE_VARS};
use serde::Deserialize;

/// How kernels reach particle data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiMode {
    /// Pointers into the ensemble's own arrays.
    NoLocalCopy,
    /// Per-kernel copies of the particle data.
    LocalCopy,
}

impl Default for ApiMode {
    fn default() -> Self {
        ApiMode::NoLocalCopy
    }
}

fn scalars() -> impl Iterator<Item = &'static ScalarDef> {
    SIZE_VARS.iter().chain(SCALAR_VARS.iter())
}

fn typedef() -> String {
    let mut lines = vec!["typedef struct{".to_string()];
    for s in scalars() {
        lines.push(format!("                 {}  {};", s.ty.c_type(), s.name));
    }
    for v in PER_PARTICLE_VARS {
        lines.push(format!("    /*gpuglmem*/ {}* {};", v.ty.c_type(), v.name));
    }
    lines.push("                 int64_t ipart;".to_string());
    lines.push("}LocalParticle;".to_string());
    lines.join("\n")
}

/// One mutator per field. Frozen fields keep the function but lose the
/// body.
fn mutators(policy: &FreezePolicy, verb: &str, op: &str, sep: &str) -> String {
    let mut lines = Vec::new();
    for (i, v) in PER_PARTICLE_VARS.iter().enumerate() {
        let frozen = policy.variant(i) == OpVariant::Inert;
        lines.push(format!(
            "\n    /*gpufun*/\n    void LocalParticle_{}{}(LocalParticle* part, {} value){{",
            verb,
            v.name,
            v.ty.c_type()
        ));
        if frozen {
            lines.push("/* frozen variable!".to_string());
        }
        lines.push(format!("  part->{}[part->ipart] {} value;", v.name, op));
        if frozen {
            lines.push("frozen variable!*/".to_string());
        }
        lines.push(format!("}}{}", sep));
    }
    lines.join("\n")
}

fn getters() -> String {
    let mut lines = Vec::new();
    for s in scalars() {
        lines.push("/*gpufun*/".to_string());
        lines.push(format!(
            "{} LocalParticle_get_{}(LocalParticle* part){{",
            s.ty.c_type(),
            s.name
        ));
        lines.push(format!("  return part->{};", s.name));
        lines.push("}".to_string());
    }
    for v in PER_PARTICLE_VARS {
        lines.push("/*gpufun*/".to_string());
        lines.push(format!(
            "{} LocalParticle_get_{}(LocalParticle* part){{",
            v.ty.c_type(),
            v.name
        ));
        lines.push(format!("  return part->{}[part->ipart];", v.name));
        lines.push("}".to_string());
    }
    lines.join("\n")
}

fn exchange() -> String {
    let mut src = String::from(
        "\n/*gpufun*/\nvoid LocalParticle_exchange(LocalParticle* part, int64_t i1, int64_t i2){\n",
    );
    for VarDef { name, ty, .. } in PER_PARTICLE_VARS {
        src.push_str(&format!(
            "\n    {{\n    {} temp = part->{}[i2];\n    part->{}[i2] = part->{}[i1];\n    part->{}[i1] = temp;\n     }}",
            ty.c_type(),
            name,
            name,
            name,
            name
        ));
    }
    src.push_str("}\n");
    src
}

fn particles_to_local() -> String {
    let mut lines = vec![
        "\n    /*gpufun*/\n    void Particles_to_LocalParticle(ParticlesData source,\n                                    LocalParticle* dest,\n                                    int64_t id){".to_string(),
    ];
    for s in scalars() {
        lines.push(format!(
            "  dest->{} = ParticlesData_get_{}(source);",
            s.name, s.name
        ));
    }
    for v in PER_PARTICLE_VARS {
        lines.push(format!(
            "  dest->{} = ParticlesData_getp1_{}(source, 0);",
            v.name, v.name
        ));
    }
    lines.push("  dest->ipart = id;".to_string());
    lines.push("}".to_string());
    lines.join("\n")
}

fn local_to_particles() -> String {
    let mut lines = vec![
        "\n    /*gpufun*/\n    void LocalParticle_to_Particles(\n                                    LocalParticle* source,\n                                    ParticlesData dest,\n                                    int64_t id,\n                                    int64_t set_scalar){".to_string(),
        "if (set_scalar){".to_string(),
    ];
    for s in scalars() {
        lines.push(format!(
            "  ParticlesData_set_{}(dest,      LocalParticle_get_{}(source));",
            s.name, s.name
        ));
    }
    lines.push("}".to_string());
    for v in PER_PARTICLE_VARS {
        lines.push(format!(
            "  ParticlesData_set_{}(dest, id,       LocalParticle_get_{}(source));",
            v.name, v.name
        ));
    }
    lines.push("}".to_string());
    lines.join("\n")
}

/// The same formulas as `prtls::kinematics`, written against the
/// interface so that frozen fields stay frozen.
const KINEMATICS_SRC: &str = r#"
/*gpufun*/
double LocalParticle_get_energy0(LocalParticle* part){

    double const p0c = LocalParticle_get_p0c(part);
    double const m0  = LocalParticle_get_mass0(part);

    return sqrt( p0c * p0c + m0 * m0 );
}

/*gpufun*/
void LocalParticle_add_to_energy(LocalParticle* part, double delta_energy){

    double const beta0 = LocalParticle_get_beta0(part);
    double const delta_beta0 = LocalParticle_get_delta(part) * beta0;

    double const ptau_beta0 =
        delta_energy / LocalParticle_get_energy0(part) +
        sqrt( delta_beta0 * delta_beta0 + 2.0 * delta_beta0 * beta0
                + 1. ) - 1.;

    double const ptau   = ptau_beta0 / beta0;
    double const psigma = ptau / beta0;
    double const delta = sqrt( ptau * ptau + 2. * psigma + 1 ) - 1;

    double const one_plus_delta = delta + 1.;
    double const rvv = one_plus_delta / ( 1. + ptau_beta0 );

    LocalParticle_set_delta(part, delta );
    LocalParticle_set_psigma(part, psigma );
    LocalParticle_scale_zeta(part,
        rvv / LocalParticle_get_rvv(part));

    LocalParticle_set_rvv(part, rvv );
    LocalParticle_set_rpp(part, 1. / one_plus_delta );
}

/*gpufun*/
void LocalParticle_update_delta(LocalParticle* part, double new_delta_value){
    double const beta0 = LocalParticle_get_beta0(part);
    double const delta_beta0 = new_delta_value * beta0;
    double const ptau_beta0  = sqrt( delta_beta0 * delta_beta0 +
                                2. * delta_beta0 * beta0 + 1. ) - 1.;

    double const one_plus_delta = 1. + new_delta_value;
    double const rvv    = ( one_plus_delta ) / ( 1. + ptau_beta0 );
    double const rpp    = 1. / one_plus_delta;
    double const psigma = ptau_beta0 / ( beta0 * beta0 );

    LocalParticle_set_delta(part, new_delta_value);

    LocalParticle_set_rvv(part, rvv );
    LocalParticle_set_rpp(part, rpp );
    LocalParticle_set_psigma(part, psigma );
}

/*gpufun*/
void LocalParticle_update_p0c(LocalParticle* part, double new_p0c_value){

    double const mass0 = LocalParticle_get_mass0(part);
    double const old_p0c = LocalParticle_get_p0c(part);
    double const old_delta = LocalParticle_get_delta(part);

    double const ppc = old_p0c * old_delta + old_p0c;
    double const new_delta = (ppc - new_p0c_value)/new_p0c_value;

    double const new_energy0 = sqrt(new_p0c_value*new_p0c_value + mass0 * mass0);
    double const new_beta0 = new_p0c_value / new_energy0;
    double const new_gamma0 = new_energy0 / mass0;

    LocalParticle_set_p0c(part, new_p0c_value);
    LocalParticle_set_gamma0(part, new_gamma0);
    LocalParticle_set_beta0(part, new_beta0);

    LocalParticle_update_delta(part, new_delta);

    LocalParticle_scale_px(part, old_p0c/new_p0c_value);
    LocalParticle_scale_py(part, old_p0c/new_p0c_value);
}
"#;

/// Generates the C interface for the current schema.
///
/// Only [`ApiMode::NoLocalCopy`] is implemented.
pub fn gen_local_particle_api(mode: ApiMode, policy: &FreezePolicy) -> Result<String> {
    if mode != ApiMode::NoLocalCopy {
        return Err(PrtlError::unsupported(format!(
            "local particle api mode {:?}",
            mode
        )));
    }
    let parts = [
        typedef(),
        mutators(policy, "add_to_", "+=", "\n"),
        getters(),
        mutators(policy, "set_", "=", ""),
        mutators(policy, "scale_", "*=", "\n"),
        exchange(),
        particles_to_local(),
        local_to_particles(),
        KINEMATICS_SRC.to_string(),
    ];
    Ok(parts.join("\n\n"))
}

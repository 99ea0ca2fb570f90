//! Human-friendly particle descriptions that an ensemble is built from.
//!
//! The ensemble does not care where coordinates come from. It only needs
//! something that exports named fields in its own vocabulary, which is
//! what [`PhaseSpace`] asks for.
use crate::error::{PrtlError, Result};
use crate::prtls::{bcast as at, kinematics};
use crate::prtls::schema::{Column, FieldValues};

pub trait PhaseSpace {
    /// Named fields, each of length 1 or of one common length.
    fn to_field_values(&self) -> Result<FieldValues>;
}

impl PhaseSpace for FieldValues {
    fn to_field_values(&self) -> Result<FieldValues> {
        Ok(self.clone())
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Momentum {
    Delta(Vec<f64>),
    Ptau(Vec<f64>),
}

/// Coordinates in physical units plus reference quantities.
///
/// Fields left unset are not exported, so the ensemble falls back to its
/// defaults for them.
#[derive(Clone, Debug, PartialEq)]
pub struct PhaseSpaceDescription {
    q0: Vec<f64>,
    mass0: Vec<f64>,
    p0c: Vec<f64>,
    coords: Vec<(&'static str, Vec<f64>)>,
    ids: Vec<(&'static str, Vec<i64>)>,
    momentum: Option<Momentum>,
    charge_ratio: Option<Vec<f64>>,
    mass_ratio: Option<Vec<f64>>,
}

fn common_len(lens: &[usize]) -> Result<usize> {
    let n = lens.iter().copied().max().unwrap_or(1);
    if lens.iter().any(|&l| l != 1 && l != n) {
        return Err(PrtlError::config(format!(
            "field lengths {:?} cannot be broadcast together",
            lens
        )));
    }
    Ok(n)
}

impl PhaseSpaceDescription {
    /// A description with the given reference and nothing else set.
    pub fn new(p0c: f64, mass0: f64, q0: f64) -> PhaseSpaceDescription {
        PhaseSpaceDescription {
            q0: vec![q0],
            mass0: vec![mass0],
            p0c: vec![p0c],
            coords: Vec::new(),
            ids: Vec::new(),
            momentum: None,
            charge_ratio: None,
            mass_ratio: None,
        }
    }

    pub fn p0c(mut self, v: Vec<f64>) -> Self {
        self.p0c = v;
        self
    }

    pub fn mass0(mut self, v: Vec<f64>) -> Self {
        self.mass0 = v;
        self
    }

    pub fn q0(mut self, v: Vec<f64>) -> Self {
        self.q0 = v;
        self
    }

    fn coord(mut self, name: &'static str, v: Vec<f64>) -> Self {
        self.coords.retain(|(n, _)| *n != name);
        self.coords.push((name, v));
        self
    }

    fn id(mut self, name: &'static str, v: Vec<i64>) -> Self {
        self.ids.retain(|(n, _)| *n != name);
        self.ids.push((name, v));
        self
    }

    pub fn s(self, v: Vec<f64>) -> Self {
        self.coord("s", v)
    }

    pub fn x(self, v: Vec<f64>) -> Self {
        self.coord("x", v)
    }

    pub fn px(self, v: Vec<f64>) -> Self {
        self.coord("px", v)
    }

    pub fn y(self, v: Vec<f64>) -> Self {
        self.coord("y", v)
    }

    pub fn py(self, v: Vec<f64>) -> Self {
        self.coord("py", v)
    }

    pub fn zeta(self, v: Vec<f64>) -> Self {
        self.coord("zeta", v)
    }

    pub fn weight(self, v: Vec<f64>) -> Self {
        self.coord("weight", v)
    }

    /// Relative momentum deviation. Replaces a previously set `ptau`.
    pub fn delta(mut self, v: Vec<f64>) -> Self {
        self.momentum = Some(Momentum::Delta(v));
        self
    }

    /// Relative energy deviation. Replaces a previously set `delta`.
    pub fn ptau(mut self, v: Vec<f64>) -> Self {
        self.momentum = Some(Momentum::Ptau(v));
        self
    }

    pub fn charge_ratio(mut self, v: Vec<f64>) -> Self {
        self.charge_ratio = Some(v);
        self
    }

    pub fn mass_ratio(mut self, v: Vec<f64>) -> Self {
        self.mass_ratio = Some(v);
        self
    }

    pub fn state(self, v: Vec<i64>) -> Self {
        self.id("state", v)
    }

    pub fn particle_id(self, v: Vec<i64>) -> Self {
        self.id("particle_id", v)
    }

    pub fn at_turn(self, v: Vec<i64>) -> Self {
        self.id("at_turn", v)
    }

    pub fn at_element(self, v: Vec<i64>) -> Self {
        self.id("at_element", v)
    }

    pub fn parent_particle_id(self, v: Vec<i64>) -> Self {
        self.id("parent_particle_id", v)
    }

    fn delta_values(&self) -> Result<Option<Vec<f64>>> {
        match &self.momentum {
            None => Ok(None),
            Some(Momentum::Delta(d)) => Ok(Some(d.clone())),
            Some(Momentum::Ptau(pt)) => {
                let n = common_len(&[pt.len(), self.p0c.len(), self.mass0.len()])?;
                Ok(Some(
                    (0..n)
                        .map(|i| {
                            let r = kinematics::reference(at(&self.p0c, i), at(&self.mass0, i));
                            kinematics::delta_from_ptau(at(pt, i), r.beta0)
                        })
                        .collect(),
                ))
            }
        }
    }
}

impl PhaseSpace for PhaseSpaceDescription {
    fn to_field_values(&self) -> Result<FieldValues> {
        let mut out = FieldValues::new()
            .with("q0", self.q0.clone())
            .with("mass0", self.mass0.clone())
            .with("p0c", self.p0c.clone());
        for (name, v) in &self.coords {
            out.insert(*name, v.clone());
        }
        for (name, v) in &self.ids {
            out.insert(*name, v.clone());
        }
        if let Some(delta) = self.delta_values()? {
            out.insert("delta", delta);
        }

        let ones = vec![1.0];
        let qr = self.charge_ratio.as_ref().unwrap_or(&ones);
        let mr = self.mass_ratio.as_ref().unwrap_or(&ones);
        if self.charge_ratio.is_some() || self.mass_ratio.is_some() {
            let n = common_len(&[qr.len(), mr.len()])?;
            let chi: Vec<f64> = (0..n).map(|i| at(qr, i) / at(mr, i)).collect();
            out.insert("charge_ratio", Column::from((0..n).map(|i| at(qr, i)).collect::<Vec<_>>()));
            out.insert("chi", chi);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exports_reference_and_coordinates() {
        let d = PhaseSpaceDescription::new(1e9, 1e8, 1.0)
            .x(vec![1e-3, 2e-3])
            .delta(vec![0.0, 1e-3]);
        let f = d.to_field_values().unwrap();
        assert_eq!(f.get("x"), Some(&Column::from(vec![1e-3, 2e-3])));
        assert_eq!(f.get("p0c"), Some(&Column::from(vec![1e9])));
        assert_eq!(f.get("delta"), Some(&Column::from(vec![0.0, 1e-3])));
        assert!(!f.contains("chi"));
    }

    #[test]
    fn ptau_becomes_delta() {
        let d = PhaseSpaceDescription::new(1e9, 938e6, 1.0).ptau(vec![0.0, 1e-3]);
        let f = d.to_field_values().unwrap();
        let delta = f.get("delta").unwrap().cast::<f64>().unwrap();
        assert_eq!(delta[0], 0.0);
        let beta0 = kinematics::reference(1e9, 938e6).beta0;
        assert!((kinematics::ptau(delta[1], beta0) - 1e-3).abs() < 1e-14);
    }

    #[test]
    fn chi_from_charge_and_mass_ratio() {
        let d = PhaseSpaceDescription::new(1e9, 938e6, 1.0)
            .charge_ratio(vec![2.0])
            .mass_ratio(vec![4.0, 1.0]);
        let f = d.to_field_values().unwrap();
        assert_eq!(f.get("chi"), Some(&Column::from(vec![0.5, 2.0])));
        assert_eq!(f.get("charge_ratio"), Some(&Column::from(vec![2.0, 2.0])));
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let d = PhaseSpaceDescription::new(1e9, 938e6, 1.0)
            .p0c(vec![1e9, 2e9])
            .ptau(vec![0.0, 0.0, 0.0]);
        assert!(matches!(
            d.to_field_values(),
            Err(PrtlError::Configuration(_))
        ));
    }
}

use serde::{Deserialize, Serialize};
use xtal_core::{SymMat3, UnitCell, Vec3};

use crate::error::RefineError;

/// Displacement representation of a site. Exactly one form is active.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Displacement {
    /// Isotropic mean-square displacement `u_iso`.
    Isotropic(f64),
    /// Anisotropic tensor in the crystallographic frame (`u_star`).
    Anisotropic(SymMat3),
}

impl Displacement {
    pub fn is_anisotropic(&self) -> bool {
        matches!(self, Self::Anisotropic(_))
    }

    pub fn u_iso(&self) -> Option<f64> {
        match self {
            Self::Isotropic(u) => Some(*u),
            Self::Anisotropic(_) => None,
        }
    }

    pub fn u_star(&self) -> Option<&SymMat3> {
        match self {
            Self::Isotropic(_) => None,
            Self::Anisotropic(u) => Some(u),
        }
    }

    /// Isotropic value, or the isotropic equivalent of the tensor.
    pub fn u_iso_or_equiv(&self, cell: &UnitCell) -> f64 {
        match self {
            Self::Isotropic(u) => *u,
            Self::Anisotropic(u) => cell.u_star_as_u_iso(u),
        }
    }
}

/// A refinable atomic site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub label: String,
    /// Fractional coordinates.
    pub site: Vec3,
    /// `{isotropic: u}` or `{anisotropic: [..]}` in both JSON and YAML.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub displacement: Displacement,
    #[serde(default = "default_occupancy")]
    pub occupancy: f64,
    #[serde(default)]
    pub fp: f64,
    #[serde(default)]
    pub fdp: f64,
}

fn default_occupancy() -> f64 {
    1.0
}

impl Site {
    pub fn isotropic(label: impl Into<String>, site: Vec3, u_iso: f64) -> Self {
        Self {
            label: label.into(),
            site,
            displacement: Displacement::Isotropic(u_iso),
            occupancy: 1.0,
            fp: 0.0,
            fdp: 0.0,
        }
    }

    pub fn anisotropic(label: impl Into<String>, site: Vec3, u_star: SymMat3) -> Self {
        Self {
            label: label.into(),
            site,
            displacement: Displacement::Anisotropic(u_star),
            occupancy: 1.0,
            fp: 0.0,
            fdp: 0.0,
        }
    }

    pub fn is_anisotropic(&self) -> bool {
        self.displacement.is_anisotropic()
    }

    pub fn is_finite(&self) -> bool {
        let adp_finite = match &self.displacement {
            Displacement::Isotropic(u) => u.is_finite(),
            Displacement::Anisotropic(u) => u.is_finite(),
        };
        self.site.is_finite()
            && adp_finite
            && self.occupancy.is_finite()
            && self.fp.is_finite()
            && self.fdp.is_finite()
    }

    /// Diagnostic for a negative `u_iso` met while taking its square root.
    pub fn report_negative_u_iso(&self, index: usize) -> RefineError {
        RefineError::NegativeDisplacement {
            index,
            label: self.label.clone(),
            u_iso: self.displacement.u_iso().unwrap_or(f64::NAN),
        }
    }
}

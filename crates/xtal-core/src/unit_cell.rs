use nalgebra::{Matrix3, Vector3};

use crate::error::{CellError, CellResult};
use crate::geom::Vec3;
use crate::sym_mat3::SymMat3;

const VOLUME_FACTOR_MIN: f64 = 1e-10;

/// Unit cell geometry: lattice parameters and the matrices that move
/// coordinates and displacement tensors between the fractional and
/// Cartesian frames.
///
/// The Cartesian frame puts `a` along x and `c*` along z.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitCell {
    parameters: [f64; 6],
    volume: f64,
    orth: Matrix3<f64>,
    frac: Matrix3<f64>,
}

impl UnitCell {
    /// `parameters` is `[a, b, c, alpha, beta, gamma]` with angles in degrees.
    pub fn new(parameters: [f64; 6]) -> CellResult<Self> {
        let [a, b, c, alpha, beta, gamma] = parameters;
        if parameters.iter().any(|v| !v.is_finite()) {
            return Err(CellError::InvalidCell(
                "cell parameters must be finite".into(),
            ));
        }
        if a <= 0.0 || b <= 0.0 || c <= 0.0 {
            return Err(CellError::InvalidCell(format!(
                "cell lengths must be positive, got ({a}, {b}, {c})"
            )));
        }
        for angle in [alpha, beta, gamma] {
            if angle <= 0.0 || angle >= 180.0 {
                return Err(CellError::InvalidCell(format!(
                    "cell angle {angle} outside (0, 180)"
                )));
            }
        }
        let (ca, cb, cg) = (
            alpha.to_radians().cos(),
            beta.to_radians().cos(),
            gamma.to_radians().cos(),
        );
        let sg = gamma.to_radians().sin();
        let d = 1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg;
        // Rounding leaves flat cells such as 120/120/120 a few ulps above zero.
        if d <= VOLUME_FACTOR_MIN {
            return Err(CellError::InvalidCell(format!(
                "angles ({alpha}, {beta}, {gamma}) do not describe a cell with positive volume"
            )));
        }
        let volume = a * b * c * d.sqrt();
        let orth = Matrix3::new(
            a,
            b * cg,
            c * cb,
            0.0,
            b * sg,
            c * (ca - cb * cg) / sg,
            0.0,
            0.0,
            volume / (a * b * sg),
        );
        let frac = orth
            .try_inverse()
            .ok_or_else(|| CellError::Singular("orthogonalization matrix".into()))?;
        Ok(Self {
            parameters,
            volume,
            orth,
            frac,
        })
    }

    pub fn cubic(a: f64) -> CellResult<Self> {
        Self::new([a, a, a, 90.0, 90.0, 90.0])
    }

    pub fn parameters(&self) -> [f64; 6] {
        self.parameters
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn orthogonalization_matrix(&self) -> &Matrix3<f64> {
        &self.orth
    }

    pub fn orthogonalize(&self, frac: Vec3) -> Vec3 {
        mat_vec(&self.orth, frac)
    }

    pub fn fractionalize(&self, cart: Vec3) -> Vec3 {
        mat_vec(&self.frac, cart)
    }

    pub fn u_star_as_u_cart(&self, u_star: &SymMat3) -> SymMat3 {
        u_star.transform(&self.orth)
    }

    pub fn u_cart_as_u_star(&self, u_cart: &SymMat3) -> SymMat3 {
        u_cart.transform(&self.frac)
    }

    pub fn u_iso_as_u_star(&self, u_iso: f64) -> SymMat3 {
        self.u_cart_as_u_star(&SymMat3::from_diagonal(u_iso))
    }

    /// Isotropic equivalent: one third of the Cartesian trace.
    pub fn u_star_as_u_iso(&self, u_star: &SymMat3) -> f64 {
        self.u_star_as_u_cart(u_star).trace() / 3.0
    }
}

fn mat_vec(m: &Matrix3<f64>, v: Vec3) -> Vec3 {
    let out = m * Vector3::new(v.x, v.y, v.z);
    Vec3::new(out[0], out[1], out[2])
}

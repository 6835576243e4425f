use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

/// Symmetric 3x3 tensor stored as `(m11, m22, m33, m12, m13, m23)`.
///
/// Anisotropic displacement parameters use this layout in both the
/// crystallographic (`u_star`) and Cartesian (`u_cart`) frames, and a
/// six-value shift block is read in the same order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 6]", into = "[f64; 6]")]
pub struct SymMat3(pub [f64; 6]);

impl SymMat3 {
    pub fn new(m11: f64, m22: f64, m33: f64, m12: f64, m13: f64, m23: f64) -> Self {
        Self([m11, m22, m33, m12, m13, m23])
    }

    pub fn zero() -> Self {
        Self([0.0; 6])
    }

    pub fn from_diagonal(d: f64) -> Self {
        Self::new(d, d, d, 0.0, 0.0, 0.0)
    }

    /// Builds a tensor from the first six values of `values`.
    ///
    /// Returns `None` when fewer than six values are supplied.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        let head: [f64; 6] = values.get(..6)?.try_into().ok()?;
        Some(Self(head))
    }

    pub fn trace(&self) -> f64 {
        self.0[0] + self.0[1] + self.0[2]
    }

    pub fn add(self, other: Self) -> Self {
        let mut out = self.0;
        for (o, v) in out.iter_mut().zip(other.0) {
            *o += v;
        }
        Self(out)
    }

    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        let [m11, m22, m33, m12, m13, m23] = self.0;
        Matrix3::new(m11, m12, m13, m12, m22, m23, m13, m23, m33)
    }

    /// Reads the upper triangle of `m`; the lower triangle is ignored.
    pub fn from_matrix(m: &Matrix3<f64>) -> Self {
        Self::new(
            m[(0, 0)],
            m[(1, 1)],
            m[(2, 2)],
            m[(0, 1)],
            m[(0, 2)],
            m[(1, 2)],
        )
    }

    /// Returns `r * self * r^T`.
    pub fn transform(&self, r: &Matrix3<f64>) -> Self {
        Self::from_matrix(&(r * self.to_matrix() * r.transpose()))
    }
}

impl From<[f64; 6]> for SymMat3 {
    fn from(v: [f64; 6]) -> Self {
        Self(v)
    }
}

impl From<SymMat3> for [f64; 6] {
    fn from(v: SymMat3) -> Self {
        v.0
    }
}

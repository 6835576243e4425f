#![forbid(unsafe_code)]

pub mod error;
pub mod geom;
pub mod sym_mat3;
pub mod unit_cell;

pub use error::{CellError, CellResult};
pub use geom::Vec3;
pub use sym_mat3::SymMat3;
pub use unit_cell::UnitCell;

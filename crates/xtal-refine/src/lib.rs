//! xtal-refine: flat parameter vectors for crystal structure refinement.
//!
//! Translates between the structured site list of a crystal model and the
//! flat shift and gradient vectors an optimizer works with.

#![forbid(unsafe_code)]

pub mod config;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod minimization;
pub mod packing;
pub mod scatterer;
pub mod selection;
pub mod streaming;
pub mod vector_io;

pub use error::{RefineError, RefineResult};
pub use minimization::{
    apply_shifts, apply_shifts_parallel, gather_position_gradients, scatter_isotropic_gradients,
    scatter_position_gradients, AppliedShifts,
};
pub use packing::{n_parameters, site_fields, Field, ParameterLayout};
pub use scatterer::{Displacement, Site};
pub use selection::SelectionMask;
pub use xtal_core::{SymMat3, UnitCell, Vec3};

//! Geometry and surface descriptions handed to the backends

mod material;
mod mesh;

pub use material::*;
pub use mesh::*;

//! Backend abstraction layer
//!
//! `traits` and `types` describe the GPU interface the render passes are
//! written against; `wgpu_backend` implements it.

pub mod traits;
pub mod types;
pub mod wgpu_backend;

pub use traits::*;
pub use types::*;

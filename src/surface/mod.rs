pub mod bspline_surface;
pub mod constructors;
pub mod edit;
pub mod evaluate;
pub mod knot_removal;

pub use bspline_surface::*;
pub use constructors::*;
pub use edit::*;
pub use evaluate::*;
pub use knot_removal::*;

/// A parameter direction of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SurfaceDirection {
    U,
    V,
}

impl SurfaceDirection {
    pub fn other(&self) -> Self {
        match self {
            SurfaceDirection::U => SurfaceDirection::V,
            SurfaceDirection::V => SurfaceDirection::U,
        }
    }
}

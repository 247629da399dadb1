pub mod bspline_curve;
pub mod compatible;
pub(crate) mod ops;

pub use bspline_curve::*;
pub use compatible::*;

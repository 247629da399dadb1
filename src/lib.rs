#![allow(clippy::needless_range_loop)]

mod curve;
mod errors;
mod grid;
mod knot;
mod misc;
mod surface;
mod trim;

pub use errors::{Error, Result};

pub mod prelude {
    pub use crate::curve::*;
    pub use crate::errors::*;
    pub use crate::grid::*;
    pub use crate::knot::*;
    pub use crate::misc::*;
    pub use crate::surface::*;
    pub use crate::trim::*;
}

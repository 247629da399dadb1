pub mod pole_grid;

pub use pole_grid::*;

use thiserror::Error;

/// Errors reported by curve/surface construction and mutation.
///
/// Numerical degeneracies that have a documented fallback (zero-length
/// tangents, singular curvature systems) are not errors; only structural
/// validation failures and genuinely unrepresentable requests surface here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("order {0} is not in the supported range [2, {max}]", max = crate::knot::MAX_ORDER)]
    InvalidOrder(usize),

    #[error("too few poles ({num_poles}) for order {order}")]
    TooFewPoles { num_poles: usize, order: usize },

    #[error("pole grid is empty")]
    NoPoles,

    #[error("pole count mismatch: {num_u} x {num_v} != {num_points}")]
    PoleCountMismatch {
        num_u: usize,
        num_v: usize,
        num_points: usize,
    },

    #[error("weight count {num_weights} does not match pole count {num_poles}")]
    WeightCountMismatch {
        num_weights: usize,
        num_poles: usize,
    },

    #[error("invalid number of knots: got {got}, expected {expected}")]
    KnotCountMismatch { got: usize, expected: usize },

    #[error("knot vector is degenerate or not non-decreasing")]
    InvalidKnots,

    #[error("parameter is outside the knot domain")]
    ParameterOutOfDomain,

    #[error("end poles do not coincide; curve cannot be closed")]
    SeamMismatch,

    #[error("curve does not wrap around with degree continuity")]
    NoWrapAround,

    #[error("boundary curves do not connect head to tail")]
    DisconnectedBoundary,

    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(&'static str),

    #[error("tangent rays do not intersect")]
    NoRayIntersection,
}

pub type Result<T> = std::result::Result<T, Error>;

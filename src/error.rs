use thiserror::Error;

/// Errors produced by the stitching pipeline.
///
/// Every stage checks its own preconditions and fails with one of these
/// instead of handing degenerate data (an identity transform, a black
/// canvas) to the next stage.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StitchError {
    /// Zero-sized image, bad configuration value or malformed input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An image produced too few keypoints to attempt matching.
    #[error("insufficient features: found {found} keypoints, need at least {required}")]
    InsufficientFeatures { found: usize, required: usize },

    /// Too few correspondences survived matching to fit a homography.
    #[error("insufficient matches: found {found} correspondences, need at least {required}")]
    InsufficientMatches { found: usize, required: usize },

    /// No consistent homography could be found.
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
}

pub type Result<T> = std::result::Result<T, StitchError>;

/// Error returned from the scene synthesizer, objectives, solver and metrics
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HaloError {
    #[error("time-series' length {actual} is smaller than the minimum required length {minimum}")]
    ShortTimeSeries { actual: usize, minimum: usize },

    #[error("{what} length {actual} does not match expected length {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("PSF width must be positive and finite, got {0}")]
    InvalidPsfWidth(f64),

    #[error("pixel grid must be non-empty, got {nx}x{ny}")]
    EmptyGrid { nx: usize, ny: usize },

    #[error("white noise level must be non-negative and finite, got {0}")]
    InvalidNoiseLevel(f64),

    #[error("sensitivity drop must lie in [0, 1), got {0}")]
    InvalidSensitivityDrop(f64),

    #[error("truth flux must be strictly positive, got {value} at cadence {index}")]
    NonPositiveFlux { index: usize, value: f64 },

    #[error("weight vector length {actual} does not match pixel count {expected}")]
    WeightLengthMismatch { expected: usize, actual: usize },

    #[error("subsample of {requested} pixels exceeds the {available} available")]
    SubsampleTooLarge { requested: usize, available: usize },

    #[error("time axis must be strictly increasing")]
    UnsortedTimeAxis,

    #[error("degenerate pixel data: {0}")]
    DegenerateInput(&'static str),
}

use thiserror::Error;

/// Errors raised by the dataset pipeline on invalid configuration or
/// internal invariant violations. Per-record damage is degraded gracefully
/// (skipped steps, empty descriptors) and never surfaces here.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] crate::io::Error),

    #[error("cutoff radius must be positive and finite, got {0}")]
    InvalidCutoff(f64),

    #[error("per-class sample quota must be at least 1")]
    ZeroQuota,

    #[error("the atom type map is empty: at least one element name is required")]
    EmptyTypeMap,

    #[error("unknown element name in type map: {0}")]
    UnknownElement(#[from] crate::model::ParseElementError),

    #[error("error threshold must be finite, got {0}")]
    InvalidErrorLimit(f64),

    #[error("bond perception tolerance must be non-negative and finite, got {0}")]
    InvalidTolerance(f64),

    #[error("bond perception failed: {0}")]
    Perception(String),

    #[error("step {0} carries no coordinates; descriptors require a dump-format source")]
    MissingCoordinates(usize),

    #[error("step {step} carries neither bonds nor coordinates")]
    EmptyStep { step: usize },

    #[error("error file covers {rows} steps but the trajectory reached step {step}")]
    ErrorRowsExhausted { rows: usize, step: usize },

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

use thiserror::Error;

/// Errors raised by configuration, the fold pipeline and the processing methods.
#[derive(Error, Debug)]
pub enum PrepError {
    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------
    #[error("field '{field}' is not allowed here (allowed: {allowed:?})")]
    UnrecognizedField { field: String, allowed: Vec<String> },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    // -----------------------------------------------------------------------
    // Parameters
    // -----------------------------------------------------------------------
    #[error("'{method}' has no parameter named '{name}'")]
    UnknownParameter { method: String, name: String },

    #[error("parameter '{0}' is supplied by the fold and cannot be overridden")]
    ReservedParameter(String),

    #[error("parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    // -----------------------------------------------------------------------
    // Fold layout
    // -----------------------------------------------------------------------
    #[error("fold has no field '{0}'")]
    MissingField(String),

    #[error("field '{0}' does not hold a numeric series or matrix")]
    NotNumeric(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("reassembly expected {expected} results but {actual} were produced")]
    ResultCountMismatch { expected: usize, actual: usize },

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------
    #[error("algorithm failed: {0}")]
    Algorithm(String),

    #[error("run cancelled before fold '{0}'")]
    Cancelled(String),

    #[error("fold '{fold}': {source}")]
    Fold {
        fold: String,
        #[source]
        source: Box<PrepError>,
    },

    #[error("fold '{fold}', sample {index}: {source}")]
    Sample {
        fold: String,
        index: usize,
        #[source]
        source: Box<PrepError>,
    },
}

impl PrepError {
    pub(crate) fn invalid_parameter(name: &str, reason: impl Into<String>) -> Self {
        PrepError::InvalidParameter {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn in_fold(self, fold: &str) -> Self {
        match self {
            // Already carries its location.
            e @ (PrepError::Sample { .. } | PrepError::Fold { .. } | PrepError::Cancelled(_)) => e,
            other => PrepError::Fold {
                fold: fold.to_string(),
                source: Box::new(other),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;

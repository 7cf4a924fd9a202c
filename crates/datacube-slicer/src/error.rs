//! Error types for slicing and index discovery.

use thiserror::Error;

/// Errors that can occur while building or resolving an index tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SliceError {
    // ========================================================================
    // Request validation
    // ========================================================================
    /// An axis is defined by more than one group of polytopes.
    #[error(
        "Axis {0} is overdefined. You have used it in two or more input polytopes which cannot form a union (because they span different axes)."
    )]
    AxisOverdefined(String),

    /// A datacube axis is not constrained by any polytope.
    #[error("Axis {0} is underdefined. It does not appear in any input polytope.")]
    AxisUnderdefined(String),

    /// A polytope references an axis the datacube does not have.
    #[error("Axis {0} does not exist in the datacube.")]
    AxisNotFound(String),

    // ========================================================================
    // Extraction
    // ========================================================================
    /// A shape with non-trivial extent touches an axis without ordering.
    #[error("Higher-dimensional shape does not support unsliceable axis {axis}.")]
    UnsliceableShape { axis: String },

    /// The backend rejected a value the engine expected to exist.
    #[error("Datacube does not have expected index {value} of type {kind} on {axis}")]
    IndexNotFound {
        axis: String,
        value: String,
        kind: String,
    },

    /// A shape was constructed with inconsistent dimensions.
    #[error("invalid shape: {0}")]
    InvalidShape(String),

    // ========================================================================
    // Configuration and values
    // ========================================================================
    /// Axis options could not be applied.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// A value could not be parsed or converted for an axis.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The grid mapper type or resolution is not supported.
    #[error("unsupported grid: {0}")]
    UnsupportedGrid(String),

    /// Failure reported by a datacube backend.
    #[error("backend error: {0}")]
    Backend(String),
}

impl SliceError {
    /// Create an UnsliceableShape error.
    pub fn unsliceable(axis: impl Into<String>) -> Self {
        Self::UnsliceableShape { axis: axis.into() }
    }

    /// Create an IndexNotFound error.
    pub fn index_not_found(
        axis: impl Into<String>,
        value: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self::IndexNotFound {
            axis: axis.into(),
            value: value.into(),
            kind: kind.into(),
        }
    }

    /// Create an InvalidShape error.
    pub fn invalid_shape(msg: impl Into<String>) -> Self {
        Self::InvalidShape(msg.into())
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an InvalidValue error.
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }

    /// Create an UnsupportedGrid error.
    pub fn unsupported_grid(msg: impl Into<String>) -> Self {
        Self::UnsupportedGrid(msg.into())
    }

    /// Create a Backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Whether this error was raised while validating the request axes.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::AxisOverdefined(_) | Self::AxisUnderdefined(_) | Self::AxisNotFound(_)
        )
    }
}

impl From<std::io::Error> for SliceError {
    fn from(err: std::io::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<serde_json::Error> for SliceError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

impl From<serde_yaml::Error> for SliceError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

/// Result type for slicing operations.
pub type Result<T> = std::result::Result<T, SliceError>;

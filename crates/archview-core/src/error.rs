//! Error types for archview-core.

use thiserror::Error;

/// Result type alias using archview-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while indexing, pruning or storing a model.
#[derive(Error, Debug)]
pub enum Error {
    /// Two parts of the containment tree share a uid
    #[error("Duplicate part uid '{uid}'")]
    DuplicateUid { uid: String },

    /// A relation references a uid that is not in the containment tree
    #[error("Relation endpoint '{uid}' not found (relation: {relation})")]
    UnknownEndpoint { uid: String, relation: String },

    /// A model relation ends on a part that cannot be a relation end
    #[error("Relation endpoint '{uid}' is a {kind}; relations connect modules, components and externals (relation: {relation})")]
    InvalidEndpoint {
        uid: String,
        kind: String,
        relation: String,
    },

    /// A part is nested somewhere its kind does not allow
    #[error("Part '{uid}' cannot be placed {placement}")]
    InvalidContainment { uid: String, placement: String },

    /// Unrecognized level token in a selection policy
    #[error("Unknown level '{0}'. Must be: nothing, zone, domain, module, component")]
    UnknownLevel(String),

    /// Unrecognized relation-following limit in a selection policy
    #[error("Invalid follow limit '{0}'. Must be false, a hop count, or \"all\"")]
    InvalidFollow(String),

    /// A routed relation points at a part missing from the pruned tree
    #[error("Routed relation endpoint '{uid}' missing from the pruned tree")]
    MissingRoutedEndpoint { uid: String },

    /// No model file with the given name
    #[error("Model '{0}' not found")]
    ModelNotFound(String),

    /// Model name that cannot be used as a file name
    #[error("Invalid model name '{0}'")]
    InvalidModelName(String),

    /// Named view missing from a model
    #[error("View '{view}' not found in model '{model}'")]
    ViewNotFound { model: String, view: String },

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a duplicate uid error.
    pub fn duplicate_uid(uid: impl Into<String>) -> Self {
        Self::DuplicateUid { uid: uid.into() }
    }

    /// Create an unknown endpoint error, carrying a rendering of the relation.
    pub fn unknown_endpoint(uid: impl Into<String>, relation: impl Into<String>) -> Self {
        Self::UnknownEndpoint {
            uid: uid.into(),
            relation: relation.into(),
        }
    }

    /// Create an invalid endpoint error.
    pub fn invalid_endpoint(
        uid: impl Into<String>,
        kind: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self::InvalidEndpoint {
            uid: uid.into(),
            kind: kind.into(),
            relation: relation.into(),
        }
    }

    /// Create an invalid containment error.
    pub fn invalid_containment(uid: impl Into<String>, placement: impl Into<String>) -> Self {
        Self::InvalidContainment {
            uid: uid.into(),
            placement: placement.into(),
        }
    }

    /// Create a missing routed endpoint error.
    pub fn missing_routed_endpoint(uid: impl Into<String>) -> Self {
        Self::MissingRoutedEndpoint { uid: uid.into() }
    }

    /// Whether the error comes from a malformed input graph rather than I/O.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateUid { .. }
                | Self::UnknownEndpoint { .. }
                | Self::InvalidEndpoint { .. }
                | Self::InvalidContainment { .. }
        )
    }
}

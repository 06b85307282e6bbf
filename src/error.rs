use std::path::PathBuf;

use thiserror::Error;

use crate::validation::Diagnostic;

/// Errors raised while loading, evaluating or saving a robot description.
///
/// Most defects of a document are *not* raised: they are collected as
/// [`Diagnostic`]s by the validator. Only the fields needed to index the tree
/// fail a parse.
#[derive(Debug, Error)]
pub enum UrdfError {
    /// A required datum is absent.
    #[error("incomplete: {0}")]
    Incomplete(String),

    /// A value is present but cannot be used.
    #[error("invalid value for '{attribute}' on <{element}>: {message}")]
    InvalidAttributeValue {
        attribute: String,
        element: String,
        message: String,
    },

    /// A name reference resolves to nothing.
    #[error("broken reference: {0}")]
    BrokenReference(String),

    /// The document is structurally unusable.
    #[error("malformed document: {0}")]
    Malformed(String),

    /// A recognized construct this crate does not implement.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error(
        "dimensionality of configuration ({got}) doesn't match number of all ({total}) or actuated joints ({actuated})"
    )]
    DimensionMismatch {
        got: usize,
        total: usize,
        actuated: usize,
    },

    /// A configuration value does not fit its joint's slot.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("document failed validation before saving ({} diagnostic(s))", .0.len())]
    SaveValidationFailure(Vec<Diagnostic>),

    #[error("no {0} scene available, enable it in the load options")]
    SceneUnavailable(&'static str),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("write error: {0}")]
    Write(#[from] std::io::Error),
}

impl UrdfError {
    /// A load-bearing attribute is missing from an element.
    pub fn missing_attribute(attribute: &str, element: &str) -> Self {
        Self::Malformed(format!("<{element}> misses required attribute '{attribute}'"))
    }

    pub fn invalid_attribute(
        attribute: &str,
        element: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAttributeValue {
            attribute: attribute.to_string(),
            element: element.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, UrdfError>;

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Category of a rejected submission field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationKind {
    Required,
    InvalidType,
    InvalidValue,
    InvalidUrl,
    InvalidMethod,
    InvalidJson,
    InvalidDocument,
    OutOfRange,
}

impl ValidationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationKind::Required => "required",
            ValidationKind::InvalidType => "invalid_type",
            ValidationKind::InvalidValue => "invalid_value",
            ValidationKind::InvalidUrl => "invalid_url",
            ValidationKind::InvalidMethod => "invalid_method",
            ValidationKind::InvalidJson => "invalid_json",
            ValidationKind::InvalidDocument => "invalid_document",
            ValidationKind::OutOfRange => "out_of_range",
        }
    }
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A malformed submission, tagged with the offending field.
///
/// Displays as `<kind>:<field>`, e.g. `invalid_json:headers`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}:{field}")]
pub struct ValidationError {
    pub field: String,
    pub kind: ValidationKind,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, kind: ValidationKind, message: impl Into<String>) -> Self {
        Self { field: field.into(), kind, message: message.into() }
    }

    pub fn required(field: &str) -> Self {
        Self::new(field, ValidationKind::Required, format!("{field} is required"))
    }

    /// Prefix the field with the position of the entry inside a batch
    pub fn in_entry(mut self, index: usize) -> Self {
        self.field = format!("endpoints[{index}].{}", self.field);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("endpoint not found: {0}")]
    NotFound(String),

    #[error("duplicate endpoint id: {0}")]
    DuplicateId(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration document: {0}")]
    Parse(String),

    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
}

/// Top-level error of the configuration service
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

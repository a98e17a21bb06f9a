//! Content mapping errors

use thiserror::Error;

/// A provider document could not be shaped into a view model
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContentError {
    #[error("document {document} is missing required field `{field}`")]
    MissingField { document: String, field: String },

    #[error("document {document} has an invalid `{field}`: {reason}")]
    InvalidField {
        document: String,
        field: String,
        reason: String,
    },

    #[error("document {document} has an unparseable publication date `{value}`")]
    InvalidDate { document: String, value: String },
}

//! Error types for the core engine.
//!
//! Each stage has its own enum so callers can tell identity failures
//! (recoverable locally) apart from parse or splice failures (reported,
//! source left untouched).

use crate::id::ElementTag;
use thiserror::Error;

/// A markup parse failure with a 1-based source position.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (line {line}, column {column})")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    /// Build an error pointing at byte `offset` of `source`.
    pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = offset.min(source.len());
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
            + 1;
        Self {
            message: message.into(),
            line,
            column,
        }
    }
}

/// Identity errors from the element tagger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    /// The live document is not mounted yet; retry after the next ready signal.
    #[error("document is not loaded; retry after the next ready signal")]
    DocumentNotLoaded,

    #[error("tag not found: {0}")]
    NotFound(ElementTag),
}

/// Insertion / removal failures. The input source is never modified.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpliceError {
    #[error("tag not found: {0}")]
    TagNotFound(ElementTag),

    #[error("anchor not found: {0}")]
    AnchorNotFound(ElementTag),

    #[error("tag already present in source: {0}")]
    TagCollision(ElementTag),

    #[error("the root element cannot be removed")]
    RootRemoval,

    #[error("element {0} is self-closing and cannot take children")]
    NotAContainer(ElementTag),

    #[error("invalid fragment: {0}")]
    InvalidFragment(String),

    #[error("source parse error: {0}")]
    Parse(#[from] ParseError),
}

/// Failures while regenerating source from the live DOM.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    #[error("no tagged root element in the document")]
    NoRoot,
}

/// Persistence failures at the project-store boundary.
#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

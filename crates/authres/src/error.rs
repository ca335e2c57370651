//! Error types for the Authentication-Results library.

use thiserror::Error;

/// Errors that can occur while parsing, building or rendering a header.
#[derive(Debug, Error)]
pub enum Error {
    /// Tokenizing the input produced no tokens.
    #[error("Empty input: no header content to parse")]
    EmptyInput,

    /// A token that cannot start a header appeared before the service
    /// identifier was found.
    #[error("Invalid authentication service identifier near {token:?}")]
    InvalidAuthServId {
        /// The offending token text.
        token: String,
    },

    /// A token arrived in a parser state that does not accept it.
    #[error("Unexpected token {token:?} while parsing {context}")]
    UnexpectedToken {
        /// The offending token text.
        token: String,
        /// What the parser was working on when the token arrived.
        context: &'static str,
    },

    /// The token following a `/` operator was not all digits.
    #[error("Invalid version {value:?}: versions must be numeric")]
    InvalidVersion {
        /// The non-numeric version text.
        value: String,
    },

    /// A key or value contained a double quote, CR or LF.
    #[error("Invalid characters in {text:?}")]
    InvalidCharacters {
        /// The rejected text.
        text: String,
    },

    /// A key setter was called with an empty key.
    #[error("Keys must not be empty")]
    EmptyKey,

    /// A value was required but not present.
    #[error("Value is required but was not supplied")]
    UndefinedValue,

    /// A child add or remove violated the parent/child rules.
    #[error("Invalid child relation: {0}")]
    InvalidChildRelation(String),

    /// A key, value or children accessor was called on a node kind that
    /// does not have that capability.
    #[error("Node kind {kind} has no {capability}")]
    MissingCapability {
        /// The node kind name.
        kind: &'static str,
        /// The missing capability (`key`, `value` or `children`).
        capability: &'static str,
    },

    /// An interchange record carried an unrecognized `type` field.
    #[error("Unknown node type: {0}")]
    UnknownType(String),

    /// An unrecognized indent style name was supplied.
    #[error("Unknown indent style: {0}")]
    UnknownIndentStyle(String),

    /// JSON encode or decode error at the interchange boundary.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

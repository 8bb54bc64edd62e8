use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Invalid parameter: query")]
    InvalidParameterShape,

    #[error("Cannot mix included and excluded fields in $select")]
    ConflictingProjection,

    #[error("Invalid Raw Query String: {0}")]
    InvalidRawQuery(String),

    #[error("Invalid filter expression: {0}")]
    InvalidFilterExpression(String),

    #[error("Unsupported filter function: {0}")]
    UnsupportedFunction(String),

    #[error("Missing {0}")]
    MissingRequiredField(&'static str),

    #[error("Invalid increments")]
    InvalidIncrements,

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by [`crate::Collection`]: either the query material was
/// rejected before it reached the store, or the store itself failed.
#[derive(Debug, Error)]
pub enum CollectionError<E: std::error::Error> {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(E),
}

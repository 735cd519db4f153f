use thiserror::Error;

/// All failures surfaced at the crate boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    /// The path text is malformed.
    #[error("parse error in '{path}': {message}")]
    Parse { path: String, message: String },

    /// A filter pipeline names an unknown built-in or passes bad arguments.
    #[error("filter '{filter}': {message}")]
    Operator { filter: String, message: String },

    /// Strict-mode traversal could not resolve the path against the data.
    #[error("cannot resolve '{token}' in '{path}': {message}")]
    Resolution {
        path: String,
        token: String,
        message: String,
    },
}

impl PathError {
    pub(crate) fn parse(path: &str, message: impl Into<String>) -> Self {
        PathError::Parse {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn operator(filter: &str, message: impl Into<String>) -> Self {
        PathError::Operator {
            filter: filter.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn resolution(path: &str, token: &str, message: impl Into<String>) -> Self {
        PathError::Resolution {
            path: path.to_string(),
            token: token.to_string(),
            message: message.into(),
        }
    }
}

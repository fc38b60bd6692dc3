//! error types of the merge engine
use crate::sources::LoadError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("A source named {0:?} is already registered")]
    DuplicateName(String),

    #[error("Key {key:?} is defined by more than one source ({sources})")]
    AmbiguousSource { key: String, sources: String },

    #[error("Unable to construct source for tag {tag:?}")]
    SourceConstruction {
        tag: String,
        #[source]
        source: LoadError,
    },

    #[error("Unable to merge node {path:?}: {reason}")]
    MergeFailure { path: String, reason: &'static str },

    #[error("Value of {key:?} cannot be converted to {expected}")]
    Conversion { key: String, expected: &'static str },

    #[error("Unable to load source")]
    Load(#[from] LoadError),
}

impl Error {
    pub(crate) fn invalid_key(key: &str, reason: &'static str) -> Self {
        Error::InvalidKey {
            key: key.to_string(),
            reason,
        }
    }
}

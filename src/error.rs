//! Error types for the team sync operator.

use std::fmt;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Kinds of objects that can be reported missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    GroupSync,
    Group,
    Secret,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::GroupSync => "GroupSync",
            Self::Group => "Group",
            Self::Secret => "Secret",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("missing credential: no token in the referenced secret and no fallback token configured")]
    MissingCredential,

    #[error("group '{group}' is already controlled by '{owner}'")]
    OwnershipConflict { group: String, owner: String },

    #[error("conflict writing {kind} '{name}': {message}")]
    Conflict {
        kind: ResourceKind,
        name: String,
        message: String,
    },

    #[error("directory service returned {status}: {message}")]
    Directory { status: u16, message: String },

    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("kubernetes api error: {0}")]
    Kube(#[from] kube::Error),
}

/// How the reconcile loop and the operator should treat an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    NotFound,
    Configuration,
    Transient,
    Conflict,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "not found",
            Self::Configuration => "configuration",
            Self::Transient => "transient",
            Self::Conflict => "conflict",
        })
    }
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound { .. } => ErrorClass::NotFound,
            Self::Configuration(_) | Self::MissingCredential | Self::OwnershipConflict { .. } => {
                ErrorClass::Configuration
            }
            Self::Conflict { .. } => ErrorClass::Conflict,
            Self::Directory { status, .. } if matches!(*status, 401 | 404) => {
                ErrorClass::Configuration
            }
            Self::Directory { .. } | Self::Http(_) | Self::Kube(_) => ErrorClass::Transient,
        }
    }

    /// The one failure a reconcile pass skips over instead of aborting.
    pub fn is_group_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound {
                kind: ResourceKind::Group,
                ..
            }
        )
    }

    /// Maps an API server error for `kind`/`name` onto the operator taxonomy.
    pub fn from_kube(err: kube::Error, kind: ResourceKind, name: &str) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 404 => Self::NotFound {
                kind,
                name: name.to_owned(),
            },
            kube::Error::Api(resp) if resp.code == 409 => Self::Conflict {
                kind,
                name: name.to_owned(),
                message: resp.message,
            },
            other => Self::Kube(other),
        }
    }
}

use std::path::PathBuf;

use thiserror::Error;

use crate::session::Capability;

pub type Result<T> = std::result::Result<T, EditError>;

/// Every way a single edit request can fail.
///
/// Each variant is terminal for its request: nothing is retried, the source
/// file is left as it was, and tracked locations are not refreshed.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("element {element} was not found in session {session}")]
    ElementNotFound { session: String, element: String },

    #[error("unable to find the location where the component {component} was created")]
    NotTracked { component: String },

    #[error("{}: {what} not found at line {line}{hint}", path.display())]
    SiteNotFound {
        path: PathBuf,
        line: usize,
        what: String,
        hint: String,
    },

    #[error("{}:{line}:{column}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    #[error("the component {component} does not support {capability}")]
    UnsupportedCapability {
        component: String,
        capability: Capability,
    },

    #[error("cannot place a generated statement at {0}")]
    UnsupportedAnchorShape(String),

    #[error("planned modifications overlap at bytes {first}..{second}")]
    ConflictingModifications { first: usize, second: usize },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EditError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EditError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn site_not_found(path: impl Into<PathBuf>, line: usize, what: impl Into<String>) -> Self {
        EditError::SiteNotFound {
            path: path.into(),
            line,
            what: what.into(),
            hint: String::new(),
        }
    }
}

//! Error types for the agent

use std::io;

/// A filesystem operation failed on the agent side.
///
/// The display text is what a framed client receives as the rejection
/// message.
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    #[error("{path}: not found")]
    NotFound { path: String },
    #[error("{path}: already exists")]
    AlreadyExists { path: String },
    #[error("{path}: path leaves the agent root")]
    PathEscape { path: String },
    #[error("{path}: file is {len} bytes, limit is {max}")]
    TooLarge { path: String, len: u64, max: usize },
    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl AgentError {
    pub fn from_io(path: &str, source: io::Error) -> Self {
        let path = path.to_string();
        match source.kind() {
            io::ErrorKind::NotFound => Self::NotFound { path },
            io::ErrorKind::AlreadyExists => Self::AlreadyExists { path },
            _ => Self::Io { path, source },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::from_io("pidir", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(err.to_string(), "pidir: not found");
    }

    #[test]
    fn test_escape_display() {
        let err = AgentError::PathEscape {
            path: "../etc".to_string(),
        };
        assert_eq!(err.to_string(), "../etc: path leaves the agent root");
    }
}

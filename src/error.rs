//! Error types shared by the content pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Broad class of a pipeline failure, used to pick an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Malformed,
    Render,
    Io,
    Template,
}

/// Errors produced while reading, decoding and rendering posts
#[derive(Error, Debug)]
pub enum Error {
    #[error("post not found: {0}")]
    NotFound(String),

    #[error("malformed front-matter in {source_id}: {message}")]
    Malformed { source_id: String, message: String },

    #[error("render error: {0}")]
    Render(String),

    #[error("IO error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template error: {0}")]
    Template(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Malformed { .. } => ErrorKind::Malformed,
            Error::Render(_) => ErrorKind::Render,
            Error::Io { .. } => ErrorKind::Io,
            Error::Template(_) => ErrorKind::Template,
        }
    }

    /// Wrap an IO error, turning "file not found" into `NotFound`
    pub(crate) fn from_io(id: &str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(id.to_string())
        } else {
            Error::Io {
                path: path.into(),
                source,
            }
        }
    }

    /// Attach a document id to a malformed-metadata error
    pub(crate) fn with_source_id(self, id: &str) -> Self {
        match self {
            Error::Malformed { message, .. } => Error::Malformed {
                source_id: id.to_string(),
                message,
            },
            other => other,
        }
    }
}

impl From<tera::Error> for Error {
    fn from(err: tera::Error) -> Self {
        // tera keeps the useful detail in the source chain
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            source = inner.source();
        }
        Error::Template(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from_io("hello", "markdown/hello.md", io);
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_other_io_errors_keep_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::from_io("hello", "markdown/hello.md", io);
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("hello.md"));
    }

    #[test]
    fn test_with_source_id() {
        let err = Error::Malformed {
            source_id: String::new(),
            message: "bad indent".to_string(),
        }
        .with_source_id("post-a");
        assert_eq!(
            err.to_string(),
            "malformed front-matter in post-a: bad indent"
        );
    }
}

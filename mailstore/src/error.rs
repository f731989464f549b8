use std::{path::PathBuf, result};

use thiserror::Error;

/// The global `Result` alias of the library.
pub type Result<T> = result::Result<T, Error>;

/// The kind of an [`Error`].
///
/// Callers that need to react to a failure should match on the kind
/// rather than on the concrete variant: variants carry context that
/// may grow over time, kinds do not.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// A name is malformed or a required binding is missing.
    InvalidArgument,
    /// The folder or message does not exist.
    NotFound,
    /// The folder or its backend does not support the operation.
    Unsupported,
    /// The folder is not in the state the operation requires.
    PreconditionViolated,
    /// The physical storage failed.
    BackendIo,
}

/// The global `Error` enum of the library.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid folder name {0:?}")]
    InvalidFolderNameError(String),
    #[error("invalid message number {0}: message numbers start at 1")]
    InvalidMessageNumberError(u32),
    #[error("cannot open folder {0}: open mode must be known")]
    InvalidOpenModeError(String),

    #[error("cannot find folder {0}")]
    FolderNotFoundError(String),
    #[error("cannot find message {1} in folder {0}")]
    MessageNotFoundError(String, u32),
    #[error("cannot find message with uid {1} in folder {0}")]
    MessageUidNotFoundError(String, String),
    #[error("cannot resolve folder {0}: path {1:?} cannot host a folder")]
    FolderCannotBeHostedError(String, PathBuf),

    #[error("cannot {1} in folder {0}: folder has no uid capability")]
    UidUnsupportedError(String, &'static str),
    #[error("cannot {1} in folder {0}: operation not supported by the backend")]
    OperationUnsupportedError(String, &'static str),

    #[error("cannot {1} folder {0}: folder is not open")]
    FolderNotOpenError(String, &'static str),
    #[error("cannot {1} folder {0}: folder is open")]
    FolderOpenError(String, &'static str),
    #[error("cannot {1} folder {0}: folder is not open for writing")]
    FolderNotWritableError(String, &'static str),
    #[error("cannot delete folder {0}: folder contains subfolders {1:?}")]
    FolderHasSubfoldersError(String, Vec<String>),
    #[error("cannot {1} folder {0}: folder cannot hold messages")]
    FolderCannotHoldMessagesError(String, &'static str),
    #[error("cannot get child {1} of folder {0}: folder cannot hold folders")]
    FolderCannotHoldFoldersError(String, String),

    #[error("cannot expunge folder {0}: interrupted after removing messages {1:?}")]
    PartialExpungeError(String, Vec<u32>, #[source] Box<Error>),

    #[error("cannot create folder {0} at {1:?}: directory missing after creation")]
    CreateFolderMissingError(String, PathBuf),
    #[cfg(feature = "mh")]
    #[error("cannot {1} mh folder {0}")]
    MhError(String, &'static str, #[source] mhdir::Error),
}

impl Error {
    /// Returns the kind of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFolderNameError(_)
            | Self::InvalidMessageNumberError(_)
            | Self::InvalidOpenModeError(_) => ErrorKind::InvalidArgument,

            Self::FolderNotFoundError(_)
            | Self::MessageNotFoundError(..)
            | Self::MessageUidNotFoundError(..)
            | Self::FolderCannotBeHostedError(..) => ErrorKind::NotFound,

            Self::UidUnsupportedError(..) | Self::OperationUnsupportedError(..) => {
                ErrorKind::Unsupported
            }

            Self::FolderNotOpenError(..)
            | Self::FolderOpenError(..)
            | Self::FolderNotWritableError(..)
            | Self::FolderHasSubfoldersError(..)
            | Self::FolderCannotHoldMessagesError(..)
            | Self::FolderCannotHoldFoldersError(..) => ErrorKind::PreconditionViolated,

            Self::PartialExpungeError(_, _, err) => err.kind(),

            Self::CreateFolderMissingError(..) => ErrorKind::BackendIo,
            #[cfg(feature = "mh")]
            Self::MhError(..) => ErrorKind::BackendIo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn kinds() {
        let err = Error::UidUnsupportedError("inbox".into(), "list uids");
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(
            err.to_string(),
            "cannot list uids in folder inbox: folder has no uid capability"
        );

        let source = Error::FolderNotFoundError("inbox".into());
        let err = Error::PartialExpungeError("inbox".into(), vec![1, 3], Box::new(source));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = Error::FolderOpenError("inbox".into(), "delete");
        assert_eq!(err.kind(), ErrorKind::PreconditionViolated);
        assert_eq!(err.to_string(), "cannot delete folder inbox: folder is open");
    }
}

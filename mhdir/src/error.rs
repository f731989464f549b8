use std::{io, path::PathBuf, result};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot find message {0} in {1}")]
    FindMessageError(u32, PathBuf),
    #[error("cannot read mh directory {1}")]
    ReadDirError(#[source] io::Error, PathBuf),
    #[error("cannot read mh entry in {1}")]
    ReadEntryError(#[source] io::Error, PathBuf),
    #[error("cannot create mh directory {1}")]
    CreateDirError(#[source] io::Error, PathBuf),
    #[error("cannot remove mh directory {1}")]
    RemoveDirError(#[source] io::Error, PathBuf),
    #[error("cannot remove mh file {1}")]
    RemoveFileError(#[source] io::Error, PathBuf),
    #[error("cannot read mh message {1}")]
    ReadMessageError(#[source] io::Error, PathBuf),
    #[error("cannot store message in {0}: no message number left")]
    MessageNumberOverflowError(PathBuf),
    #[error("cannot write mh message {1}")]
    WriteMessageError(#[source] io::Error, PathBuf),
    #[error("cannot read mh sequences {1}")]
    ReadSequencesError(#[source] io::Error, PathBuf),
    #[error("cannot write mh sequences {1}")]
    WriteSequencesError(#[source] io::Error, PathBuf),
    #[error("cannot parse mh sequence line {0:?}")]
    ParseSequenceError(String),
    #[error("invalid mh sequence name {0:?}")]
    InvalidSequenceNameError(String),
}

pub type Result<T> = result::Result<T, Error>;

mod error;
mod sequences;

#[cfg(unix)]
use std::os::unix::fs::DirBuilderExt;
use std::{
    fs::{self, DirBuilder, OpenOptions, ReadDir},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use log::{debug, trace};

#[doc(inline)]
pub use crate::{
    error::{Error, Result},
    sequences::Sequences,
};

/// The name of the file holding the MH sequences of a directory.
pub const SEQUENCES_FILE_NAME: &str = ".mh_sequences";

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;

/// This struct represents a single message inside the MH
/// directory. Creation of the struct does not load the content of
/// the message file into memory.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MhEntry {
    number: u32,
    path: PathBuf,
}

impl MhEntry {
    /// Returns the MH number of the message, which is also its file
    /// name.
    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole content of the message file.
    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|err| Error::ReadMessageError(err, self.path.clone()))
    }
}

/// An iterator over the MH subdirectories. This iterator produces a
/// `Result<Mhdir>`, which can be an `Err` if an error was
/// encountered while trying to read file system properties on a
/// particular entry. Entries starting with a period are skipped.
pub struct Submhdirs {
    path: PathBuf,
    readdir: Option<ReadDir>,
    done: bool,
}

impl Submhdirs {
    fn new(path: PathBuf) -> Submhdirs {
        Submhdirs {
            path,
            readdir: None,
            done: false,
        }
    }
}

impl Iterator for Submhdirs {
    type Item = Result<Mhdir>;

    fn next(&mut self) -> Option<Result<Mhdir>> {
        if self.done {
            return None;
        }

        if self.readdir.is_none() {
            self.readdir = match fs::read_dir(&self.path) {
                Err(err) => {
                    self.done = true;
                    return Some(Err(Error::ReadDirError(err, self.path.clone())));
                }
                Ok(v) => Some(v),
            };
        }

        let readdir = self.readdir.as_mut()?;

        for entry in readdir.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => return Some(Err(Error::ReadEntryError(err, self.path.clone()))),
            };

            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }

            match entry.file_type() {
                Ok(kind) if kind.is_dir() => {
                    return Some(Ok(Mhdir {
                        path: entry.path(),
                    }))
                }
                Ok(_) => continue,
                Err(err) => return Some(Err(Error::ReadEntryError(err, entry.path()))),
            }
        }

        None
    }
}

/// The main entry point for this library. This struct can be
/// instantiated from a path using the `from` implementations. The
/// path is the directory holding the message files.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Mhdir {
    path: PathBuf,
}

impl Mhdir {
    /// Returns the path of the MH directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the name of the MH directory.
    pub fn name(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }

    /// Returns `true` if the path designates an existing
    /// directory. Any other kind of entry at this path does not
    /// count as an MH directory.
    pub fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .map(|meta| meta.is_dir())
            .unwrap_or_default()
    }

    /// Creates the directory, assuming its parent exists. Succeeds
    /// if the directory already exists.
    pub fn create_dir(&self) -> Result<()> {
        self.dir_builder(false)
            .create(&self.path)
            .or_else(|err| match err.kind() {
                ErrorKind::AlreadyExists if self.exists() => Ok(()),
                _ => Err(err),
            })
            .map_err(|err| Error::CreateDirError(err, self.path.clone()))
    }

    /// Creates the directory and all its missing ancestors.
    pub fn create_dirs(&self) -> Result<()> {
        self.dir_builder(true)
            .create(&self.path)
            .map_err(|err| Error::CreateDirError(err, self.path.clone()))
    }

    fn dir_builder(&self, recursive: bool) -> DirBuilder {
        let mut builder = DirBuilder::new();
        builder.recursive(recursive);
        #[cfg(unix)]
        builder.mode(DIR_MODE);
        builder
    }

    /// Removes the directory. The directory needs to be empty.
    pub fn remove_dir(&self) -> Result<()> {
        debug!("removing mh directory {}", self.path.display());
        fs::remove_dir(&self.path).map_err(|err| Error::RemoveDirError(err, self.path.clone()))
    }

    /// Returns the messages of the directory, sorted by ascending
    /// number. Only regular files named by a positive decimal number
    /// are considered as messages.
    pub fn list_entries(&self) -> Result<Vec<MhEntry>> {
        let readdir =
            fs::read_dir(&self.path).map_err(|err| Error::ReadDirError(err, self.path.clone()))?;

        let mut entries = Vec::new();

        for entry in readdir {
            let entry = entry.map_err(|err| Error::ReadEntryError(err, self.path.clone()))?;

            let number = match parse_number(&entry.file_name().to_string_lossy()) {
                Some(number) => number,
                None => continue,
            };

            let kind = entry
                .file_type()
                .map_err(|err| Error::ReadEntryError(err, entry.path()))?;
            if !kind.is_file() {
                continue;
            }

            entries.push(MhEntry {
                number,
                path: entry.path(),
            });
        }

        entries.sort_by_key(MhEntry::number);
        trace!("mh entries of {}: {entries:?}", self.path.display());

        Ok(entries)
    }

    /// Returns an iterator over the MH subdirectories. The order of
    /// subdirectories is not specified.
    pub fn list_subdirs(&self) -> Submhdirs {
        Submhdirs::new(self.path.clone())
    }

    /// Returns the number of messages of the directory.
    pub fn count(&self) -> Result<usize> {
        Ok(self.list_entries()?.len())
    }

    /// Tries to find the message with the given number.
    pub fn find(&self, number: u32) -> Result<Option<MhEntry>> {
        let path = self.path.join(number.to_string());
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(Some(MhEntry { number, path })),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::ReadEntryError(err, path)),
        }
    }

    /// Gets the message with the given number, or fails if it does
    /// not exist.
    pub fn get(&self, number: u32) -> Result<MhEntry> {
        self.find(number)?
            .ok_or_else(|| Error::FindMessageError(number, self.path.clone()))
    }

    /// Stores the given data as a new message, numbered after the
    /// last existing message. Returns the number of the new message.
    pub fn store(&self, data: &[u8]) -> Result<u32> {
        let last = self
            .list_entries()?
            .last()
            .map(MhEntry::number)
            .unwrap_or_default();
        let next = |n: u32| {
            n.checked_add(1)
                .ok_or_else(|| Error::MessageNumberOverflowError(self.path.clone()))
        };
        let mut number = next(last)?;

        let (mut file, path) = loop {
            let path = self.path.join(number.to_string());
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (file, path),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => number = next(number)?,
                Err(err) => return Err(Error::WriteMessageError(err, path)),
            }
        };

        /// Removes the message file if the scope is left before the
        /// content was fully written.
        struct UnlinkOnError {
            path_to_unlink: Option<PathBuf>,
        }

        impl Drop for UnlinkOnError {
            fn drop(&mut self) {
                if let Some(path) = self.path_to_unlink.take() {
                    fs::remove_file(path).ok();
                }
            }
        }

        let mut unlink_guard = UnlinkOnError {
            path_to_unlink: Some(path.clone()),
        };

        file.write_all(data)
            .and_then(|()| file.sync_all())
            .map_err(|err| Error::WriteMessageError(err, path.clone()))?;

        unlink_guard.path_to_unlink.take();
        debug!("stored mh message {}", path.display());

        Ok(number)
    }

    /// Deletes the message with the given number.
    pub fn delete(&self, number: u32) -> Result<()> {
        let entry = self.get(number)?;
        fs::remove_file(entry.path())
            .map_err(|err| Error::RemoveFileError(err, entry.path().to_owned()))
    }

    /// Deletes every regular file of the directory, messages and MH
    /// metadata alike. Subdirectories are left untouched.
    pub fn delete_all(&self) -> Result<()> {
        self.delete_files(self.list_files()?)
    }

    /// Returns the paths of the regular files of the directory,
    /// sorted by name.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        let readdir =
            fs::read_dir(&self.path).map_err(|err| Error::ReadDirError(err, self.path.clone()))?;

        let mut files = Vec::new();

        for entry in readdir {
            let entry = entry.map_err(|err| Error::ReadEntryError(err, self.path.clone()))?;
            let kind = entry
                .file_type()
                .map_err(|err| Error::ReadEntryError(err, entry.path()))?;
            if kind.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Removes the given files, in order.
    ///
    /// The deletion stops at the first error, which carries the
    /// failing path: the files already removed stay removed, the
    /// remaining ones are kept.
    pub fn delete_files(&self, files: impl IntoIterator<Item = PathBuf>) -> Result<()> {
        for path in files {
            trace!("removing mh file {}", path.display());
            fs::remove_file(&path).map_err(|err| Error::RemoveFileError(err, path))?;
        }

        Ok(())
    }

    /// Reads the sequences of the directory. A missing sequences file
    /// means no sequence.
    pub fn sequences(&self) -> Result<Sequences> {
        let path = self.path.join(SEQUENCES_FILE_NAME);
        match fs::read_to_string(&path) {
            Ok(content) => content.parse(),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Sequences::default()),
            Err(err) => Err(Error::ReadSequencesError(err, path)),
        }
    }

    /// Replaces the sequences of the directory. The file is written
    /// aside then renamed, so readers never see a partial file.
    pub fn set_sequences(&self, seqs: &Sequences) -> Result<()> {
        let path = self.path.join(SEQUENCES_FILE_NAME);

        if seqs.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(err) => Err(Error::WriteSequencesError(err, path)),
            };
        }

        let tmp_path = self.path.join(format!("{SEQUENCES_FILE_NAME}.tmp"));
        fs::write(&tmp_path, seqs.to_string())
            .and_then(|()| fs::rename(&tmp_path, &path))
            .map_err(|err| {
                fs::remove_file(&tmp_path).ok();
                Error::WriteSequencesError(err, path.clone())
            })
    }
}

impl From<PathBuf> for Mhdir {
    fn from(p: PathBuf) -> Mhdir {
        Mhdir { path: p }
    }
}

impl From<&Path> for Mhdir {
    fn from(p: &Path) -> Mhdir {
        Mhdir::from(p.to_path_buf())
    }
}

impl From<String> for Mhdir {
    fn from(s: String) -> Mhdir {
        Mhdir::from(PathBuf::from(s))
    }
}

impl<'a> From<&'a str> for Mhdir {
    fn from(s: &str) -> Mhdir {
        Mhdir::from(PathBuf::from(s))
    }
}

fn parse_number(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    name.parse().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::parse_number;

    #[test]
    fn message_file_names() {
        assert_eq!(parse_number("1"), Some(1));
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("0"), None);
        assert_eq!(parse_number("+3"), None);
        assert_eq!(parse_number(",3"), None);
        assert_eq!(parse_number(".mh_sequences"), None);
        assert_eq!(parse_number(""), None);
    }
}

//! # Folder backend
//!
//! A [`FolderBackend`] performs the physical work behind a
//! [`Folder`]: checking existence, creating and deleting storage,
//! fetching and appending messages. The folder itself only does the
//! bookkeeping (names, open state, message cache) and delegates to
//! its backend.
//!
//! Every hook receives the full name of the folder it operates on,
//! so backend-specific locations (like a directory path) are always
//! derived from the current full name.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;

use super::{Capabilities, Folder, FolderSummary, OpenMode};
use crate::{
    flag::Flags,
    message::{Message, Uid},
    Error, Result,
};

#[async_trait]
pub trait FolderBackend: Send + Sync {
    /// Returns the capability profile of the backend. It is read
    /// once, when the folder is initialized.
    fn capabilities(&self) -> Capabilities;

    /// Returns the flags this backend persists.
    fn permanent_flags(&self) -> Flags {
        Flags::default()
    }

    /// Returns the backend-specific location of the given folder.
    fn location(&self, _full_name: &str) -> Option<PathBuf> {
        None
    }

    /// Checks the physical existence of the folder.
    async fn exists(&self, _full_name: &str) -> Result<bool> {
        Ok(false)
    }

    /// Physically creates the folder. Parents are guaranteed to
    /// exist when this hook is called.
    async fn create(&self, full_name: &str) -> Result<()> {
        Err(Error::OperationUnsupportedError(
            full_name.to_owned(),
            "create folder",
        ))
    }

    /// Physically removes the folder. Messages and subfolders are
    /// already gone when this hook is called.
    async fn delete(&self, _full_name: &str) -> Result<()> {
        Ok(())
    }

    /// Deletes every message of the folder.
    async fn delete_messages(&self, _full_name: &str) -> Result<()> {
        Ok(())
    }

    /// Lists the short names of the direct subfolders.
    async fn list_subfolders(&self, _full_name: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Prepares the folder for message operations.
    async fn open(&self, _full_name: &str, _mode: OpenMode) -> Result<()> {
        Ok(())
    }

    /// Releases whatever [`FolderBackend::open`] acquired.
    async fn close(&self, _full_name: &str) -> Result<()> {
        Ok(())
    }

    /// Physically removes the messages marked for deletion.
    ///
    /// `cached` holds the messages of the folder cache, by ascending
    /// number. The backend MUST call [`Message::mark_expunged`] on
    /// every cached message it removes, and returns the numbers
    /// (prior to the expunge) of all removed messages, cached or not.
    ///
    /// A backend failing after some messages were removed reports
    /// their numbers through [`Error::PartialExpungeError`].
    async fn expunge(&self, _full_name: &str, _cached: &[Arc<Message>]) -> Result<Vec<u32>> {
        Ok(Vec::new())
    }

    /// Fetches the message at the given number.
    async fn get_message(&self, _full_name: &str, _number: u32) -> Result<Option<Message>> {
        Ok(None)
    }

    /// Counts the messages of the folder. `None` means unknown.
    async fn get_message_count(&self, _full_name: &str) -> Result<Option<usize>> {
        Ok(None)
    }

    /// Appends the given message and returns its number.
    async fn append_message(&self, full_name: &str, _message: &Message) -> Result<u32> {
        Err(Error::OperationUnsupportedError(
            full_name.to_owned(),
            "append message",
        ))
    }

    /// Persists the given flags of the given message. Only permanent
    /// flags are given.
    async fn set_message_flags(
        &self,
        _full_name: &str,
        _message: &Message,
        _flags: &Flags,
    ) -> Result<()> {
        Ok(())
    }

    /// Copies the given message of the source folder into the
    /// destination folder, and returns its number there.
    ///
    /// The default implementation appends the message to the
    /// destination. Backends able to copy without transferring the
    /// content should override it.
    async fn copy_message_to(
        &self,
        _source: &Folder,
        message: &Message,
        dest: &Folder,
    ) -> Result<u32> {
        dest.append_message(message).await
    }

    async fn get_message_uid(&self, _full_name: &str, _message: &Message) -> Result<Option<Uid>> {
        Ok(None)
    }

    async fn get_message_uid_by_number(
        &self,
        _full_name: &str,
        _number: u32,
    ) -> Result<Option<Uid>> {
        Ok(None)
    }

    async fn get_message_by_uid(&self, _full_name: &str, _uid: &Uid) -> Result<Option<Message>> {
        Ok(None)
    }

    async fn get_uid_list(&self, _full_name: &str) -> Result<Vec<Uid>> {
        Ok(Vec::new())
    }

    async fn summary(&self, _full_name: &str) -> Result<Option<FolderSummary>> {
        Ok(None)
    }
}

//! # Folder module
//!
//! Module dedicated to folder (as known as mailbox) management.
//!
//! A [`Folder`] is a named container of messages, possibly holding
//! subfolders. It is resolved from a [`Store`] and delegates the
//! physical work to a [`FolderBackend`], while keeping the
//! backend-agnostic bookkeeping: names, open state and the cache of
//! fetched messages.
//!
//! The open state machine is `Closed --open(mode)--> Open
//! --close(expunge)--> Closed`. Message operations require an open
//! folder, structural ones (like deletion) a closed one.

pub mod backend;

use std::{
    fmt,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak},
};

use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[doc(inline)]
pub use self::backend::FolderBackend;
use crate::{
    flag::Flags,
    message::{cache::MessageCache, Message, Uid},
    store::Store,
    Error, Result,
};

/// The open state of a folder.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OpenState {
    #[default]
    Closed,
    Open,
}

/// The mode a folder is opened with.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OpenMode {
    /// The mode of a closed folder.
    #[default]
    Unknown,
    Read,
    Write,
    ReadWrite,
}

impl OpenMode {
    pub fn is_readable(&self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::ReadWrite => write!(f, "read-write"),
        }
    }
}

/// The capability profile of a folder, given by its backend.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Capabilities {
    pub can_hold_folders: bool,
    pub can_hold_messages: bool,

    /// Messages can be addressed by a stable [`Uid`] in addition to
    /// their number.
    pub has_uid: bool,

    /// The backend can produce a [`FolderSummary`].
    pub has_summary: bool,
}

/// A snapshot of the content of a folder.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FolderSummary {
    pub full_name: String,
    pub message_count: Option<usize>,

    /// The short names of the subfolders.
    pub subfolders: Vec<String>,
}

#[derive(Debug, Default)]
struct FolderNames {
    name: String,
    full_name: String,
}

#[derive(Debug, Default)]
struct FolderState {
    state: OpenState,
    mode: OpenMode,
}

/// The folder structure.
pub struct Folder {
    store: Arc<Store>,
    parent: Option<Weak<Folder>>,
    backend: Box<dyn FolderBackend>,
    capabilities: Capabilities,
    permanent_flags: Flags,
    names: RwLock<FolderNames>,
    state: RwLock<FolderState>,
    cache: Mutex<MessageCache>,
}

impl Folder {
    /// Initializes a folder bound to the given store, closed and
    /// without name. [`Folder::set_name`] must be called before any
    /// other operation.
    pub fn new(
        store: Arc<Store>,
        parent: Option<&Arc<Folder>>,
        backend: Box<dyn FolderBackend>,
    ) -> Self {
        let capabilities = backend.capabilities();
        let permanent_flags = backend.permanent_flags();

        Self {
            store,
            parent: parent.map(Arc::downgrade),
            backend,
            capabilities,
            permanent_flags,
            names: RwLock::default(),
            state: RwLock::default(),
            cache: Mutex::default(),
        }
    }

    fn names(&self) -> RwLockReadGuard<'_, FolderNames> {
        self.names.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> RwLockReadGuard<'_, FolderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, FolderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the short name of the folder and derives its full name:
    /// the full name of the parent folder, the store separator then
    /// the name, or the name alone for folders without parent.
    pub fn set_name(&self, name: &str) -> Result<()> {
        let separator = self.store.get_separator();
        let parent = self.get_parent_folder();

        let full_name = match &parent {
            Some(parent) => {
                validate_segment(name, separator)?;
                join_full_name(&parent.full_name(), separator, name)
            }
            None => {
                validate_full_name(name, separator)?;
                name.to_owned()
            }
        };

        debug!("folder {name} has full name {full_name}");

        let mut names = self.names.write().unwrap_or_else(PoisonError::into_inner);
        names.name = name.to_owned();
        names.full_name = full_name;

        Ok(())
    }

    pub fn name(&self) -> String {
        self.names().name.clone()
    }

    pub fn full_name(&self) -> String {
        self.names().full_name.clone()
    }

    /// Returns the full name, or fails if the folder has no name yet.
    fn named(&self) -> Result<String> {
        let full_name = self.full_name();
        if full_name.is_empty() {
            return Err(Error::InvalidFolderNameError(full_name));
        }
        Ok(full_name)
    }

    /// Returns the backend-specific location of the folder, like the
    /// directory path for directory-mapped backends.
    pub fn location(&self) -> Option<PathBuf> {
        let full_name = self.full_name();
        if full_name.is_empty() {
            return None;
        }
        self.backend.location(&full_name)
    }

    pub fn get_parent_folder(&self) -> Option<Arc<Folder>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    pub fn get_parent_store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn get_mode(&self) -> OpenMode {
        self.state().mode
    }

    pub fn is_open(&self) -> bool {
        self.state().state == OpenState::Open
    }

    pub fn can_hold_folders(&self) -> bool {
        self.capabilities.can_hold_folders
    }

    pub fn can_hold_messages(&self) -> bool {
        self.capabilities.can_hold_messages
    }

    pub fn has_uid_capability(&self) -> bool {
        self.capabilities.has_uid
    }

    pub fn has_summary_capability(&self) -> bool {
        self.capabilities.has_summary
    }

    pub fn list_permanent_flags(&self) -> &Flags {
        &self.permanent_flags
    }

    /// Returns the number of messages currently cached.
    pub async fn cached_message_count(&self) -> usize {
        self.cache.lock().await.len()
    }

    fn ensure_open(&self, full_name: &str, action: &'static str) -> Result<()> {
        if !self.is_open() {
            return Err(Error::FolderNotOpenError(full_name.to_owned(), action));
        }
        if !self.capabilities.can_hold_messages {
            return Err(Error::FolderCannotHoldMessagesError(
                full_name.to_owned(),
                action,
            ));
        }
        Ok(())
    }

    fn ensure_writable(&self, full_name: &str, action: &'static str) -> Result<()> {
        self.ensure_open(full_name, action)?;
        if !self.get_mode().is_writable() {
            return Err(Error::FolderNotWritableError(full_name.to_owned(), action));
        }
        Ok(())
    }

    fn ensure_uid(&self, full_name: &str, action: &'static str) -> Result<()> {
        if !self.capabilities.has_uid {
            return Err(Error::UidUnsupportedError(full_name.to_owned(), action));
        }
        Ok(())
    }

    /// Opens the folder in the given mode.
    pub async fn open(&self, mode: OpenMode) -> Result<()> {
        let full_name = self.named()?;
        info!("opening folder {full_name} in {mode} mode");

        if self.is_open() {
            return Err(Error::FolderOpenError(full_name, "open"));
        }
        if mode == OpenMode::Unknown {
            return Err(Error::InvalidOpenModeError(full_name));
        }

        self.backend.open(&full_name, mode).await?;

        let mut state = self.state_mut();
        state.state = OpenState::Open;
        state.mode = mode;

        Ok(())
    }

    /// Closes the folder, expunging it first if asked to.
    pub async fn close(&self, expunge: bool) -> Result<()> {
        let full_name = self.named()?;
        info!("closing folder {full_name}");

        if !self.is_open() {
            return Err(Error::FolderNotOpenError(full_name, "close"));
        }

        if expunge {
            self.expunge(false).await?;
        }

        self.backend.close(&full_name).await?;

        let mut state = self.state_mut();
        state.state = OpenState::Closed;
        state.mode = OpenMode::Unknown;

        Ok(())
    }

    /// Checks the physical existence of the folder.
    pub async fn exists(&self) -> Result<bool> {
        let full_name = self.named()?;
        self.backend.exists(&full_name).await
    }

    /// Resolves the direct child folder with the given short name.
    pub async fn get_folder(self: &Arc<Self>, name: &str) -> Result<Arc<Folder>> {
        let full_name = self.named()?;

        if !self.capabilities.can_hold_folders {
            return Err(Error::FolderCannotHoldFoldersError(
                full_name,
                name.to_owned(),
            ));
        }

        self.store.resolve(Some(self), name).await
    }

    /// Creates the folder, and its missing parents first.
    ///
    /// Creating an existing folder succeeds without doing anything.
    pub fn create(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let full_name = self.named()?;

            if self.backend.exists(&full_name).await? {
                debug!("folder {full_name} already exists");
                return Ok(());
            }

            info!("creating folder {full_name}");

            let separator = self.store.get_separator();
            if let Some(parent) = self.get_parent_folder() {
                parent.create().await?;
            } else if let Some((prefix, _)) = full_name.rsplit_once(separator) {
                let parent = self.store.get_folder(prefix).await?;
                parent.create().await?;
            }

            self.backend.create(&full_name).await
        })
    }

    /// Deletes the folder, which must be closed.
    ///
    /// Messages are always deleted first. If the folder still has
    /// subfolders and `recurse` is `false`, the deletion fails at
    /// this point: messages are gone but the folder and its
    /// subfolders remain, and the deletion can be retried. With
    /// `recurse`, subfolders are deleted depth-first.
    pub fn delete(self: &Arc<Self>, recurse: bool) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let full_name = self.named()?;
            info!("deleting folder {full_name} (recurse: {recurse})");

            if self.is_open() {
                return Err(Error::FolderOpenError(full_name, "delete"));
            }

            self.delete_messages().await?;

            let subfolders = self.list_subfolders().await?;
            if !subfolders.is_empty() {
                if !recurse {
                    let names = subfolders.iter().map(|folder| folder.name()).collect();
                    return Err(Error::FolderHasSubfoldersError(full_name, names));
                }

                for subfolder in subfolders {
                    subfolder.delete(true).await?;
                }
            }

            self.backend.delete(&full_name).await
        })
    }

    /// Deletes every message of the folder and empties the cache.
    pub async fn delete_messages(&self) -> Result<()> {
        let full_name = self.named()?;
        info!("deleting messages of folder {full_name}");

        let mut cache = self.cache.lock().await;
        let result = self.backend.delete_messages(&full_name).await;
        cache.clear();
        result
    }

    /// Lists the direct subfolders.
    pub async fn list_subfolders(self: &Arc<Self>) -> Result<Vec<Arc<Folder>>> {
        let full_name = self.named()?;

        if !self.capabilities.can_hold_folders {
            return Ok(Vec::new());
        }

        let separator = self.store.get_separator();
        let mut subfolders = Vec::new();

        for name in self.backend.list_subfolders(&full_name).await? {
            if validate_segment(&name, separator).is_err() {
                warn!("skipping subfolder {name:?} of {full_name}: invalid folder name");
                continue;
            }
            subfolders.push(self.store.resolve(Some(self), &name).await?);
        }

        Ok(subfolders)
    }

    /// Removes the messages marked for deletion and reconciles the
    /// cache: expunged messages leave the cache, survivors are
    /// renumbered so that numbers stay dense. Returns the expunged
    /// cached messages if `want_list` is `true`.
    pub async fn expunge(&self, want_list: bool) -> Result<Vec<Arc<Message>>> {
        let full_name = self.named()?;
        info!("expunging folder {full_name}");

        self.ensure_writable(&full_name, "expunge")?;

        let mut cache = self.cache.lock().await;
        let cached = cache.messages();

        match self.backend.expunge(&full_name, &cached).await {
            Ok(removed) => {
                debug!("expunged messages {removed:?} from folder {full_name}");
                Ok(cache.reconcile(&removed, want_list))
            }
            Err(Error::PartialExpungeError(_, removed, err)) => {
                warn!("expunge of folder {full_name} interrupted after removing {removed:?}");
                cache.reconcile(&removed, false);
                Err(*err)
            }
            Err(err) => {
                // cached messages the backend marked before failing
                // are gone too
                cache.reconcile(&[], false);
                Err(err)
            }
        }
    }

    /// Gets the message at the given number, from the cache if it
    /// was already fetched, otherwise from the backend.
    pub async fn get_message(&self, number: u32) -> Result<Arc<Message>> {
        let full_name = self.named()?;
        self.ensure_open(&full_name, "get message from")?;

        if number == 0 {
            return Err(Error::InvalidMessageNumberError(number));
        }

        if let Some(msg) = self.cache.lock().await.get(number) {
            debug!("message {number} of folder {full_name} found in cache");
            return Ok(msg);
        }

        let msg = self
            .backend
            .get_message(&full_name, number)
            .await?
            .ok_or_else(|| Error::MessageNotFoundError(full_name.clone(), number))?;

        Ok(self.cache.lock().await.insert(Arc::new(msg)))
    }

    pub async fn get_message_count(&self) -> Result<Option<usize>> {
        let full_name = self.named()?;
        self.ensure_open(&full_name, "count messages of")?;
        self.backend.get_message_count(&full_name).await
    }

    /// Appends the given message and returns its number.
    pub async fn append_message(&self, message: &Message) -> Result<u32> {
        let full_name = self.named()?;
        info!("appending message to folder {full_name}");

        self.ensure_writable(&full_name, "append message to")?;
        self.backend.append_message(&full_name, message).await
    }

    /// Copies the given message into the destination folder, and
    /// returns its number there.
    pub async fn copy_message_to(&self, message: &Message, dest: &Folder) -> Result<u32> {
        let full_name = self.named()?;
        info!(
            "copying message {} from folder {full_name} to {}",
            message.number(),
            dest.full_name()
        );

        self.ensure_open(&full_name, "copy message from")?;
        self.backend.copy_message_to(self, message, dest).await
    }

    /// Replaces the flags of the given message. Permanent flags are
    /// persisted by the backend, the others only live on the message.
    pub async fn set_message_flags(&self, message: &Message, flags: Flags) -> Result<()> {
        let full_name = self.named()?;
        debug!(
            "setting flags {flags} of message {} in folder {full_name}",
            message.number()
        );

        self.ensure_writable(&full_name, "set flags in")?;

        let permanent = flags.intersection(&self.permanent_flags);
        self.backend
            .set_message_flags(&full_name, message, &permanent)
            .await?;
        message.set_flags(flags);

        Ok(())
    }

    pub async fn add_message_flags(&self, message: &Message, flags: &Flags) -> Result<()> {
        let mut new_flags = message.flags();
        new_flags.extend(flags.iter().cloned());
        self.set_message_flags(message, new_flags).await
    }

    pub async fn remove_message_flags(&self, message: &Message, flags: &Flags) -> Result<()> {
        let mut new_flags = message.flags();
        new_flags.retain(|flag| !flags.contains(flag));
        self.set_message_flags(message, new_flags).await
    }

    pub async fn get_message_uid(&self, message: &Message) -> Result<Option<Uid>> {
        let full_name = self.named()?;
        self.ensure_uid(&full_name, "get message uid")?;
        self.backend.get_message_uid(&full_name, message).await
    }

    /// Gets the uid of the message at the given number, without
    /// fetching the message.
    pub async fn get_message_uid_by_number(&self, number: u32) -> Result<Uid> {
        let full_name = self.named()?;
        self.ensure_uid(&full_name, "get message uid")?;
        self.ensure_open(&full_name, "get message uid from")?;

        if number == 0 {
            return Err(Error::InvalidMessageNumberError(number));
        }

        let cached = self.cache.lock().await.get(number);
        if let Some(uid) = cached.as_deref().and_then(Message::uid) {
            return Ok(uid.clone());
        }

        self.backend
            .get_message_uid_by_number(&full_name, number)
            .await?
            .ok_or(Error::MessageNotFoundError(full_name, number))
    }

    /// Gets the message with the given uid, from the cache if it was
    /// already fetched, otherwise from the backend.
    pub async fn get_message_by_uid(&self, uid: &Uid) -> Result<Arc<Message>> {
        let full_name = self.named()?;
        self.ensure_uid(&full_name, "get message by uid")?;
        self.ensure_open(&full_name, "get message from")?;

        if let Some(msg) = self.cache.lock().await.get_by_uid(uid) {
            debug!("message {uid} of folder {full_name} found in cache");
            return Ok(msg);
        }

        let msg = self
            .backend
            .get_message_by_uid(&full_name, uid)
            .await?
            .ok_or_else(|| Error::MessageUidNotFoundError(full_name.clone(), uid.to_string()))?;

        Ok(self.cache.lock().await.insert(Arc::new(msg)))
    }

    pub async fn get_uid_list(&self) -> Result<Vec<Uid>> {
        let full_name = self.named()?;
        self.ensure_uid(&full_name, "list uids")?;
        self.ensure_open(&full_name, "list uids of")?;
        self.backend.get_uid_list(&full_name).await
    }

    /// Builds a summary of the folder content.
    pub async fn summary(&self) -> Result<FolderSummary> {
        let full_name = self.named()?;

        if !self.capabilities.has_summary {
            return Err(Error::OperationUnsupportedError(full_name, "summarize"));
        }

        self.backend
            .summary(&full_name)
            .await?
            .ok_or_else(|| Error::OperationUnsupportedError(full_name, "summarize"))
    }
}

impl fmt::Debug for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Folder")
            .field("full_name", &self.full_name())
            .field("state", &self.state().state)
            .field("mode", &self.get_mode())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Joins a parent full name and a child short name.
pub(crate) fn join_full_name(parent: &str, separator: char, name: &str) -> String {
    format!("{parent}{separator}{name}")
}

/// Validates a single path segment: non-empty, without separator,
/// and not a relative directory reference.
pub(crate) fn validate_segment(name: &str, separator: char) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(separator)
        && !name.contains(['/', '\\', '\0']);

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidFolderNameError(name.to_owned()))
    }
}

/// Validates a full name made of segments joined by the separator.
pub(crate) fn validate_full_name(full_name: &str, separator: char) -> Result<()> {
    if full_name.is_empty() {
        return Err(Error::InvalidFolderNameError(full_name.to_owned()));
    }

    full_name
        .split(separator)
        .try_for_each(|segment| validate_segment(segment, separator))
        .map_err(|_| Error::InvalidFolderNameError(full_name.to_owned()))
}

//! # MH backend
//!
//! Folders are directories below the root directory of the store,
//! messages are files named by a positive decimal number (see the
//! [`mhdir`] crate).
//!
//! The message number of a message is its rank among the message
//! files of the directory, so numbers stay dense. The MH file number
//! is stable until the message is removed, so it is used as message
//! UID. Permanent flags are stored as MH sequences named after the
//! flag (`seen`, `answered`, `flagged`, `deleted` and `draft`).

pub mod config;

use std::{
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use mhdir::{MhEntry, Mhdir, Sequences};
use shellexpand_utils::shellexpand_path;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use self::config::MhConfig;
use crate::{
    flag::{Flag, Flags},
    folder::{Capabilities, FolderBackend, FolderSummary, OpenMode},
    message::{Message, Uid},
    store::StoreBackend,
    Error, Result,
};

/// Builds the directory path of the given folder.
fn mhdir_path(root_dir: &Path, separator: char, full_name: &str) -> PathBuf {
    full_name
        .split(separator)
        .fold(root_dir.to_owned(), |path, segment| path.join(segment))
}

/// The MH backend context.
pub struct MhContext {
    /// The MH root directory.
    pub root: Mhdir,

    /// The store separator.
    pub separator: char,
}

impl MhContext {
    /// Builds the MH directory of the given folder.
    pub fn get_mhdir(&self, full_name: &str) -> Mhdir {
        Mhdir::from(mhdir_path(self.root.path(), self.separator, full_name))
    }
}

/// The sync version of the MH backend context.
///
/// This is just a MH context wrapped into a mutex, so the file system
/// operations of all the folders of a store are serialized. Message
/// numbers depend on the whole content of a directory, an append
/// running concurrently with an expunge would shift them.
#[derive(Clone)]
pub struct MhContextSync {
    /// The MH configuration.
    pub mh_config: Arc<MhConfig>,

    root_dir: PathBuf,
    separator: char,
    inner: Arc<Mutex<MhContext>>,
}

impl MhContextSync {
    pub fn new(mh_config: &MhConfig, separator: char) -> Self {
        let root_dir = shellexpand_path(&mh_config.root_dir);
        debug!("mh root directory: {}", root_dir.display());

        let ctx = MhContext {
            root: Mhdir::from(root_dir.clone()),
            separator,
        };

        Self {
            mh_config: Arc::new(mh_config.clone()),
            root_dir,
            separator,
            inner: Arc::new(Mutex::new(ctx)),
        }
    }
}

impl Deref for MhContextSync {
    type Target = Arc<Mutex<MhContext>>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// The store part of the MH backend.
pub struct MhStoreBackend {
    ctx: MhContextSync,
}

impl MhStoreBackend {
    pub fn new(mh_config: &MhConfig, separator: char) -> Self {
        Self {
            ctx: MhContextSync::new(mh_config, separator),
        }
    }
}

#[async_trait]
impl StoreBackend for MhStoreBackend {
    fn root_dir(&self) -> Option<&Path> {
        Some(&self.ctx.root_dir)
    }

    /// A folder cannot be hosted when its directory path, or one of
    /// its ancestors, is occupied by something else than a directory.
    async fn can_host(&self, full_name: &str) -> Result<bool> {
        let mut path = self.ctx.root_dir.clone();

        if path.exists() && !path.is_dir() {
            return Ok(false);
        }

        for segment in full_name.split(self.ctx.separator) {
            path.push(segment);
            if path.exists() && !path.is_dir() {
                debug!("path {} cannot host folder {full_name}", path.display());
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn list_root_folders(&self) -> Result<Vec<String>> {
        let ctx = self.ctx.lock().await;
        list_subdir_names(&ctx.root, "")
    }

    fn new_folder_backend(&self) -> Box<dyn FolderBackend> {
        Box::new(MhFolderBackend::new(&self.ctx))
    }
}

/// The folder part of the MH backend.
pub struct MhFolderBackend {
    ctx: MhContextSync,
}

impl MhFolderBackend {
    pub fn new(ctx: &MhContextSync) -> Self {
        Self { ctx: ctx.clone() }
    }
}

/// Name of the sequence holding messages marked for deletion.
fn deleted_sequence() -> String {
    Flag::Deleted.to_string()
}

fn mh_err<'a>(full_name: &'a str, action: &'static str) -> impl FnOnce(mhdir::Error) -> Error + 'a {
    move |err| Error::MhError(full_name.to_owned(), action, err)
}

fn list_subdir_names(mdir: &Mhdir, full_name: &str) -> Result<Vec<String>> {
    if !mdir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();

    for subdir in mdir.list_subdirs() {
        let subdir = subdir.map_err(mh_err(full_name, "list subfolders of"))?;
        match subdir.name() {
            Some(name) => names.push(name.to_owned()),
            None => warn!("skipping non utf-8 subfolder {}", subdir.path().display()),
        }
    }

    names.sort();
    Ok(names)
}

/// Reads the message of the given entry, at the given number.
fn read_message(
    full_name: &str,
    seqs: &Sequences,
    number: u32,
    entry: &MhEntry,
) -> Result<Message> {
    let content = entry.read().map_err(mh_err(full_name, "read message of"))?;

    let flags: Flags = seqs
        .names_of(entry.number())
        .map(Flag::from)
        .filter(|flag| !matches!(flag, Flag::Custom(_)))
        .collect();

    let uid = Uid::from(entry.number());
    Ok(Message::new(number, Some(uid), flags, content))
}

/// Finds the entry of the given message: by uid when it has one,
/// otherwise by rank.
fn find_entry<'a>(entries: &'a [MhEntry], message: &Message) -> Option<(usize, &'a MhEntry)> {
    match message.uid().and_then(|uid| uid.parse::<u32>().ok()) {
        Some(n) => entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.number() == n),
        None => {
            let idx = message.number().checked_sub(1)? as usize;
            entries.get(idx).map(|entry| (idx, entry))
        }
    }
}

#[async_trait]
impl FolderBackend for MhFolderBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_hold_folders: true,
            can_hold_messages: true,
            has_uid: true,
            has_summary: true,
        }
    }

    fn permanent_flags(&self) -> Flags {
        Flags::standard()
    }

    fn location(&self, full_name: &str) -> Option<PathBuf> {
        Some(mhdir_path(&self.ctx.root_dir, self.ctx.separator, full_name))
    }

    async fn exists(&self, full_name: &str) -> Result<bool> {
        let ctx = self.ctx.lock().await;
        Ok(ctx.get_mhdir(full_name).exists())
    }

    async fn create(&self, full_name: &str) -> Result<()> {
        info!("creating mh folder {full_name}");

        let ctx = self.ctx.lock().await;
        let mdir = ctx.get_mhdir(full_name);

        // top-level folders may be the first ones of the store
        if !full_name.contains(ctx.separator) {
            ctx.root.create_dirs().map_err(mh_err(full_name, "create"))?;
        }

        mdir.create_dir().map_err(mh_err(full_name, "create"))?;

        if !mdir.exists() {
            let path = mdir.path().to_owned();
            return Err(Error::CreateFolderMissingError(full_name.to_owned(), path));
        }

        Ok(())
    }

    async fn delete(&self, full_name: &str) -> Result<()> {
        info!("deleting mh folder {full_name}");

        let ctx = self.ctx.lock().await;
        let mdir = ctx.get_mhdir(full_name);

        if !mdir.exists() {
            debug!("mh folder {full_name} already gone");
            return Ok(());
        }

        mdir.remove_dir().map_err(|err| {
            warn!("cannot remove directory of mh folder {full_name}: {err}");
            Error::MhError(full_name.to_owned(), "delete", err)
        })
    }

    async fn delete_messages(&self, full_name: &str) -> Result<()> {
        let ctx = self.ctx.lock().await;
        let mdir = ctx.get_mhdir(full_name);

        if !mdir.exists() {
            return Ok(());
        }

        mdir.delete_all()
            .map_err(mh_err(full_name, "delete messages of"))
    }

    async fn list_subfolders(&self, full_name: &str) -> Result<Vec<String>> {
        let ctx = self.ctx.lock().await;
        list_subdir_names(&ctx.get_mhdir(full_name), full_name)
    }

    async fn open(&self, full_name: &str, _mode: OpenMode) -> Result<()> {
        let ctx = self.ctx.lock().await;

        if !ctx.get_mhdir(full_name).exists() {
            return Err(Error::FolderNotFoundError(full_name.to_owned()));
        }

        Ok(())
    }

    async fn expunge(&self, full_name: &str, cached: &[Arc<Message>]) -> Result<Vec<u32>> {
        let ctx = self.ctx.lock().await;
        let mdir = ctx.get_mhdir(full_name);

        let entries = mdir.list_entries().map_err(mh_err(full_name, "expunge"))?;
        let mut seqs = mdir.sequences().map_err(mh_err(full_name, "expunge"))?;

        let deleted = seqs.get(&deleted_sequence()).cloned().unwrap_or_default();
        if deleted.is_empty() {
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        let mut result = Ok(());

        for (idx, entry) in entries.iter().enumerate() {
            if !deleted.contains(&entry.number()) {
                continue;
            }

            if let Err(err) = mdir.delete(entry.number()) {
                warn!("cannot expunge message {} of {full_name}: {err}", entry.number());
                result = Err(mh_err(full_name, "expunge")(err));
                break;
            }

            debug!("expunged mh file {} of {full_name}", entry.number());
            seqs.remove_number(entry.number());
            removed.push(idx as u32 + 1);

            let uid = Uid::from(entry.number());
            cached
                .iter()
                .filter(|msg| msg.uid() == Some(&uid))
                .for_each(|msg| msg.mark_expunged());
        }

        // file numbers of removed messages can be reused, so the
        // sequences must forget them even if the expunge failed
        let written = mdir
            .set_sequences(&seqs)
            .map_err(mh_err(full_name, "expunge"));
        let result = result.and(written);

        match result {
            Ok(()) => Ok(removed),
            Err(err) if removed.is_empty() => Err(err),
            Err(err) => Err(Error::PartialExpungeError(
                full_name.to_owned(),
                removed,
                Box::new(err),
            )),
        }
    }

    async fn get_message(&self, full_name: &str, number: u32) -> Result<Option<Message>> {
        let ctx = self.ctx.lock().await;
        let mdir = ctx.get_mhdir(full_name);

        let entries = mdir
            .list_entries()
            .map_err(mh_err(full_name, "get message from"))?;

        let entry = match number.checked_sub(1).and_then(|i| entries.get(i as usize)) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        let seqs = mdir
            .sequences()
            .map_err(mh_err(full_name, "get message from"))?;

        read_message(full_name, &seqs, number, entry).map(Some)
    }

    async fn get_message_count(&self, full_name: &str) -> Result<Option<usize>> {
        let ctx = self.ctx.lock().await;
        let count = ctx
            .get_mhdir(full_name)
            .count()
            .map_err(mh_err(full_name, "count messages of"))?;
        Ok(Some(count))
    }

    async fn append_message(&self, full_name: &str, message: &Message) -> Result<u32> {
        let ctx = self.ctx.lock().await;
        let mdir = ctx.get_mhdir(full_name);

        let n = mdir
            .store(message.content())
            .map_err(mh_err(full_name, "append message to"))?;
        debug!("stored message as mh file {n} of {full_name}");

        let flags = message.flags().intersection(&Flags::standard());
        if !flags.is_empty() {
            let mut seqs = mdir
                .sequences()
                .map_err(mh_err(full_name, "append message to"))?;
            seqs.remove_number(n);
            for flag in flags.iter() {
                seqs.add(flag, n)
                    .map_err(mh_err(full_name, "append message to"))?;
            }
            mdir.set_sequences(&seqs)
                .map_err(mh_err(full_name, "append message to"))?;
        }

        let entries = mdir
            .list_entries()
            .map_err(mh_err(full_name, "append message to"))?;
        let position = entries
            .iter()
            .position(|entry| entry.number() == n)
            .unwrap_or(entries.len().saturating_sub(1));

        Ok(position as u32 + 1)
    }

    async fn set_message_flags(
        &self,
        full_name: &str,
        message: &Message,
        flags: &Flags,
    ) -> Result<()> {
        let ctx = self.ctx.lock().await;
        let mdir = ctx.get_mhdir(full_name);

        let entries = mdir
            .list_entries()
            .map_err(mh_err(full_name, "set flags in"))?;
        let (_, entry) = find_entry(&entries, message)
            .ok_or_else(|| Error::MessageNotFoundError(full_name.to_owned(), message.number()))?;

        let mut seqs = mdir
            .sequences()
            .map_err(mh_err(full_name, "set flags in"))?;

        for flag in Flags::standard().iter() {
            if flags.contains(flag) {
                seqs.add(flag, entry.number())
                    .map_err(mh_err(full_name, "set flags in"))?;
            } else {
                seqs.remove(&flag.to_string(), entry.number());
            }
        }

        mdir.set_sequences(&seqs)
            .map_err(mh_err(full_name, "set flags in"))
    }

    async fn get_message_uid(&self, full_name: &str, message: &Message) -> Result<Option<Uid>> {
        if let Some(uid) = message.uid() {
            return Ok(Some(uid.clone()));
        }

        let ctx = self.ctx.lock().await;
        let entries = ctx
            .get_mhdir(full_name)
            .list_entries()
            .map_err(mh_err(full_name, "get message uid of"))?;

        Ok(find_entry(&entries, message).map(|(_, entry)| Uid::from(entry.number())))
    }

    async fn get_message_uid_by_number(
        &self,
        full_name: &str,
        number: u32,
    ) -> Result<Option<Uid>> {
        let ctx = self.ctx.lock().await;
        let entries = ctx
            .get_mhdir(full_name)
            .list_entries()
            .map_err(mh_err(full_name, "get message uid of"))?;

        Ok(number
            .checked_sub(1)
            .and_then(|i| entries.get(i as usize))
            .map(|entry| Uid::from(entry.number())))
    }

    async fn get_message_by_uid(&self, full_name: &str, uid: &Uid) -> Result<Option<Message>> {
        let n = match uid.parse::<u32>() {
            Ok(n) => n,
            Err(_) => return Ok(None),
        };

        let ctx = self.ctx.lock().await;
        let mdir = ctx.get_mhdir(full_name);

        let entries = mdir
            .list_entries()
            .map_err(mh_err(full_name, "get message from"))?;

        let (idx, entry) = match entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.number() == n)
        {
            Some(found) => found,
            None => return Ok(None),
        };

        let seqs = mdir
            .sequences()
            .map_err(mh_err(full_name, "get message from"))?;

        read_message(full_name, &seqs, idx as u32 + 1, entry).map(Some)
    }

    async fn get_uid_list(&self, full_name: &str) -> Result<Vec<Uid>> {
        let ctx = self.ctx.lock().await;
        let entries = ctx
            .get_mhdir(full_name)
            .list_entries()
            .map_err(mh_err(full_name, "list uids of"))?;

        Ok(entries
            .iter()
            .map(|entry| Uid::from(entry.number()))
            .collect())
    }

    async fn summary(&self, full_name: &str) -> Result<Option<FolderSummary>> {
        let ctx = self.ctx.lock().await;
        let mdir = ctx.get_mhdir(full_name);

        if !mdir.exists() {
            return Err(Error::FolderNotFoundError(full_name.to_owned()));
        }

        let message_count = mdir.count().map_err(mh_err(full_name, "summarize"))?;
        let subfolders = list_subdir_names(&mdir, full_name)?;

        Ok(Some(FolderSummary {
            full_name: full_name.to_owned(),
            message_count: Some(message_count),
            subfolders,
        }))
    }
}

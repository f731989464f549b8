//! # Memory backend
//!
//! Folders and messages live in the store itself. The backend has no
//! uid capability: messages are only addressed by their number.

pub mod config;

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    flag::{Flag, Flags},
    folder::{Capabilities, FolderBackend, OpenMode},
    message::Message,
    store::StoreBackend,
    Error, Result,
};

#[derive(Debug, Default)]
struct MemoryMessage {
    flags: Flags,
    content: Vec<u8>,
}

/// In-memory state of the store: mailboxes by full name, messages
/// by ascending number.
#[derive(Debug, Default)]
struct MemoryState {
    mailboxes: BTreeMap<String, Vec<MemoryMessage>>,
}

impl MemoryState {
    fn mailbox(&self, full_name: &str) -> Result<&Vec<MemoryMessage>> {
        self.mailboxes
            .get(full_name)
            .ok_or_else(|| Error::FolderNotFoundError(full_name.to_owned()))
    }

    fn mailbox_mut(&mut self, full_name: &str) -> Result<&mut Vec<MemoryMessage>> {
        self.mailboxes
            .get_mut(full_name)
            .ok_or_else(|| Error::FolderNotFoundError(full_name.to_owned()))
    }

    /// Returns the short names of the direct children of the given
    /// prefix, the empty prefix designating the root.
    fn children(&self, prefix: &str, separator: char) -> Vec<String> {
        let mut names: Vec<String> = self
            .mailboxes
            .keys()
            .filter_map(|full_name| {
                if prefix.is_empty() {
                    Some(full_name.as_str())
                } else {
                    full_name
                        .strip_prefix(prefix)
                        .and_then(|rest| rest.strip_prefix(separator))
                }
            })
            .filter_map(|rest| rest.split(separator).next())
            .filter(|name| !name.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        names.sort();
        names.dedup();
        names
    }
}

type MemoryStateSync = Arc<Mutex<MemoryState>>;

/// The store part of the memory backend.
pub struct MemoryStoreBackend {
    separator: char,
    state: MemoryStateSync,
}

impl MemoryStoreBackend {
    pub fn new(separator: char) -> Self {
        Self {
            separator,
            state: MemoryStateSync::default(),
        }
    }
}

#[async_trait]
impl StoreBackend for MemoryStoreBackend {
    async fn list_root_folders(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().await.children("", self.separator))
    }

    fn new_folder_backend(&self) -> Box<dyn FolderBackend> {
        Box::new(MemoryFolderBackend {
            separator: self.separator,
            state: self.state.clone(),
        })
    }
}

/// The folder part of the memory backend.
pub struct MemoryFolderBackend {
    separator: char,
    state: MemoryStateSync,
}

#[async_trait]
impl FolderBackend for MemoryFolderBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            can_hold_folders: true,
            can_hold_messages: true,
            has_uid: false,
            has_summary: false,
        }
    }

    fn permanent_flags(&self) -> Flags {
        Flags::standard()
    }

    async fn exists(&self, full_name: &str) -> Result<bool> {
        Ok(self.state.lock().await.mailboxes.contains_key(full_name))
    }

    async fn create(&self, full_name: &str) -> Result<()> {
        info!("creating memory folder {full_name}");
        let mut state = self.state.lock().await;
        state.mailboxes.entry(full_name.to_owned()).or_default();
        Ok(())
    }

    async fn delete(&self, full_name: &str) -> Result<()> {
        info!("deleting memory folder {full_name}");
        self.state.lock().await.mailboxes.remove(full_name);
        Ok(())
    }

    async fn delete_messages(&self, full_name: &str) -> Result<()> {
        if let Some(messages) = self.state.lock().await.mailboxes.get_mut(full_name) {
            messages.clear();
        }
        Ok(())
    }

    async fn list_subfolders(&self, full_name: &str) -> Result<Vec<String>> {
        Ok(self.state.lock().await.children(full_name, self.separator))
    }

    async fn open(&self, full_name: &str, _mode: OpenMode) -> Result<()> {
        self.state.lock().await.mailbox(full_name)?;
        Ok(())
    }

    async fn expunge(&self, full_name: &str, cached: &[Arc<Message>]) -> Result<Vec<u32>> {
        let mut state = self.state.lock().await;
        let messages = state.mailbox_mut(full_name)?;

        let mut removed = Vec::new();
        let mut number = 0;

        messages.retain(|msg| {
            number += 1;
            let keep = !msg.flags.contains(&Flag::Deleted);
            if !keep {
                removed.push(number);
            }
            keep
        });

        cached
            .iter()
            .filter(|msg| removed.contains(&msg.number()))
            .for_each(|msg| msg.mark_expunged());

        debug!("expunged {} memory messages of {full_name}", removed.len());
        Ok(removed)
    }

    async fn get_message(&self, full_name: &str, number: u32) -> Result<Option<Message>> {
        let state = self.state.lock().await;
        let messages = state.mailbox(full_name)?;

        let msg = number
            .checked_sub(1)
            .and_then(|idx| messages.get(idx as usize))
            .map(|msg| Message::new(number, None, msg.flags.clone(), msg.content.clone()));

        Ok(msg)
    }

    async fn get_message_count(&self, full_name: &str) -> Result<Option<usize>> {
        let state = self.state.lock().await;
        Ok(Some(state.mailbox(full_name)?.len()))
    }

    async fn append_message(&self, full_name: &str, message: &Message) -> Result<u32> {
        let mut state = self.state.lock().await;
        let messages = state.mailbox_mut(full_name)?;

        messages.push(MemoryMessage {
            flags: message.flags().intersection(&Flags::standard()),
            content: message.content().to_vec(),
        });

        Ok(messages.len() as u32)
    }

    async fn set_message_flags(
        &self,
        full_name: &str,
        message: &Message,
        flags: &Flags,
    ) -> Result<()> {
        let mut state = self.state.lock().await;

        let msg = state
            .mailbox_mut(full_name)?
            .get_mut((message.number() as usize).wrapping_sub(1))
            .ok_or_else(|| Error::MessageNotFoundError(full_name.to_owned(), message.number()))?;

        msg.flags = flags.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{MemoryMessage, MemoryState};

    #[test]
    fn children() {
        let mut state = MemoryState::default();
        for name in ["inbox", "a", "a/b", "a/b/c", "a/d", "ab"] {
            state
                .mailboxes
                .insert(name.to_owned(), Vec::<MemoryMessage>::new());
        }

        assert_eq!(state.children("", '/'), vec!["a", "ab", "inbox"]);
        assert_eq!(state.children("a", '/'), vec!["b", "d"]);
        assert_eq!(state.children("a/b", '/'), vec!["c"]);
        assert!(state.children("inbox", '/').is_empty());
    }
}

//! # Message module
//!
//! Module dedicated to the message entity exchanged between folders
//! and their callers.
//!
//! A [`Message`] is addressed either by its positional number, valid
//! until the next expunge of its folder, or by its [`Uid`] when the
//! folder has the uid capability. The content is opaque to this
//! library.

pub(crate) mod cache;

use std::{
    fmt,
    ops::Deref,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        PoisonError, RwLock,
    },
};

use crate::flag::{Flag, Flags};

/// The backend-assigned unique identifier of a message.
///
/// Contrary to the message number, the uid of a message does not
/// change when other messages are expunged.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Uid(String);

impl Uid {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Deref for Uid {
    type Target = String;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<String> for Uid {
    fn from(uid: String) -> Self {
        Self(uid)
    }
}

impl From<&str> for Uid {
    fn from(uid: &str) -> Self {
        Self(uid.to_owned())
    }
}

impl From<u32> for Uid {
    fn from(uid: u32) -> Self {
        Self(uid.to_string())
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The message structure.
///
/// Messages fetched from a folder are shared between the folder
/// cache and the callers, which is why the mutable parts (number,
/// expunged state, flags) use interior mutability: renumbering done
/// by an expunge is visible through every handle.
#[derive(Debug)]
pub struct Message {
    number: AtomicU32,
    uid: Option<Uid>,
    expunged: AtomicBool,
    flags: RwLock<Flags>,
    content: Vec<u8>,
}

impl Message {
    /// Creates a message as produced by a backend.
    pub fn new(number: u32, uid: Option<Uid>, flags: Flags, content: impl Into<Vec<u8>>) -> Self {
        Self {
            number: AtomicU32::new(number),
            uid,
            expunged: AtomicBool::new(false),
            flags: RwLock::new(flags),
            content: content.into(),
        }
    }

    /// Creates a message that does not belong to any folder yet,
    /// typically to append it to a folder.
    pub fn from_content(content: impl Into<Vec<u8>>) -> Self {
        Self::new(0, None, Flags::default(), content)
    }

    /// Builder-like variant of [`Message::set_flags`].
    pub fn with_flags(self, flags: impl Into<Flags>) -> Self {
        self.set_flags(flags.into());
        self
    }

    /// Returns the positional number of the message in its folder.
    ///
    /// Returns 0 for messages that do not belong to a folder.
    pub fn number(&self) -> u32 {
        self.number.load(Ordering::Acquire)
    }

    pub(crate) fn set_number(&self, number: u32) {
        self.number.store(number, Ordering::Release)
    }

    pub fn uid(&self) -> Option<&Uid> {
        self.uid.as_ref()
    }

    /// Returns `true` if the message has been physically removed by
    /// an expunge.
    pub fn is_expunged(&self) -> bool {
        self.expunged.load(Ordering::Acquire)
    }

    /// Marks the message as expunged.
    ///
    /// Backends must call this on every cached message they
    /// physically remove during an expunge.
    pub fn mark_expunged(&self) {
        self.expunged.store(true, Ordering::Release)
    }

    pub fn flags(&self) -> Flags {
        self.flags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_flag(&self, flag: &Flag) -> bool {
        self.flags
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(flag)
    }

    pub(crate) fn set_flags(&self, flags: Flags) {
        *self.flags.write().unwrap_or_else(PoisonError::into_inner) = flags;
    }

    /// Returns the raw content of the message.
    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, Uid};
    use crate::flag::{Flag, Flags};

    #[test]
    fn detached_message() {
        let msg = Message::from_content("Subject: hello\r\n\r\nworld")
            .with_flags(Flags::from_iter([Flag::Seen, Flag::Draft]));

        assert_eq!(msg.number(), 0);
        assert_eq!(msg.uid(), None);
        assert!(!msg.is_expunged());
        assert!(msg.has_flag(&Flag::Draft));
        assert!(msg.content().starts_with(b"Subject"));
    }

    #[test]
    fn mutable_identity() {
        let msg = Message::new(4, Some(Uid::from(12u32)), Flags::default(), vec![]);
        msg.set_number(2);
        msg.mark_expunged();

        assert_eq!(msg.number(), 2);
        assert_eq!(msg.uid().map(Uid::as_str), Some("12"));
        assert!(msg.is_expunged());
    }
}

//! Rust library to manage mail folders.
//!
//! The library exposes a [`Store`] bound to a physical medium, which
//! resolves folder names into [`Folder`]s. A folder is a named
//! container of [`Message`]s, possibly holding subfolders, with an
//! open/close lifecycle and a cache of the messages it already
//! fetched.
//!
//! The physical work is delegated to backends:
//!
//! - [`mh`]: folders are directories of numbered message files below
//!   a root directory (requires the `mh` feature, enabled by
//!   default).
//! - [`memory`]: folders and messages live in the store itself.
//!
//! Custom backends can be plugged with [`Store::with_backend`], by
//! implementing [`StoreBackend`] and [`FolderBackend`].
//!
//! See examples in the /tests folder.

pub mod config;
mod error;
pub mod flag;
pub mod folder;
pub mod memory;
pub mod message;
#[cfg(feature = "mh")]
pub mod mh;
pub mod store;

#[doc(inline)]
pub use crate::{
    config::{BackendConfig, StoreConfig},
    error::{Error, ErrorKind, Result},
    flag::{Flag, Flags},
    folder::{Capabilities, Folder, FolderBackend, FolderSummary, OpenMode, OpenState},
    message::{Message, Uid},
    store::{Store, StoreBackend},
};

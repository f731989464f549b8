//! # Store module
//!
//! A [`Store`] binds a physical medium (a root directory, a remote
//! account…) and resolves folder names into [`Folder`]s. It owns the
//! hierarchy separator used by every full name computation.
//!
//! The store does not own its folders: folders hold a reference to
//! their store, the store only keeps weak references to the folders
//! it resolved so the same name resolves to the same folder while
//! it is alive.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    config::{BackendConfig, StoreConfig},
    folder::{join_full_name, validate_full_name, validate_segment, Folder, FolderBackend},
    memory::MemoryStoreBackend,
    Error, Result,
};

/// The store-level part of a backend.
///
/// It decides whether a full name can host a folder, and builds the
/// [`FolderBackend`] of every resolved folder.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Returns the root directory of the store, for backends mapped
    /// to the file system.
    fn root_dir(&self) -> Option<&Path> {
        None
    }

    /// Returns `false` if the given full name cannot designate a
    /// folder, for example because something else occupies its
    /// location.
    async fn can_host(&self, _full_name: &str) -> Result<bool> {
        Ok(true)
    }

    /// Lists the short names of the top-level folders.
    async fn list_root_folders(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Builds the backend of a new folder.
    fn new_folder_backend(&self) -> Box<dyn FolderBackend>;
}

/// The store structure.
pub struct Store {
    config: StoreConfig,
    backend: Box<dyn StoreBackend>,
    folders: Mutex<HashMap<String, Weak<Folder>>>,
}

impl Store {
    /// Builds a store from the given configuration, selecting the
    /// backend matching the configured kind.
    pub fn new(config: StoreConfig) -> Result<Arc<Self>> {
        info!("building new store");

        let backend: Box<dyn StoreBackend> = match &config.backend {
            #[cfg(feature = "mh")]
            BackendConfig::Mh(mh_config) => Box::new(crate::mh::MhStoreBackend::new(
                mh_config,
                config.separator,
            )),
            BackendConfig::Memory(_) => Box::new(MemoryStoreBackend::new(config.separator)),
        };

        Ok(Self::with_backend(config, backend))
    }

    /// Builds a store around a custom backend.
    pub fn with_backend(config: StoreConfig, backend: Box<dyn StoreBackend>) -> Arc<Self> {
        Arc::new(Self {
            config,
            backend,
            folders: Mutex::default(),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the hierarchy separator of the store.
    pub fn get_separator(&self) -> char {
        self.config.separator
    }

    pub fn root_dir(&self) -> Option<&Path> {
        self.backend.root_dir()
    }

    /// Resolves the folder with the given full name.
    ///
    /// Folders resolved this way have no parent folder, so their
    /// name is their full name.
    pub async fn get_folder(self: &Arc<Self>, full_name: &str) -> Result<Arc<Folder>> {
        self.resolve(None, full_name).await
    }

    /// Resolves the top-level folders of the store.
    pub async fn list_root_folders(self: &Arc<Self>) -> Result<Vec<Arc<Folder>>> {
        let mut folders = Vec::new();

        for name in self.backend.list_root_folders().await? {
            if validate_segment(&name, self.get_separator()).is_ok() {
                folders.push(self.get_folder(&name).await?);
            }
        }

        Ok(folders)
    }

    /// Returns the folder registered under the given full name, if it
    /// is still alive and was resolved with the same parent.
    fn registered(
        folders: &HashMap<String, Weak<Folder>>,
        full_name: &str,
        parent: Option<&Arc<Folder>>,
    ) -> Option<Arc<Folder>> {
        let folder = folders.get(full_name)?.upgrade()?;

        let same_parent = match (folder.get_parent_folder(), parent) {
            (Some(a), Some(b)) => Arc::ptr_eq(&a, b),
            (None, None) => true,
            _ => false,
        };

        if same_parent && folder.full_name() == full_name {
            Some(folder)
        } else {
            None
        }
    }

    fn folders(&self) -> MutexGuard<'_, HashMap<String, Weak<Folder>>> {
        self.folders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) async fn resolve(
        self: &Arc<Self>,
        parent: Option<&Arc<Folder>>,
        name: &str,
    ) -> Result<Arc<Folder>> {
        let separator = self.get_separator();

        let full_name = match parent {
            Some(parent) => {
                validate_segment(name, separator)?;
                join_full_name(&parent.full_name(), separator, name)
            }
            None => {
                validate_full_name(name, separator)?;
                name.to_owned()
            }
        };

        let registered = Self::registered(&self.folders(), &full_name, parent);
        if let Some(folder) = registered {
            debug!("folder {full_name} already resolved");
            return Ok(folder);
        }

        if !self.backend.can_host(&full_name).await? {
            let folder_backend = self.backend.new_folder_backend();
            let location = folder_backend.location(&full_name).unwrap_or_default();
            return Err(Error::FolderCannotBeHostedError(full_name, location));
        }

        let folder = Folder::new(self.clone(), parent, self.backend.new_folder_backend());
        folder.set_name(name)?;
        let folder = Arc::new(folder);

        let mut folders = self.folders();
        folders.retain(|_, folder| folder.strong_count() > 0);

        // another task may have resolved the same folder meanwhile
        if let Some(existing) = Self::registered(&folders, &full_name, parent) {
            return Ok(existing);
        }

        folders.insert(full_name, Arc::downgrade(&folder));
        Ok(folder)
    }
}

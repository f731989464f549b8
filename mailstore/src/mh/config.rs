//! Module dedicated to the MH backend configuration.

use std::path::PathBuf;

/// The MH backend configuration.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct MhConfig {
    /// The MH root directory.
    ///
    /// Every folder of the store is a directory below this root: the
    /// full name `a/b` maps to `<root-dir>/a/b`, whatever the store
    /// separator is. Path is shell-expanded, which means environment
    /// variables and tilde `~` are replaced by their values.
    pub root_dir: PathBuf,
}

impl MhConfig {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }
}

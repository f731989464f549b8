//! Module dedicated to the store configuration.

#[cfg(feature = "mh")]
use crate::mh::config::MhConfig;
use crate::memory::config::MemoryConfig;

/// The default hierarchy separator.
pub const DEFAULT_SEPARATOR: char = '/';

/// The store configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct StoreConfig {
    /// The hierarchy separator, used to join folder names into full
    /// names. It is fixed for the lifetime of the store.
    #[cfg_attr(feature = "derive", serde(default = "default_separator"))]
    pub separator: char,

    /// The backend the store is bound to.
    pub backend: BackendConfig,
}

impl StoreConfig {
    pub fn new(backend: impl Into<BackendConfig>) -> Self {
        Self {
            separator: DEFAULT_SEPARATOR,
            backend: backend.into(),
        }
    }

    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }
}

#[cfg(feature = "derive")]
fn default_separator() -> char {
    DEFAULT_SEPARATOR
}

/// The backend configuration of a store.
///
/// The variant selects the concrete folder backend the store
/// resolves folders with.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum BackendConfig {
    #[cfg(feature = "mh")]
    Mh(MhConfig),
    Memory(MemoryConfig),
}

#[cfg(feature = "mh")]
impl From<MhConfig> for BackendConfig {
    fn from(config: MhConfig) -> Self {
        Self::Mh(config)
    }
}

impl From<MemoryConfig> for BackendConfig {
    fn from(config: MemoryConfig) -> Self {
        Self::Memory(config)
    }
}

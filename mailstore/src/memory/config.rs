//! Module dedicated to the memory backend configuration.

/// The memory backend configuration.
///
/// The memory backend keeps folders and messages in the store
/// itself: everything is lost when the store is dropped. It has
/// nothing to configure yet.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
#[cfg_attr(
    feature = "derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub struct MemoryConfig {}

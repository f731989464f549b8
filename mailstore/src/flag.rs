//! Module dedicated to message flags.
//!
//! A flag is a tag attached to a message. Folders advertise the
//! flags their backend persists with
//! [`Folder::list_permanent_flags`](crate::folder::Folder::list_permanent_flags);
//! other flags only live on the in-memory message.

use std::{
    collections::BTreeSet,
    fmt,
    ops::{Deref, DerefMut},
};

/// A message flag.
///
/// The five named variants form the permanent set of the MH backend,
/// which keeps each of them as the sequence named after the
/// lowercase variant (`seen`, `answered`, ...). Custom flags are
/// never persisted there.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum Flag {
    Seen,
    Answered,
    Flagged,
    /// Expunging a folder removes the messages carrying it.
    Deleted,
    Draft,
    Custom(String),
}

impl Flag {
    pub fn custom(flag: impl ToString) -> Self {
        Self::Custom(flag.to_string())
    }
}

/// Maps a sequence name back to its flag, ignoring case. `replied`
/// is read as [`Flag::Answered`]; unknown names give custom flags.
impl From<&str> for Flag {
    fn from(s: &str) -> Self {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "seen" => Flag::Seen,
            "answered" | "replied" => Flag::Answered,
            "flagged" => Flag::Flagged,
            "deleted" => Flag::Deleted,
            "draft" => Flag::Draft,
            _ => Flag::Custom(s.into()),
        }
    }
}

/// Writes the sequence name of the flag.
impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Seen => write!(f, "seen"),
            Flag::Answered => write!(f, "answered"),
            Flag::Flagged => write!(f, "flagged"),
            Flag::Deleted => write!(f, "deleted"),
            Flag::Draft => write!(f, "draft"),
            Flag::Custom(flag) => write!(f, "{flag}"),
        }
    }
}

/// The set of message flags.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub struct Flags(BTreeSet<Flag>);

impl Flags {
    /// The named flags, which the MH backend reports as its
    /// permanent flags.
    pub fn standard() -> Self {
        Self::from_iter([
            Flag::Seen,
            Flag::Answered,
            Flag::Flagged,
            Flag::Deleted,
            Flag::Draft,
        ])
    }

    /// Returns the subset of flags also present in the given set.
    pub fn intersection(&self, other: &Flags) -> Flags {
        self.0.intersection(&other.0).cloned().collect()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, flag) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

impl Deref for Flags {
    type Target = BTreeSet<Flag>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Flags {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<&str> for Flags {
    fn from(s: &str) -> Self {
        s.split_whitespace().map(Flag::from).collect()
    }
}

impl From<Flag> for Flags {
    fn from(flag: Flag) -> Self {
        Self::from_iter([flag])
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<T: IntoIterator<Item = Flag>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Flags {
    type Item = Flag;
    type IntoIter = <BTreeSet<Flag> as IntoIterator>::IntoIter;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::{Flag, Flags};

    #[test]
    fn parse_flags() {
        let flags = Flags::from("seen replied Deleted todo");

        assert!(flags.contains(&Flag::Seen));
        assert!(flags.contains(&Flag::Answered));
        assert!(flags.contains(&Flag::Deleted));
        assert!(flags.contains(&Flag::custom("todo")));
        assert_eq!(flags.to_string(), "seen, answered, deleted, todo");
    }

    #[test]
    fn intersection_with_standard() {
        let flags = Flags::from("seen todo");
        assert_eq!(
            flags.intersection(&Flags::standard()),
            Flags::from(Flag::Seen)
        );
    }
}

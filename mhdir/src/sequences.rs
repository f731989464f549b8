use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    ops::Deref,
    str::FromStr,
};

use crate::{Error, Result};

/// The MH sequences of a directory.
///
/// A sequence is a named set of message numbers, stored in the
/// `.mh_sequences` file of the directory, one sequence per line:
///
/// ```text
/// unseen: 1 3-5 9
/// flagged: 2
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Sequences(BTreeMap<String, BTreeSet<u32>>);

impl Sequences {
    /// Returns the numbers of the given sequence, if it exists.
    pub fn get(&self, name: &str) -> Option<&BTreeSet<u32>> {
        self.0.get(name)
    }

    /// Returns `true` if the given message number belongs to the
    /// given sequence.
    pub fn contains(&self, name: &str, number: u32) -> bool {
        self.0
            .get(name)
            .map(|numbers| numbers.contains(&number))
            .unwrap_or_default()
    }

    /// Adds the given message number to the given sequence. The
    /// sequence is created if needed.
    pub fn add(&mut self, name: impl ToString, number: u32) -> Result<()> {
        let name = name.to_string();
        validate_name(&name)?;
        self.0.entry(name).or_default().insert(number);
        Ok(())
    }

    /// Removes the given message number from the given sequence.
    /// Empty sequences are dropped.
    pub fn remove(&mut self, name: &str, number: u32) {
        if let Some(numbers) = self.0.get_mut(name) {
            numbers.remove(&number);
            if numbers.is_empty() {
                self.0.remove(name);
            }
        }
    }

    /// Removes the given message number from every sequence.
    pub fn remove_number(&mut self, number: u32) {
        self.0.retain(|_, numbers| {
            numbers.remove(&number);
            !numbers.is_empty()
        });
    }

    /// Returns the names of the sequences the given message number
    /// belongs to.
    pub fn names_of(&self, number: u32) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(move |(_, numbers)| numbers.contains(&number))
            .map(|(name, _)| name.as_str())
    }
}

impl Deref for Sequences {
    type Target = BTreeMap<String, BTreeSet<u32>>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromStr for Sequences {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut seqs = Sequences::default();

        for line in s.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (name, numbers) = line
                .split_once(':')
                .ok_or_else(|| Error::ParseSequenceError(line.to_owned()))?;
            let name = name.trim();
            validate_name(name)?;

            let entry = seqs.0.entry(name.to_owned()).or_default();
            for range in numbers.split_whitespace() {
                let parse = |n: &str| {
                    n.parse::<u32>()
                        .map_err(|_| Error::ParseSequenceError(line.to_owned()))
                };
                match range.split_once('-') {
                    Some((first, last)) => entry.extend(parse(first)?..=parse(last)?),
                    None => {
                        entry.insert(parse(range)?);
                    }
                }
            }

            if entry.is_empty() {
                seqs.0.remove(name);
            }
        }

        Ok(seqs)
    }
}

impl fmt::Display for Sequences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, numbers) in &self.0 {
            write!(f, "{name}:")?;

            let mut numbers = numbers.iter().copied().peekable();
            while let Some(first) = numbers.next() {
                let mut last = first;
                while numbers.peek() == Some(&(last + 1)) {
                    last += 1;
                    numbers.next();
                }

                if first == last {
                    write!(f, " {first}")?;
                } else {
                    write!(f, " {first}-{last}")?;
                }
            }

            writeln!(f)?;
        }

        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidSequenceNameError(name.to_owned()))
    }
}

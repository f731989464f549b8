use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use tracing::{trace, warn};

use super::{Message, Uid};

/// The in-memory cache of the messages fetched from a folder.
///
/// Messages are indexed by number, and by uid when they have one.
/// The cache lives as long as its folder.
#[derive(Debug, Default)]
pub(crate) struct MessageCache {
    by_number: BTreeMap<u32, Arc<Message>>,
    by_uid: HashMap<Uid, u32>,
}

impl MessageCache {
    pub fn len(&self) -> usize {
        self.by_number.len()
    }

    pub fn get(&self, number: u32) -> Option<Arc<Message>> {
        self.by_number.get(&number).cloned()
    }

    pub fn get_by_uid(&self, uid: &Uid) -> Option<Arc<Message>> {
        self.by_uid
            .get(uid)
            .and_then(|number| self.by_number.get(number))
            .cloned()
    }

    /// Inserts the given message, unless a message with the same
    /// number is already cached. Returns the cached message.
    pub fn insert(&mut self, message: Arc<Message>) -> Arc<Message> {
        let number = message.number();

        if let Some(cached) = self.by_number.get(&number) {
            trace!("message {number} already cached, keeping the cached one");
            return cached.clone();
        }

        if let Some(uid) = message.uid() {
            self.by_uid.insert(uid.clone(), number);
        }

        self.by_number.insert(number, message.clone());
        message
    }

    /// Returns the cached messages, by ascending number.
    pub fn messages(&self) -> Vec<Arc<Message>> {
        self.by_number.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.by_number.clear();
        self.by_uid.clear();
    }

    /// Reconciles the cache after an expunge.
    ///
    /// `removed` holds the numbers, prior to the expunge, of the
    /// messages physically removed by the backend. Those messages,
    /// and the cached messages the backend marked as expunged, are
    /// removed from the cache and returned when `want_list` is
    /// `true`. Every surviving message
    /// is renumbered by the count of removed messages that preceded
    /// it.
    pub fn reconcile(&mut self, removed: &[u32], want_list: bool) -> Vec<Arc<Message>> {
        let mut removed: BTreeSet<u32> = removed.iter().copied().collect();

        for number in &removed {
            if let Some(msg) = self.by_number.get(number) {
                msg.mark_expunged();
            }
        }

        removed.extend(
            self.by_number
                .values()
                .filter(|msg| msg.is_expunged())
                .map(|msg| msg.number()),
        );

        let mut expunged = Vec::new();
        let cached = std::mem::take(&mut self.by_number);
        self.by_uid.clear();

        for (number, msg) in cached {
            if msg.is_expunged() {
                trace!("removing expunged message {number} from cache");
                if want_list {
                    expunged.push(msg);
                }
                continue;
            }

            let shift = removed.range(..number).count() as u32;
            if shift > 0 {
                trace!("renumbering message {number} to {}", number - shift);
                msg.set_number(number - shift);
            }

            let number = msg.number();
            if self.by_number.contains_key(&number) {
                warn!("message number {number} cached twice after expunge, keeping the first");
                continue;
            }

            if let Some(uid) = msg.uid() {
                self.by_uid.insert(uid.clone(), number);
            }
            self.by_number.insert(number, msg);
        }

        expunged
    }
}

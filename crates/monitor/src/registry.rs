use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use common::ChatId;

/// Identity of one watch run. A symbol watched, stopped and watched again
/// gets a fresh id, so a stale task can never act on its successor's entry.
pub type WatchId = Uuid;

/// Result of trying to add a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// The symbol is already watched, by `owner`. Nothing was changed.
    Duplicate { owner: ChatId },
}

/// Listing entry for one active watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchInfo {
    pub id: WatchId,
    pub chat: ChatId,
    pub symbol: String,
    pub created_at: DateTime<Utc>,
}

struct Entry {
    id: WatchId,
    created_at: DateTime<Utc>,
    task: JoinHandle<()>,
}

/// Owns every active watch task, keyed by chat then symbol.
///
/// A symbol has at most one watch across all chats. Removing an entry and
/// aborting its task happen under the same lock, and a watch re-checks its
/// registration before acting on a tick, so once `cancel` returns the watch
/// takes no further action.
#[derive(Default)]
pub struct WatchRegistry {
    watches: Mutex<HashMap<ChatId, HashMap<String, Entry>>>,
}

impl WatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Entries stay consistent even if a holder panicked; every mutation is a
    // single insert or remove.
    fn lock(&self) -> MutexGuard<'_, HashMap<ChatId, HashMap<String, Entry>>> {
        self.watches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adopt `task` as the watch for (`chat`, `symbol`).
    ///
    /// If the symbol is already watched the existing watch is left untouched
    /// and `task` is aborted.
    pub fn register(
        &self,
        chat: ChatId,
        symbol: &str,
        id: WatchId,
        task: JoinHandle<()>,
    ) -> Registration {
        let mut watches = self.lock();

        if let Some(owner) = find_owner(&watches, symbol) {
            task.abort();
            debug!(%symbol, %owner, "Rejected duplicate watch");
            return Registration::Duplicate { owner };
        }

        watches.entry(chat).or_default().insert(
            symbol.to_string(),
            Entry {
                id,
                created_at: Utc::now(),
                task,
            },
        );
        info!(chat_id = chat.0, %symbol, %id, "Watch registered");
        Registration::Registered
    }

    /// Stop the watch for (`chat`, `symbol`). Returns false if there was none.
    pub fn cancel(&self, chat: ChatId, symbol: &str) -> bool {
        match remove(&mut self.lock(), chat, symbol, None) {
            Some(entry) => {
                entry.task.abort();
                info!(chat_id = chat.0, %symbol, "Watch cancelled");
                true
            }
            None => false,
        }
    }

    /// Stop every watch in every chat. Returns how many were stopped.
    pub fn cancel_all(&self) -> usize {
        drain(&mut self.lock(), None)
    }

    /// Whether `id` is still the registered watch for (`chat`, `symbol`).
    pub fn is_current(&self, chat: ChatId, symbol: &str, id: WatchId) -> bool {
        self.lock()
            .get(&chat)
            .and_then(|symbols| symbols.get(symbol))
            .is_some_and(|entry| entry.id == id)
    }

    pub fn contains(&self, chat: ChatId, symbol: &str) -> bool {
        self.lock()
            .get(&chat)
            .is_some_and(|symbols| symbols.contains_key(symbol))
    }

    /// Chat currently watching `symbol`, if any.
    pub fn owner_of(&self, symbol: &str) -> Option<ChatId> {
        find_owner(&self.lock(), symbol)
    }

    /// Active watches for `chat`, sorted by symbol.
    pub fn watches(&self, chat: ChatId) -> Vec<WatchInfo> {
        let mut list: Vec<WatchInfo> = self
            .lock()
            .get(&chat)
            .map(|symbols| {
                symbols
                    .iter()
                    .map(|(symbol, entry)| WatchInfo {
                        id: entry.id,
                        chat,
                        symbol: symbol.clone(),
                        created_at: entry.created_at,
                    })
                    .collect()
            })
            .unwrap_or_default();
        list.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        list
    }

    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of chats with at least one watch.
    pub fn chat_count(&self) -> usize {
        self.lock().len()
    }

    /// Drop the entry of a watch that is ending on its own, without aborting
    /// the calling task. No-op if `id` is no longer registered.
    pub(crate) fn release(&self, chat: ChatId, symbol: &str, id: WatchId) -> bool {
        remove(&mut self.lock(), chat, symbol, Some(id)).is_some()
    }

    /// `cancel_all` issued from inside watch `id`: every other task is
    /// aborted, the caller's own entry is only released.
    ///
    /// `None`, with nothing touched, if `id` is no longer registered for
    /// (`chat`, `symbol`).
    pub(crate) fn cancel_all_from(&self, chat: ChatId, symbol: &str, id: WatchId) -> Option<usize> {
        let mut watches = self.lock();
        let own = watches.get(&chat).and_then(|symbols| symbols.get(symbol));
        if own.map(|entry| entry.id) != Some(id) {
            return None;
        }
        Some(drain(&mut watches, Some(id)))
    }
}

fn drain(
    watches: &mut HashMap<ChatId, HashMap<String, Entry>>,
    keep_running: Option<WatchId>,
) -> usize {
    let drained: Vec<Entry> = watches
        .drain()
        .flat_map(|(_, symbols)| symbols.into_values())
        .map(|entry| {
            if Some(entry.id) != keep_running {
                entry.task.abort();
            }
            entry
        })
        .collect();

    if !drained.is_empty() {
        info!(count = drained.len(), "All watches cancelled");
    }
    drained.len()
}

fn find_owner(watches: &HashMap<ChatId, HashMap<String, Entry>>, symbol: &str) -> Option<ChatId> {
    watches
        .iter()
        .find(|(_, symbols)| symbols.contains_key(symbol))
        .map(|(&chat, _)| chat)
}

/// Remove one entry, optionally only if it carries `id`, and drop the chat
/// map when it becomes empty.
fn remove(
    watches: &mut HashMap<ChatId, HashMap<String, Entry>>,
    chat: ChatId,
    symbol: &str,
    id: Option<WatchId>,
) -> Option<Entry> {
    let symbols = watches.get_mut(&chat)?;
    if let Some(id) = id {
        if symbols.get(symbol)?.id != id {
            return None;
        }
    }
    let entry = symbols.remove(symbol);
    if symbols.is_empty() {
        watches.remove(&chat);
    }
    entry
}

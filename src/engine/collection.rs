//! The engine's local view of the collection.

use super::{Provenance, SortOrder};
use crate::models::{AccessState, Memory, MemoryId, RevealedKeyword};
use std::collections::HashMap;

/// Ordered memories keyed by id, stamped with the load that produced them.
#[derive(Debug, Default)]
pub(crate) struct MemoryCollection {
    memories: Vec<Memory>,
    index: HashMap<MemoryId, usize>,
    provenance: Provenance,
    /// Newest ticket applied or fenced. Loads at or below it are stale.
    floor: u64,
    /// Ids this engine has seen accepted, with any keyword revealed then.
    /// Survives every `replace`.
    unlocked: HashMap<MemoryId, Option<RevealedKeyword>>,
}

impl MemoryCollection {
    /// Whether a load stamped with `ticket` may still replace the collection.
    pub(crate) const fn accepts(&self, ticket: u64) -> bool {
        ticket > self.floor
    }

    /// Replaces the collection wholesale.
    ///
    /// Duplicate ids keep their first occurrence. Service data never re-locks
    /// a memory recorded by [`Self::record_unlock`].
    pub(crate) fn replace(&mut self, memories: Vec<Memory>, provenance: Provenance, ticket: u64) {
        let mut index = HashMap::with_capacity(memories.len());
        let mut kept = Vec::with_capacity(memories.len());
        for mut memory in memories {
            if index.contains_key(&memory.id) {
                tracing::warn!(memory_id = %memory.id, "Dropping duplicate memory id from collection");
                continue;
            }
            if provenance == Provenance::Authoritative {
                self.carry_unlock(&mut memory);
            }
            index.insert(memory.id.clone(), kept.len());
            kept.push(memory);
        }
        self.memories = kept;
        self.index = index;
        self.provenance = provenance;
        self.floor = self.floor.max(ticket);
    }

    /// Remembers an accepted unlock so later loads keep it.
    pub(crate) fn record_unlock(&mut self, id: &MemoryId, revealed: Option<RevealedKeyword>) {
        let entry = self.unlocked.entry(id.clone()).or_default();
        if revealed.is_some() {
            *entry = revealed;
        }
    }

    fn carry_unlock(&self, memory: &mut Memory) {
        let Some(revealed) = self.unlocked.get(&memory.id) else {
            return;
        };
        if memory.unlock(revealed.clone()) {
            tracing::debug!(memory_id = %memory.id, "Keeping accepted unlock over stale service data");
        } else if memory.revealed_keyword().is_none() && revealed.is_some() {
            memory.access_state = AccessState::Unlocked {
                revealed_keyword: revealed.clone(),
            };
        }
    }

    /// Marks every ticket up to `ticket` as stale without touching the data.
    pub(crate) fn fence(&mut self, ticket: u64) {
        self.floor = self.floor.max(ticket);
    }

    pub(crate) const fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub(crate) fn memories(&self) -> &[Memory] {
        &self.memories
    }

    pub(crate) fn get(&self, id: &MemoryId) -> Option<&Memory> {
        self.index.get(id).map(|&i| &self.memories[i])
    }

    pub(crate) fn get_mut(&mut self, id: &MemoryId) -> Option<&mut Memory> {
        let i = *self.index.get(id)?;
        self.memories.get_mut(i)
    }

    /// Case-insensitive match over title and description, in collection order.
    pub(crate) fn filter(&self, query: &str) -> Vec<Memory> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self.memories.clone();
        }
        self.memories
            .iter()
            .filter(|m| m.matches_lowercase(&needle))
            .cloned()
            .collect()
    }

    /// Returns the memories in the requested order. Ties keep server order.
    pub(crate) fn sorted(&self, order: SortOrder) -> Vec<Memory> {
        let mut memories = self.memories.clone();
        match order {
            SortOrder::ServerOrder => {},
            SortOrder::NewestFirst => memories.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            SortOrder::OldestFirst => memories.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
        memories
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn memory(id: &str, title: &str, day: u32) -> Memory {
        Memory {
            id: MemoryId::parse(id).expect("valid id"),
            title: title.to_string(),
            description: String::new(),
            image_url: None,
            access_state: AccessState::Locked,
            created_at: Utc
                .with_ymd_and_hms(2024, 1, day, 0, 0, 0)
                .single()
                .expect("valid date"),
            owner: None,
        }
    }

    #[test]
    fn test_replace_indexes_and_dedupes() {
        let mut collection = MemoryCollection::default();
        collection.replace(
            vec![memory("1", "first", 1), memory("2", "second", 2), memory("1", "again", 3)],
            Provenance::Authoritative,
            1,
        );
        assert_eq!(collection.memories().len(), 2);
        let id = MemoryId::parse("1").expect("valid id");
        assert_eq!(collection.get(&id).map(|m| m.title.as_str()), Some("first"));
        assert_eq!(collection.provenance(), Provenance::Authoritative);
    }

    #[test]
    fn test_floor_rejects_stale_tickets() {
        let mut collection = MemoryCollection::default();
        assert!(collection.accepts(1));
        collection.replace(vec![], Provenance::Authoritative, 3);
        assert!(!collection.accepts(2));
        assert!(!collection.accepts(3));
        assert!(collection.accepts(4));

        collection.fence(7);
        assert!(!collection.accepts(5));
        assert!(collection.accepts(8));
    }

    #[test]
    fn test_recorded_unlock_survives_locked_reload() {
        let mut collection = MemoryCollection::default();
        let id = MemoryId::parse("1").expect("valid id");
        collection.record_unlock(&id, RevealedKeyword::new("sunset"));

        collection.replace(
            vec![memory("1", "first", 1), memory("2", "second", 2)],
            Provenance::Authoritative,
            1,
        );
        let unlocked = collection.get(&id).expect("present");
        assert!(!unlocked.is_locked());
        assert_eq!(unlocked.revealed_keyword(), Some("sunset"));
        assert_eq!(unlocked.title, "first");
        let other = MemoryId::parse("2").expect("valid id");
        assert!(collection.get(&other).is_some_and(Memory::is_locked));

        // Placeholder ids are not server records; they stay as defined.
        collection.replace(vec![memory("1", "placeholder", 1)], Provenance::Placeholder, 2);
        assert!(collection.get(&id).is_some_and(Memory::is_locked));
    }

    #[test]
    fn test_sorted_is_stable() {
        let mut collection = MemoryCollection::default();
        collection.replace(
            vec![memory("a", "a", 2), memory("b", "b", 1), memory("c", "c", 2)],
            Provenance::Authoritative,
            1,
        );
        let ids = |v: Vec<Memory>| v.into_iter().map(|m| m.id.to_string()).collect::<Vec<_>>();
        assert_eq!(ids(collection.sorted(SortOrder::ServerOrder)), ["a", "b", "c"]);
        assert_eq!(ids(collection.sorted(SortOrder::NewestFirst)), ["a", "c", "b"]);
        assert_eq!(ids(collection.sorted(SortOrder::OldestFirst)), ["b", "a", "c"]);
    }

    #[test]
    fn test_filter_trims_and_ignores_case() {
        let mut collection = MemoryCollection::default();
        collection.replace(
            vec![memory("1", "Sunset Beach", 1), memory("2", "Picnic", 2)],
            Provenance::Authoritative,
            1,
        );
        assert_eq!(collection.filter("  BEACH ").len(), 1);
        assert_eq!(collection.filter("   ").len(), 2);
        assert!(collection.filter("mountain").is_empty());
    }
}

//! In-memory set of counterpart presence records.

use std::collections::HashMap;

use crate::protocol::CounterpartRecord;

/// Result of [`PresenceRegistry::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The id was not present before.
    Inserted,
    /// An existing record with the same id was replaced wholesale.
    Replaced,
}

/// Counterpart records keyed by id, listed in first-seen order.
///
/// A later record for an id replaces the earlier one completely and keeps
/// its position. Removing an id drops it from the order; a later upsert
/// appends it again at the end.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    records: HashMap<String, CounterpartRecord>,
    order: Vec<String>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, record: CounterpartRecord) -> Upsert {
        let id = record.id().to_string();
        match self.records.insert(id.clone(), record) {
            Some(_) => Upsert::Replaced,
            None => {
                self.order.push(id);
                Upsert::Inserted
            }
        }
    }

    /// Removing an unknown id is a no-op.
    pub fn remove(&mut self, id: &str) -> Option<CounterpartRecord> {
        let removed = self.records.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }

    /// Insert the records whose ids are not already present; existing
    /// entries win. Returns how many were inserted.
    pub fn seed(&mut self, records: impl IntoIterator<Item = CounterpartRecord>) -> usize {
        let mut inserted = 0;
        for record in records {
            if !self.records.contains_key(record.id()) {
                self.upsert(record);
                inserted += 1;
            }
        }
        inserted
    }

    pub fn list(&self) -> Vec<CounterpartRecord> {
        self.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CounterpartRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&CounterpartRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

//! Per-call type and string tables
//!
//! Both sides of the codec keep the same two tables and must grow them in the
//! same order. The tables live for one serialize or deserialize call only.

use crate::formatter::formatter_types::StateType;
use std::collections::HashMap;

/// Number of slots in the string table ring
pub const STRING_TABLE_SIZE: usize = 255;

/// Types every table starts with, in id order
pub const SEED_TYPES: [StateType; 4] = [
    StateType::OBJECT,
    StateType::INT32,
    StateType::STRING,
    StateType::BOOLEAN,
];

/// Encoder side of the type table
#[derive(Debug)]
pub struct TypeWriteTable {
    ids: HashMap<StateType, usize>,
}

impl TypeWriteTable {
    /// Create a table holding the seed types
    pub fn new() -> Self {
        let ids = SEED_TYPES
            .iter()
            .cloned()
            .enumerate()
            .map(|(id, state_type)| (state_type, id))
            .collect();
        Self { ids }
    }

    /// Id of a type already written in this call
    pub fn get(&self, state_type: &StateType) -> Option<usize> {
        self.ids.get(state_type).copied()
    }

    /// Assign the next id to a new type
    pub fn add(&mut self, state_type: StateType) -> usize {
        let id = self.ids.len();
        self.ids.insert(state_type, id);
        id
    }

    /// Number of known types
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false, the seeds are present from the start
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for TypeWriteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder side of the type table
///
/// Slots are positional. A slot whose name did not resolve under the
/// permissive policy is kept as `None` so later ids stay aligned.
#[derive(Debug)]
pub struct TypeReadTable {
    slots: Vec<Option<StateType>>,
}

impl TypeReadTable {
    /// Create a table holding the seed types
    pub fn new() -> Self {
        Self {
            slots: SEED_TYPES.iter().cloned().map(Some).collect(),
        }
    }

    /// Append a slot, resolved or not
    pub fn add(&mut self, state_type: Option<StateType>) {
        self.slots.push(state_type);
    }

    /// Slot for an id, `None` if the id was never assigned
    pub fn get(&self, id: usize) -> Option<&Option<StateType>> {
        self.slots.get(id)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false, the seeds are present from the start
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for TypeReadTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of looking a string up on the encoder side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringSlot {
    /// Already in the table at this slot
    Existing(u8),
    /// Just added at this slot
    Added(u8),
}

/// Encoder side of the string table
#[derive(Debug)]
pub struct StringWriteTable {
    slots: Vec<Option<String>>,
    index: HashMap<String, u8>,
    added: usize,
}

impl StringWriteTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            slots: vec![None; STRING_TABLE_SIZE],
            index: HashMap::new(),
            added: 0,
        }
    }

    /// Find a string, adding it round-robin if absent
    pub fn lookup_or_add(&mut self, text: &str) -> StringSlot {
        if let Some(&slot) = self.index.get(text) {
            return StringSlot::Existing(slot);
        }

        let position = self.added % STRING_TABLE_SIZE;
        self.added += 1;
        if let Some(evicted) = self.slots[position].take() {
            self.index.remove(&evicted);
        }
        self.slots[position] = Some(text.to_string());
        // position < 255
        let slot = position as u8;
        self.index.insert(text.to_string(), slot);
        StringSlot::Added(slot)
    }

    /// Number of strings currently held
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no string is held
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl Default for StringWriteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoder side of the string table
#[derive(Debug)]
pub struct StringReadTable {
    slots: Vec<Option<String>>,
    added: usize,
}

impl StringReadTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            slots: vec![None; STRING_TABLE_SIZE],
            added: 0,
        }
    }

    /// Store a string in the next round-robin slot
    pub fn add(&mut self, text: String) {
        let position = self.added % STRING_TABLE_SIZE;
        self.added += 1;
        self.slots[position] = Some(text);
    }

    /// String held in a slot
    pub fn get(&self, slot: u8) -> Option<&str> {
        self.slots.get(usize::from(slot))?.as_deref()
    }
}

impl Default for StringReadTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_tables_are_seeded() {
        let write = TypeWriteTable::new();
        assert_eq!(write.get(&StateType::OBJECT), Some(0));
        assert_eq!(write.get(&StateType::BOOLEAN), Some(3));
        assert_eq!(write.len(), 4);

        let read = TypeReadTable::new();
        assert_eq!(read.get(2), Some(&Some(StateType::STRING)));
        assert_eq!(read.get(4), None);
    }

    #[test]
    fn test_type_ids_grow_in_order() {
        let mut write = TypeWriteTable::new();
        assert_eq!(write.add(StateType::PAIR), 4);
        assert_eq!(write.add(StateType::UNIT), 5);

        let mut read = TypeReadTable::new();
        read.add(Some(StateType::PAIR));
        read.add(None);
        assert_eq!(read.get(4), Some(&Some(StateType::PAIR)));
        assert_eq!(read.get(5), Some(&None));
    }

    #[test]
    fn test_string_table_lookup() {
        let mut table = StringWriteTable::new();
        assert_eq!(table.lookup_or_add("a"), StringSlot::Added(0));
        assert_eq!(table.lookup_or_add("b"), StringSlot::Added(1));
        assert_eq!(table.lookup_or_add("a"), StringSlot::Existing(0));
    }

    #[test]
    fn test_string_table_round_robin_eviction() {
        let mut write = StringWriteTable::new();
        let mut read = StringReadTable::new();
        for i in 0..STRING_TABLE_SIZE {
            let text = format!("s{}", i);
            assert_eq!(write.lookup_or_add(&text), StringSlot::Added(i as u8));
            read.add(text);
        }
        assert_eq!(write.len(), STRING_TABLE_SIZE);

        // the 256th string takes slot 0 and evicts the first
        assert_eq!(write.lookup_or_add("new"), StringSlot::Added(0));
        read.add("new".to_string());
        assert_eq!(read.get(0), Some("new"));
        assert_eq!(write.len(), STRING_TABLE_SIZE);

        assert_eq!(write.lookup_or_add("s0"), StringSlot::Added(1));
        assert_eq!(write.lookup_or_add("s2"), StringSlot::Existing(2));
    }

    #[test]
    fn test_empty_read_slot() {
        let read = StringReadTable::new();
        assert_eq!(read.get(0), None);
        assert_eq!(read.get(254), None);
        assert_eq!(read.get(255), None);
    }
}
